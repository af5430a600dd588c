use dashmap::DashMap;
use std::sync::Arc;

use super::{
    ConcreteType, Member, PrimitiveKind, PropertyDescriptor, TypeDescriptor, TypeKey, TypeKind,
    TypeRef,
};
use crate::error::{Error, Result};

/// Statically registered type table: primitives plus every entity type the
/// host declares at setup. Generic instantiations are built on demand by the
/// resolver, emitted shapes live in the [`TypeEmitter`].
pub struct TypeRegistry {
    types: DashMap<TypeKey, TypeRef>,
    emitter: TypeEmitter,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let types = DashMap::new();
        for kind in PrimitiveKind::ALL {
            let descriptor = kind.descriptor();
            types.insert(
                descriptor.key(),
                Arc::new(ConcreteType::new(descriptor, TypeKind::Primitive(kind))),
            );
        }
        Self {
            types,
            emitter: TypeEmitter::new(),
        }
    }

    pub fn register(&self, builder: TypeBuilder) -> TypeRef {
        let ty = Arc::new(builder.build());
        crate::debug!("registering type {}", ty.descriptor());
        self.types.insert(ty.descriptor().key(), ty.clone());
        ty
    }

    pub fn lookup(&self, key: &TypeKey) -> Option<TypeRef> {
        self.types.get(key).map(|entry| entry.value().clone())
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeRef {
        match self.lookup(&kind.descriptor().key()) {
            Some(ty) => ty,
            None => Arc::new(ConcreteType::new(kind.descriptor(), TypeKind::Primitive(kind))),
        }
    }

    pub fn emitter(&self) -> &TypeEmitter {
        &self.emitter
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TypeBuilder {
    descriptor: TypeDescriptor,
    members: Vec<Member>,
}

impl TypeBuilder {
    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            descriptor: TypeDescriptor::new(namespace, name),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.members.push(Member::new(name, ty));
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn build(self) -> ConcreteType {
        ConcreteType::new(
            self.descriptor,
            TypeKind::Class {
                members: self.members,
            },
        )
    }
}

/// Synthesizes minimal object types from a descriptor's declared property
/// set. One emitted type per distinct descriptor.
pub struct TypeEmitter {
    emitted: DashMap<TypeDescriptor, TypeRef>,
}

impl TypeEmitter {
    pub fn new() -> Self {
        Self {
            emitted: DashMap::new(),
        }
    }

    pub fn emit(&self, descriptor: &TypeDescriptor) -> Result<TypeRef> {
        if descriptor.properties.is_empty() && !descriptor.is_anonymous {
            return Err(Error::UnresolvedType(descriptor.clone()));
        }
        if let Some(existing) = self.emitted.get(descriptor) {
            return Ok(existing.value().clone());
        }
        let ty = self
            .emitted
            .entry(descriptor.clone())
            .or_insert_with(|| {
                crate::debug!("emitting type for {}", descriptor);
                let members = descriptor
                    .properties
                    .iter()
                    .map(|property| Member::new(property.name.clone(), property.ty.clone()))
                    .collect();
                Arc::new(ConcreteType::new(
                    descriptor.clone(),
                    TypeKind::Emitted { members },
                ))
            })
            .value()
            .clone();
        Ok(ty)
    }

    /// Emit the anonymous shape with the given properties.
    pub fn anonymous(
        &self,
        properties: impl IntoIterator<Item = PropertyDescriptor>,
    ) -> Result<TypeRef> {
        self.emit(&TypeDescriptor::anonymous(properties))
    }
}

impl Default for TypeEmitter {
    fn default() -> Self {
        Self::new()
    }
}
