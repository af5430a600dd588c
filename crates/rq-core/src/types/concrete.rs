use std::fmt::{Display, Formatter};
use std::sync::Arc;

use super::{PropertyDescriptor, TypeDescriptor};

pub type TypeRef = Arc<ConcreteType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Float,
    String,
    Char,
    Any,
}

impl PrimitiveKind {
    pub fn descriptor(&self) -> TypeDescriptor {
        match self {
            PrimitiveKind::Bool => TypeDescriptor::bool(),
            PrimitiveKind::Int => TypeDescriptor::int(),
            PrimitiveKind::Float => TypeDescriptor::float(),
            PrimitiveKind::String => TypeDescriptor::string(),
            PrimitiveKind::Char => TypeDescriptor::char(),
            PrimitiveKind::Any => TypeDescriptor::any(),
        }
    }

    pub fn from_descriptor(descriptor: &TypeDescriptor) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| !descriptor.is_array && descriptor.key() == kind.descriptor().key())
    }

    pub const ALL: [PrimitiveKind; 6] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Int,
        PrimitiveKind::Float,
        PrimitiveKind::String,
        PrimitiveKind::Char,
        PrimitiveKind::Any,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub ty: TypeDescriptor,
    pub readable: bool,
    pub writable: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            readable: true,
            writable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    /// Registered entity/record type.
    Class { members: Vec<Member> },
    Sequence(TypeRef),
    Queryable(TypeRef),
    Grouping { key: TypeRef, element: TypeRef },
    Function { parameters: Vec<TypeRef>, result: TypeRef },
    /// Quoted lambda.
    Expression(TypeRef),
    /// Synthesized from a descriptor's declared property set.
    Emitted { members: Vec<Member> },
}

/// A resolved runtime type. The host's stand-in for reflection data.
#[derive(Debug, Clone)]
pub struct ConcreteType {
    descriptor: TypeDescriptor,
    kind: TypeKind,
}

impl ConcreteType {
    pub fn new(descriptor: TypeDescriptor, kind: TypeKind) -> Self {
        Self { descriptor, kind }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive().is_some()
    }

    /// Member table for types whose instances are objects.
    pub fn members(&self) -> &[Member] {
        match &self.kind {
            TypeKind::Class { members } | TypeKind::Emitted { members } => members,
            _ => &[],
        }
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members().iter().position(|member| member.name == name)
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members().iter().find(|member| member.name == name)
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, TypeKind::Class { .. } | TypeKind::Emitted { .. })
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self.kind, TypeKind::Emitted { .. })
    }

    pub fn element_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            TypeKind::Sequence(element) | TypeKind::Queryable(element) => Some(element),
            TypeKind::Grouping { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Descriptor with the declared property set attached, as sent to a peer
    /// that may have to emit the type.
    pub fn descriptor_with_properties(&self) -> TypeDescriptor {
        if !self.descriptor.properties.is_empty() || !self.is_object() {
            return self.descriptor.clone();
        }
        self.descriptor.clone().with_properties(
            self.members()
                .iter()
                .map(|member| PropertyDescriptor::new(member.name.clone(), member.ty.clone())),
        )
    }
}

impl Display for ConcreteType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}
