use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ConcreteType, TypeDescriptor, TypeKey, TypeKind, TypeRef, TypeRegistry};
use crate::config::type_emission_enabled;
use crate::error::{Error, Result};

/// Turns a structural descriptor back into a concrete runtime type.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeRef>;
}

impl<T: TypeResolver + ?Sized> TypeResolver for Arc<T> {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeRef> {
        (**self).resolve(descriptor)
    }
}

impl<T: TypeResolver + ?Sized> TypeResolver for &T {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeRef> {
        (**self).resolve(descriptor)
    }
}

/// Pluggable identity remapping applied before lookup, e.g. a client shape
/// onto the server type of the same structure.
pub trait ResolutionStrategy: Send + Sync {
    fn remap(&self, descriptor: &TypeDescriptor) -> Option<TypeDescriptor>;
}

#[derive(Debug, Clone, Default)]
pub struct RemappingStrategy {
    mappings: HashMap<TypeKey, TypeDescriptor>,
}

impl RemappingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, from: &TypeDescriptor, to: TypeDescriptor) -> Self {
        self.mappings.insert(from.key(), to);
        self
    }
}

impl ResolutionStrategy for RemappingStrategy {
    fn remap(&self, descriptor: &TypeDescriptor) -> Option<TypeDescriptor> {
        let target = self.mappings.get(&descriptor.key())?;
        let mut remapped = target.clone();
        remapped.generic_arguments = descriptor.generic_arguments.clone();
        remapped.is_array = descriptor.is_array;
        Some(remapped)
    }
}

/// Matches (namespace, name, generic arity) against the registry, builds
/// the built-in generic shapes and falls back to type emission.
pub struct DefaultTypeResolver {
    registry: Arc<TypeRegistry>,
    strategy: Option<Arc<dyn ResolutionStrategy>>,
    emit_types: bool,
    cache: DashMap<TypeDescriptor, TypeRef>,
}

impl DefaultTypeResolver {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            strategy: None,
            emit_types: type_emission_enabled(),
            cache: DashMap::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ResolutionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_type_emission(mut self, enabled: bool) -> Self {
        self.emit_types = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    fn resolve_uncached(&self, descriptor: &TypeDescriptor) -> Result<TypeRef> {
        if descriptor.is_array {
            let element = descriptor
                .element_type()
                .ok_or_else(|| Error::UnresolvedType(descriptor.clone()))?;
            let element = self.resolve(&element)?;
            return Ok(Arc::new(ConcreteType::new(
                TypeDescriptor::seq(element.descriptor().clone()),
                TypeKind::Sequence(element),
            )));
        }
        if let Some(ty) = self.resolve_builtin_generic(descriptor)? {
            return Ok(ty);
        }
        if let Some(ty) = self.registry.lookup(&descriptor.key()) {
            return Ok(ty);
        }
        if self.emit_types && (descriptor.is_anonymous || !descriptor.properties.is_empty()) {
            return self.registry.emitter().emit(descriptor);
        }
        Err(Error::UnresolvedType(descriptor.clone()))
    }

    fn resolve_builtin_generic(&self, descriptor: &TypeDescriptor) -> Result<Option<TypeRef>> {
        if descriptor.namespace.as_deref() != Some(super::CORE_NAMESPACE)
            || descriptor.generic_arguments.is_empty()
        {
            return Ok(None);
        }
        let arguments: Vec<TypeRef> = descriptor
            .generic_arguments
            .iter()
            .map(|argument| self.resolve(argument))
            .collect::<Result<_>>()?;
        let described = |arguments: &[TypeRef]| -> Vec<TypeDescriptor> {
            arguments.iter().map(|ty| ty.descriptor().clone()).collect()
        };
        let ty = match (descriptor.name.as_str(), arguments.as_slice()) {
            ("Seq", [element]) => ConcreteType::new(
                TypeDescriptor::seq(element.descriptor().clone()),
                TypeKind::Sequence(element.clone()),
            ),
            ("Queryable", [element]) => ConcreteType::new(
                TypeDescriptor::queryable(element.descriptor().clone()),
                TypeKind::Queryable(element.clone()),
            ),
            ("Grouping", [key, element]) => ConcreteType::new(
                TypeDescriptor::grouping(key.descriptor().clone(), element.descriptor().clone()),
                TypeKind::Grouping {
                    key: key.clone(),
                    element: element.clone(),
                },
            ),
            ("Expression", [func]) => ConcreteType::new(
                TypeDescriptor::quoted(func.descriptor().clone()),
                TypeKind::Expression(func.clone()),
            ),
            ("Func", [parameters @ .., result]) => ConcreteType::new(
                TypeDescriptor::func(described(parameters), result.descriptor().clone()),
                TypeKind::Function {
                    parameters: parameters.to_vec(),
                    result: result.clone(),
                },
            ),
            _ => return Ok(None),
        };
        Ok(Some(Arc::new(ty)))
    }
}

impl TypeResolver for DefaultTypeResolver {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeRef> {
        if let Some(hit) = self.cache.get(descriptor) {
            return Ok(hit.value().clone());
        }
        let remapped = self
            .strategy
            .as_ref()
            .and_then(|strategy| strategy.remap(descriptor));
        let ty = match &remapped {
            Some(target) => {
                crate::trace!("remapping {} to {}", descriptor, target);
                self.resolve_uncached(target)?
            }
            None => self.resolve_uncached(descriptor)?,
        };
        self.cache.insert(descriptor.clone(), ty.clone());
        Ok(ty)
    }
}
