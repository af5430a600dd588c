use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::{ConcreteType, TypeDescriptor, TypeKey, TypeKind, TypeRef, TypeResolver};
use crate::error::{Error, Result};

/// Known-type allow-list: which named types may be resolved or instantiated
/// during execution. Primitives and the built-in generic shapes are always
/// allowed; their arguments and properties are still checked.
#[derive(Clone)]
pub struct AllowList {
    predicate: Arc<dyn Fn(&ConcreteType) -> bool + Send + Sync>,
}

impl AllowList {
    pub fn new(predicate: impl Fn(&ConcreteType) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn only(types: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        let keys: HashSet<TypeKey> = types.into_iter().map(|ty| ty.key()).collect();
        Self::new(move |ty| keys.contains(&ty.descriptor().key()))
    }

    pub fn check(&self, ty: &ConcreteType, resolver: &dyn TypeResolver) -> Result<()> {
        match ty.kind() {
            TypeKind::Primitive(_) => Ok(()),
            TypeKind::Class { .. } => self.check_named(ty),
            TypeKind::Sequence(element)
            | TypeKind::Queryable(element)
            | TypeKind::Expression(element) => self.check(element, resolver),
            TypeKind::Grouping { key, element } => {
                self.check(key, resolver)?;
                self.check(element, resolver)
            }
            TypeKind::Function { parameters, result } => {
                for parameter in parameters {
                    self.check(parameter, resolver)?;
                }
                self.check(result, resolver)
            }
            TypeKind::Emitted { members } => {
                if !ty.descriptor().is_anonymous {
                    self.check_named(ty)?;
                }
                for member in members {
                    let member_ty = resolver.resolve(&member.ty)?;
                    self.check(&member_ty, resolver)?;
                }
                Ok(())
            }
        }
    }

    fn check_named(&self, ty: &ConcreteType) -> Result<()> {
        if (self.predicate)(ty) {
            Ok(())
        } else {
            crate::warn!("rejecting type {} not on the allow-list", ty.descriptor());
            Err(Error::TypeNotAllowed(ty.descriptor().without_properties()))
        }
    }
}

impl Debug for AllowList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AllowList(..)")
    }
}

/// Resolver that runs every resolution through an optional allow-list.
#[derive(Clone)]
pub struct GuardedResolver {
    inner: Arc<dyn TypeResolver>,
    allow: Option<AllowList>,
}

impl GuardedResolver {
    pub fn new(inner: Arc<dyn TypeResolver>, allow: Option<AllowList>) -> Self {
        Self { inner, allow }
    }

    pub fn inner(&self) -> &Arc<dyn TypeResolver> {
        &self.inner
    }
}

impl TypeResolver for GuardedResolver {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeRef> {
        let ty = self.inner.resolve(descriptor)?;
        if let Some(allow) = &self.allow {
            allow.check(&ty, self.inner.as_ref())?;
        }
        Ok(ty)
    }
}
