use parking_lot::RwLock;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::methods::{MethodInfo, MethodKey};
use crate::error::{Error, Result};
use crate::types::{
    ConcreteType, Member, MemberDescriptor, MethodDescriptor, TypeDescriptor, TypeKind, TypeRef,
};
use crate::value::NativeValue;

struct ParameterInfo {
    name: String,
    ty: TypeRef,
}

/// Lambda parameter. Two references denote the same parameter only when
/// they share the allocation, regardless of name.
#[derive(Clone)]
pub struct ParameterRef(Arc<ParameterInfo>);

impl ParameterRef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self(Arc::new(ParameterInfo {
            name: name.into(),
            ty,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.0.ty
    }

    pub fn ptr_eq(&self, other: &ParameterRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for ParameterRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.0.name, self.0.ty)
    }
}

/// Resolved member: the declaring type, the member entry and its resolved
/// type.
#[derive(Debug, Clone)]
pub struct MemberRef {
    pub declaring_type: TypeRef,
    pub member: Member,
    pub ty: TypeRef,
}

impl MemberRef {
    pub fn name(&self) -> &str {
        &self.member.name
    }

    pub fn descriptor(&self) -> MemberDescriptor {
        MemberDescriptor::new(self.declaring_type.descriptor().clone(), self.member.name.clone())
    }
}

/// Find a member by name: declared members of object types plus the
/// built-in `Length` of strings and `Key`/`Elements` of groupings.
pub fn lookup_member(ty: &ConcreteType, name: &str) -> Option<Member> {
    if let Some(member) = ty.member(name) {
        return Some(member.clone());
    }
    match (ty.kind(), name) {
        (TypeKind::Primitive(_), "Length") if ty.descriptor().is_core("string") => {
            Some(Member::new("Length", TypeDescriptor::int()).read_only())
        }
        (TypeKind::Grouping { key, .. }, "Key") => {
            Some(Member::new("Key", key.descriptor().clone()).read_only())
        }
        (TypeKind::Grouping { element, .. }, "Elements") => Some(
            Member::new("Elements", TypeDescriptor::seq(element.descriptor().clone())).read_only(),
        ),
        _ => None,
    }
}

/// A catalog method closed over concrete generic arguments.
#[derive(Debug, Clone)]
pub struct MethodRef {
    info: Arc<MethodInfo>,
    generic_arguments: Vec<TypeRef>,
}

impl MethodRef {
    pub fn new(info: Arc<MethodInfo>, generic_arguments: Vec<TypeRef>) -> Result<Self> {
        if info.generic_arity != generic_arguments.len() {
            return Err(Error::unsupported_with(
                "MethodCall",
                format!(
                    "{} expects {} generic arguments, got {}",
                    info.name,
                    info.generic_arity,
                    generic_arguments.len()
                ),
            ));
        }
        Ok(Self {
            info,
            generic_arguments,
        })
    }

    pub fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn key(&self) -> MethodKey {
        self.info.key()
    }

    pub fn generic_arguments(&self) -> &[TypeRef] {
        &self.generic_arguments
    }

    fn closed(&self, open: &TypeDescriptor) -> TypeDescriptor {
        let arguments: Vec<_> = self
            .generic_arguments
            .iter()
            .map(|ty| ty.descriptor().clone())
            .collect();
        open.substitute(&arguments)
    }

    pub fn parameter_types(&self) -> Vec<TypeDescriptor> {
        self.info
            .parameters
            .iter()
            .map(|parameter| self.closed(parameter))
            .collect()
    }

    pub fn return_type(&self) -> TypeDescriptor {
        self.closed(&self.info.return_type)
    }

    pub fn descriptor(&self) -> MethodDescriptor {
        MethodDescriptor {
            declaring_type: self.info.declaring_type.clone(),
            name: self.info.name.clone(),
            parameter_types: self.info.parameters.clone(),
            generic_arguments: self
                .generic_arguments
                .iter()
                .map(|ty| ty.descriptor().clone())
                .collect(),
        }
    }
}

/// Closed-over variable. The expression reads the cell when evaluated, so
/// later writes by the owner are observed.
#[derive(Clone)]
pub struct CapturedCell {
    name: String,
    ty: TypeRef,
    value: Arc<RwLock<NativeValue>>,
}

impl CapturedCell {
    pub fn new(name: impl Into<String>, ty: TypeRef, value: NativeValue) -> Self {
        Self {
            name: name.into(),
            ty,
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn get(&self) -> NativeValue {
        self.value.read().clone()
    }

    pub fn set(&self, value: NativeValue) {
        *self.value.write() = value;
    }
}

impl Debug for CapturedCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "captured {}: {}", self.name, self.ty)
    }
}
