use parking_lot::RwLock;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::Scalar;
use crate::error::{Error, Result};
use crate::types::{TypeDescriptor, TypeKind, TypeRef};

/// Runtime value of the host: what the interpreter computes and what the
/// mapper converts to and from [`super::DynamicValue`].
#[derive(Debug, Clone)]
pub enum NativeValue {
    Null,
    Scalar(Scalar),
    Object(ObjectRef),
    Sequence(Sequence),
    Grouping(GroupingRef),
}

impl NativeValue {
    pub fn bool(value: bool) -> Self {
        NativeValue::Scalar(Scalar::Bool(value))
    }
    pub fn int(value: i64) -> Self {
        NativeValue::Scalar(Scalar::Int(value))
    }
    pub fn float(value: f64) -> Self {
        NativeValue::Scalar(Scalar::Float(value))
    }
    pub fn string(value: impl Into<String>) -> Self {
        NativeValue::Scalar(Scalar::String(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            NativeValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Scalar::as_bool)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            NativeValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Elements of anything enumerable: sequences and groupings.
    pub fn as_items(&self) -> Option<&[NativeValue]> {
        match self {
            NativeValue::Sequence(sequence) => Some(sequence.items()),
            NativeValue::Grouping(grouping) => Some(grouping.elements.items()),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> TypeDescriptor {
        match self {
            NativeValue::Null => TypeDescriptor::any(),
            NativeValue::Scalar(scalar) => scalar.descriptor(),
            NativeValue::Object(object) => object.ty().descriptor().clone(),
            NativeValue::Sequence(sequence) => TypeDescriptor::seq(sequence.element_type.clone()),
            NativeValue::Grouping(grouping) => grouping.ty.descriptor().clone(),
        }
    }

    /// Equality key: scalars by value, anonymous shapes by member values,
    /// everything else by identity. An anonymous object reached again
    /// through its own members keys by identity at that point.
    pub fn key(&self) -> ValueKey {
        self.key_on_path(&mut Vec::new())
    }

    fn key_on_path(&self, path: &mut Vec<usize>) -> ValueKey {
        match self {
            NativeValue::Null => ValueKey::Null,
            NativeValue::Scalar(scalar) => ValueKey::Scalar(scalar.clone()),
            NativeValue::Object(object) if object.ty().descriptor().is_anonymous => {
                let id = object.id();
                if path.contains(&id) {
                    return ValueKey::Identity(id);
                }
                path.push(id);
                let members = object
                    .fields()
                    .iter()
                    .map(|field| field.key_on_path(path))
                    .collect();
                path.pop();
                ValueKey::Composite(members)
            }
            NativeValue::Object(object) => ValueKey::Identity(object.id()),
            NativeValue::Sequence(sequence) => {
                ValueKey::Identity(Arc::as_ptr(&sequence.items) as *const () as usize)
            }
            NativeValue::Grouping(grouping) => {
                ValueKey::Identity(Arc::as_ptr(grouping) as *const () as usize)
            }
        }
    }

    /// Value equality as used by `Distinct`, `Contains` and `==` on
    /// non-scalars. Agrees with [`NativeValue::key`].
    pub fn same(&self, other: &NativeValue) -> bool {
        match (self, other) {
            (NativeValue::Scalar(l), NativeValue::Scalar(r)) => l == r,
            _ => self.key() == other.key(),
        }
    }
}

impl From<Scalar> for NativeValue {
    fn from(value: Scalar) -> Self {
        NativeValue::Scalar(value)
    }
}

impl From<ObjectRef> for NativeValue {
    fn from(value: ObjectRef) -> Self {
        NativeValue::Object(value)
    }
}

impl From<Sequence> for NativeValue {
    fn from(value: Sequence) -> Self {
        NativeValue::Sequence(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Null,
    Scalar(Scalar),
    Identity(usize),
    Composite(Vec<ValueKey>),
}

pub struct NativeObject {
    ty: TypeRef,
    fields: RwLock<Vec<NativeValue>>,
}

/// Shared handle to a host object. Identity is pointer identity, so several
/// handles may denote the same object and objects may form cycles.
#[derive(Clone)]
pub struct ObjectRef(Arc<NativeObject>);

impl ObjectRef {
    /// Allocate an instance with every member unset (null). No constructor
    /// logic runs; callers populate members afterwards.
    pub fn new(ty: TypeRef) -> Result<Self> {
        if !ty.is_object() {
            return Err(Error::mapping(format!(
                "cannot instantiate non-object type {}",
                ty.descriptor()
            )));
        }
        let fields = vec![NativeValue::Null; ty.members().len()];
        Ok(Self(Arc::new(NativeObject {
            ty,
            fields: RwLock::new(fields),
        })))
    }

    pub fn with_values<S: AsRef<str>>(
        ty: TypeRef,
        values: impl IntoIterator<Item = (S, NativeValue)>,
    ) -> Result<Self> {
        let object = Self::new(ty)?;
        for (name, value) in values {
            object.set(name.as_ref(), value)?;
        }
        Ok(object)
    }

    pub fn ty(&self) -> &TypeRef {
        &self.0.ty
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.0
            .ty
            .member_index(name)
            .ok_or_else(|| Error::UnresolvedMember {
                declaring_type: self.0.ty.descriptor().without_properties(),
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Result<NativeValue> {
        let index = self.index_of(name)?;
        Ok(self.0.fields.read()[index].clone())
    }

    pub fn set(&self, name: &str, value: NativeValue) -> Result<()> {
        let index = self.index_of(name)?;
        self.set_index(index, value);
        Ok(())
    }

    pub fn set_index(&self, index: usize, value: NativeValue) {
        if let Some(slot) = self.0.fields.write().get_mut(index) {
            *slot = value;
        }
    }

    /// Snapshot of the member values in declaration order.
    pub fn fields(&self) -> Vec<NativeValue> {
        self.0.fields.read().clone()
    }
}

impl Drop for NativeObject {
    // Long member chains would otherwise drop recursively, one frame per link.
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.fields.get_mut());
        while let Some(value) = pending.pop() {
            match value {
                NativeValue::Object(ObjectRef(object)) => {
                    if let Ok(mut object) = Arc::try_unwrap(object) {
                        pending.append(object.fields.get_mut());
                    }
                }
                NativeValue::Sequence(sequence) => {
                    if let Ok(items) = Arc::try_unwrap(sequence.items) {
                        pending.extend(items);
                    }
                }
                NativeValue::Grouping(grouping) => {
                    if let Ok(grouping) = Arc::try_unwrap(grouping) {
                        let Grouping { key, elements, .. } = grouping;
                        pending.push(key);
                        if let Ok(items) = Arc::try_unwrap(elements.items) {
                            pending.extend(items);
                        }
                    }
                }
                NativeValue::Null | NativeValue::Scalar(_) => {}
            }
        }
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // members may point back at this object
        write!(f, "{}@{:#x}", self.0.ty.descriptor(), self.id())
    }
}

#[derive(Debug, Clone)]
pub struct Sequence {
    pub element_type: TypeDescriptor,
    items: Arc<Vec<NativeValue>>,
}

impl Sequence {
    pub fn new(element_type: TypeDescriptor, items: Vec<NativeValue>) -> Self {
        Self {
            element_type,
            items: Arc::new(items),
        }
    }

    pub fn empty(element_type: TypeDescriptor) -> Self {
        Self::new(element_type, Vec::new())
    }

    pub fn items(&self) -> &[NativeValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub type GroupingRef = Arc<Grouping>;

#[derive(Debug)]
pub struct Grouping {
    pub ty: TypeRef,
    pub key: NativeValue,
    pub elements: Sequence,
}

impl Grouping {
    pub fn new(ty: TypeRef, key: NativeValue, elements: Sequence) -> Result<GroupingRef> {
        if !matches!(ty.kind(), TypeKind::Grouping { .. }) {
            return Err(Error::mapping(format!(
                "{} is not a grouping type",
                ty.descriptor()
            )));
        }
        Ok(Arc::new(Self { ty, key, elements }))
    }
}
