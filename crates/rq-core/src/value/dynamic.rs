use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use super::Scalar;
use crate::types::TypeDescriptor;
use crate::{common_enum, common_struct};

pub type ReferenceId = u32;

common_enum! {
    /// Self-describing, transport-safe value graph.
    ///
    /// `Reference(id)` stands for an object emitted earlier in the same graph
    /// with `reference: Some(id)`; this is how shared and cyclic object graphs
    /// are encoded without duplication.
    #[serde(rename_all = "snake_case")]
    pub enum DynamicValue {
        Null,
        Scalar(Scalar),
        List(DynamicList),
        Object(DynamicObject),
        Reference(ReferenceId),
    }
}

common_struct! {
    pub struct DynamicList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub element_type: Option<TypeDescriptor>,
        pub items: Vec<DynamicValue>,
    }
}

common_struct! {
    pub struct DynamicObject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub ty: Option<TypeDescriptor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reference: Option<ReferenceId>,
        pub entries: Vec<DynamicEntry>,
    }
}

common_struct! {
    pub struct DynamicEntry {
        pub name: String,
        pub value: DynamicValue,
    }
}

impl DynamicValue {
    pub fn scalar(value: impl Into<Scalar>) -> Self {
        DynamicValue::Scalar(value.into())
    }

    pub fn list(items: Vec<DynamicValue>) -> Self {
        DynamicValue::List(DynamicList {
            element_type: None,
            items,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            DynamicValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&DynamicList> {
        match self {
            DynamicValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DynamicObject> {
        match self {
            DynamicValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Shortcut for `as_object()?.get(name)`.
    pub fn get(&self, name: &str) -> Option<&DynamicValue> {
        self.as_object()?.get(name)
    }
}

impl DynamicObject {
    pub fn new(ty: Option<TypeDescriptor>) -> Self {
        Self {
            ty,
            reference: None,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: DynamicValue) -> Self {
        self.entries.push(DynamicEntry {
            name: name.into(),
            value,
        });
        self
    }

    pub fn with_reference(mut self, reference: ReferenceId) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DynamicValue> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }
}

// Deep graphs (long `Next` chains) nest one object per link; unwind them
// with a worklist instead of recursive drop glue.
impl Drop for DynamicObject {
    fn drop(&mut self) {
        release(self.entries.drain(..).map(|entry| entry.value).collect());
    }
}

impl Drop for DynamicList {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.items));
    }
}

fn release(mut pending: Vec<DynamicValue>) {
    while let Some(value) = pending.pop() {
        match value {
            DynamicValue::Object(mut object) => {
                pending.extend(object.entries.drain(..).map(|entry| entry.value))
            }
            DynamicValue::List(mut list) => pending.append(&mut list.items),
            DynamicValue::Null | DynamicValue::Scalar(_) | DynamicValue::Reference(_) => {}
        }
    }
}

impl From<Scalar> for DynamicValue {
    fn from(value: Scalar) -> Self {
        DynamicValue::Scalar(value)
    }
}

impl From<DynamicObject> for DynamicValue {
    fn from(value: DynamicObject) -> Self {
        DynamicValue::Object(value)
    }
}

impl Display for DynamicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DynamicValue::Null => write!(f, "null"),
            DynamicValue::Scalar(scalar) => write!(f, "{scalar}"),
            DynamicValue::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            DynamicValue::Object(object) => {
                if let Some(reference) = object.reference {
                    write!(f, "#{reference} ")?;
                }
                write!(f, "{{")?;
                for (i, entry) in object.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", entry.name, entry.value)?;
                }
                write!(f, "}}")
            }
            DynamicValue::Reference(reference) => write!(f, "@{reference}"),
        }
    }
}
