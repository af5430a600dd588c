use std::collections::{BTreeMap, BTreeSet};

use super::Node;
use crate::common_struct;
use crate::error::Result;
use crate::types::TypeDescriptor;
use crate::value::DynamicValue;

common_struct! {
    /// The unit shipped between client and executor: an expression tree plus
    /// the values extracted from it.
    pub struct Query {
        pub root: Node,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub arguments: BTreeMap<String, DynamicValue>,
    }
}

impl Query {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: DynamicValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    /// Static type of the query result.
    pub fn result_type(&self) -> TypeDescriptor {
        self.root.ty()
    }

    /// Element types of every `Resource` root, deduplicated.
    pub fn root_types(&self) -> BTreeSet<TypeDescriptor> {
        let mut roots = BTreeSet::new();
        self.root.walk(&mut |node| {
            if let Node::Resource(resource) = node {
                roots.insert(resource.element_type.clone());
            }
        });
        roots
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

impl From<Node> for Query {
    fn from(root: Node) -> Self {
        Self::new(root)
    }
}
