use rq_core::ast::{Node, NodeResource};
use rq_core::{Query, Result};
use rq_pipeline::PipelineDiagnostics;

use super::QueryPass;

pub const ROOT_NORMALIZATION: &str = "root-normalization";

/// Rewrites open root forms into `Resource { element_type: T }`: null
/// `Queryable<T>` placeholders and resources whose element type is itself a
/// `Queryable<T>`.
pub struct RootNormalization;

impl QueryPass for RootNormalization {
    fn name(&self) -> &'static str {
        ROOT_NORMALIZATION
    }

    fn run(&self, query: Query, _diagnostics: &mut PipelineDiagnostics) -> Result<Query> {
        let Query { root, arguments } = query;
        let root = root.transform_up(&mut |node| Ok(normalize(node)))?;
        Ok(Query { root, arguments })
    }
}

fn normalize(node: Node) -> Node {
    match node {
        Node::Constant(constant) if constant.value.is_null() && constant.ty.is_queryable() => {
            match constant.ty.element_type() {
                Some(element_type) => unwrap_queryable(element_type),
                None => Node::Constant(constant),
            }
        }
        Node::Resource(resource) if resource.element_type.is_queryable() => {
            unwrap_queryable(resource.element_type)
        }
        other => other,
    }
}

fn unwrap_queryable(mut element_type: rq_core::TypeDescriptor) -> Node {
    while element_type.is_queryable() {
        match element_type.element_type() {
            Some(inner) => element_type = inner,
            None => break,
        }
    }
    Node::Resource(NodeResource { element_type })
}
