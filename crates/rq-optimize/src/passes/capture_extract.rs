use std::collections::BTreeMap;

use rq_core::ast::{Node, NodeCapture};
use rq_core::value::DynamicValue;
use rq_core::{Query, Result};
use rq_pipeline::PipelineDiagnostics;

use super::QueryPass;

pub const CAPTURE_EXTRACTION: &str = "capture-extraction";

/// Moves closed-over values out of the tree into the query's argument
/// table, leaving `Variable` placeholders behind.
pub struct CaptureExtraction;

impl QueryPass for CaptureExtraction {
    fn name(&self) -> &'static str {
        CAPTURE_EXTRACTION
    }

    fn run(&self, query: Query, _diagnostics: &mut PipelineDiagnostics) -> Result<Query> {
        let Query {
            root,
            mut arguments,
        } = query;
        let root = root.transform_up(&mut |node| match node {
            Node::Capture(capture) => Ok(extract(capture, &mut arguments)),
            other => Ok(other),
        })?;
        Ok(Query { root, arguments })
    }
}

fn extract(capture: NodeCapture, arguments: &mut BTreeMap<String, DynamicValue>) -> Node {
    let name = argument_name(&capture, arguments);
    rq_core::trace!("extracting capture {} as {}", capture.name, name);
    arguments.insert(name.clone(), capture.value);
    Node::variable(name, capture.ty)
}

/// The capture's own name unless another value already holds it; then the
/// first free `name_N`.
fn argument_name(capture: &NodeCapture, arguments: &BTreeMap<String, DynamicValue>) -> String {
    let fits = |name: &str| match arguments.get(name) {
        None => true,
        Some(existing) => existing == &capture.value,
    };
    if fits(&capture.name) {
        return capture.name.clone();
    }
    (1..)
        .map(|suffix| format!("{}_{suffix}", capture.name))
        .find(|name| fits(name))
        .unwrap_or_else(|| capture.name.clone())
}
