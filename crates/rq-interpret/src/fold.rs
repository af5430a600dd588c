//! Constant folding with execution semantics, plugged into the engine's
//! preparation pipeline.

use rq_core::ast::Node;
use rq_core::error::Result;
use rq_core::types::GuardedResolver;
use rq_core::value::{DynamicValue, DynamicValueMapper};
use rq_optimize::passes::ClosedEvaluator;
use rq_optimize::transformations::ast_to_native::NativeGenerator;

use crate::engine::{QueryInterpreter, ResourceRoots};

/// Raises a closed sub-tree against the engine's guarded resolver, runs it
/// with no resources bound and maps the result back to a dynamic value.
pub struct InterpretingEvaluator {
    resolver: GuardedResolver,
    mapper: DynamicValueMapper,
}

impl InterpretingEvaluator {
    pub fn new(resolver: GuardedResolver, mapper: DynamicValueMapper) -> Self {
        Self { resolver, mapper }
    }
}

impl ClosedEvaluator for InterpretingEvaluator {
    fn evaluate(&self, node: &Node) -> Result<DynamicValue> {
        let expression = NativeGenerator::new(&self.resolver)
            .with_mapper(self.mapper.clone())
            .transform_node(node)?;
        let roots = ResourceRoots::new();
        let value = QueryInterpreter::new(&roots).evaluate(&expression)?;
        rq_core::trace!("folded {} into a constant", node.kind_name());
        self.mapper.to_dynamic(&value)
    }
}
