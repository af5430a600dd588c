//! Query preparation passes: ordered, idempotent `Query -> Query` rewrites.

mod capture_extract;
mod normalize_roots;
mod partial_eval;

pub use capture_extract::*;
pub use normalize_roots::*;
pub use partial_eval::*;

use rq_core::{Query, Result};
use rq_pipeline::{PipelineDiagnostics, PipelineError, PipelineStage};

pub trait QueryPass: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, query: Query, diagnostics: &mut PipelineDiagnostics) -> Result<Query>;
}

/// Runs a [`QueryPass`] as a pipeline stage.
pub struct PassStage<P>(pub P);

impl<P: QueryPass> PipelineStage for PassStage<P> {
    type SrcCtx = Query;
    type DstCtx = Query;

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn run(
        &self,
        context: Query,
        diagnostics: &mut PipelineDiagnostics,
    ) -> std::result::Result<Query, PipelineError> {
        self.0
            .run(context, diagnostics)
            .map_err(|err| PipelineError::from_error(self.0.name(), err))
    }
}
