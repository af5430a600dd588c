use std::sync::{Arc, OnceLock};

use rq_core::{Query, Result};
use rq_pipeline::{Pipeline, PipelineBuilder, PipelineDiagnostics, PipelineOptions};

use crate::passes::{
    CaptureExtraction, ClosedEvaluator, PartialEvaluation, PassStage, RootNormalization,
};

/// The preparation pipeline: partial evaluation, capture extraction and
/// root normalization, in that order. Running it twice is the same as
/// running it once.
pub struct Preparer {
    pipeline: Pipeline<Query, Query>,
    options: PipelineOptions,
}

impl Preparer {
    pub fn new() -> Self {
        Self::with_options(PipelineOptions::default())
    }

    pub fn with_options(options: PipelineOptions) -> Self {
        Self::build(PartialEvaluation::new(), options)
    }

    /// Fold every closed sub-tree through `evaluator`, not just scalar ones.
    pub fn with_evaluator(options: PipelineOptions, evaluator: Arc<dyn ClosedEvaluator>) -> Self {
        Self::build(PartialEvaluation::with_evaluator(evaluator), options)
    }

    fn build(partial_evaluation: PartialEvaluation, options: PipelineOptions) -> Self {
        let pipeline = PipelineBuilder::new()
            .add_optional_stage(PassStage(partial_evaluation))
            .add_optional_stage(PassStage(CaptureExtraction))
            .add_optional_stage(PassStage(RootNormalization))
            .build();
        Self { pipeline, options }
    }

    pub fn stages(&self) -> &[&'static str] {
        self.pipeline.stages()
    }

    pub fn prepare(&self, query: Query) -> Result<Query> {
        Ok(self.prepare_with_diagnostics(query)?.0)
    }

    pub fn prepare_with_diagnostics(&self, query: Query) -> Result<(Query, PipelineDiagnostics)> {
        let _span = tracing::debug_span!("rq.prepare").entered();
        let mut diagnostics = PipelineDiagnostics::default();
        let query = self.pipeline.run(query, &mut diagnostics, &self.options)?;
        Ok((query, diagnostics))
    }
}

impl Default for Preparer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepare with the default stage set.
pub fn prepare(query: Query) -> Result<Query> {
    static PREPARER: OnceLock<Preparer> = OnceLock::new();
    PREPARER.get_or_init(Preparer::new).prepare(query)
}
