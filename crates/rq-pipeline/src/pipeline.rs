use crate::config::PipelineOptions;
use crate::error::{PipelineDiagnostics, PipelineError};
use std::marker::PhantomData;

pub trait PipelineStage: Send + Sync {
    type SrcCtx;
    type DstCtx;

    fn name(&self) -> &'static str;
    fn run(
        &self,
        context: Self::SrcCtx,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<Self::DstCtx, PipelineError>;
}

type RunFn<Src, Dst> = Box<
    dyn Fn(Src, &mut PipelineDiagnostics, &PipelineOptions) -> Result<Dst, PipelineError>
        + Send
        + Sync,
>;

pub struct Pipeline<Src, Dst> {
    stages: Vec<&'static str>,
    run: RunFn<Src, Dst>,
}

impl<Src, Dst> Pipeline<Src, Dst> {
    pub fn run(
        &self,
        context: Src,
        diagnostics: &mut PipelineDiagnostics,
        options: &PipelineOptions,
    ) -> Result<Dst, PipelineError> {
        (self.run)(context, diagnostics, options)
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> &[&'static str] {
        &self.stages
    }
}

pub struct PipelineBuilder<Src, Dst> {
    pipeline: Pipeline<Src, Dst>,
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src> PipelineBuilder<Src, Src> {
    pub fn new() -> Self {
        let run = |context: Src,
                   _diagnostics: &mut PipelineDiagnostics,
                   _options: &PipelineOptions| Ok(context);
        Self {
            pipeline: Pipeline {
                stages: Vec::new(),
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }
}

impl<Src> Default for PipelineBuilder<Src, Src> {
    fn default() -> Self {
        Self::new()
    }
}

fn run_stage<S>(
    stage: &S,
    context: S::SrcCtx,
    diagnostics: &mut PipelineDiagnostics,
    options: &PipelineOptions,
) -> Result<S::DstCtx, PipelineError>
where
    S: PipelineStage,
{
    let name = stage.name();
    let _span = tracing::debug_span!("rq.stage", stage = name).entered();
    match stage.run(context, diagnostics) {
        Ok(next) => {
            diagnostics.emit_stage(name, options);
            // a stage may finish yet report errors it could not recover from
            match diagnostics.first_error() {
                Some(error) => Err(PipelineError::new(name, error.message.clone())),
                None => Ok(next),
            }
        }
        Err(err) => Err(err.in_stage(name)),
    }
}

impl<Src, Mid> PipelineBuilder<Src, Mid> {
    pub fn add_stage<Next, S>(self, stage: S) -> PipelineBuilder<Src, Next>
    where
        S: PipelineStage<SrcCtx = Mid, DstCtx = Next> + 'static,
        Src: 'static,
        Mid: 'static,
        Next: 'static,
    {
        let mut stages = self.pipeline.stages;
        stages.push(stage.name());
        let previous = self.pipeline.run;
        let run = move |context: Src,
                        diagnostics: &mut PipelineDiagnostics,
                        options: &PipelineOptions| {
            let mid = previous(context, diagnostics, options)?;
            run_stage(&stage, mid, diagnostics, options)
        };

        PipelineBuilder {
            pipeline: Pipeline {
                stages,
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }

    /// Add a context-preserving stage that `PipelineOptions::disabled_stages`
    /// can switch off.
    pub fn add_optional_stage<S>(self, stage: S) -> PipelineBuilder<Src, Mid>
    where
        S: PipelineStage<SrcCtx = Mid, DstCtx = Mid> + 'static,
        Src: 'static,
        Mid: 'static,
    {
        let mut stages = self.pipeline.stages;
        stages.push(stage.name());
        let previous = self.pipeline.run;
        let run = move |context: Src,
                        diagnostics: &mut PipelineDiagnostics,
                        options: &PipelineOptions| {
            let mid = previous(context, diagnostics, options)?;
            if options.is_disabled(stage.name()) {
                tracing::trace!(stage = stage.name(), "stage disabled");
                return Ok(mid);
            }
            run_stage(&stage, mid, diagnostics, options)
        };

        PipelineBuilder {
            pipeline: Pipeline {
                stages,
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Pipeline<Src, Mid> {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostic;

    struct Double;

    impl PipelineStage for Double {
        type SrcCtx = i64;
        type DstCtx = i64;

        fn name(&self) -> &'static str {
            "double"
        }

        fn run(&self, context: i64, diagnostics: &mut PipelineDiagnostics) -> Result<i64, PipelineError> {
            diagnostics.push(Diagnostic::info(format!("doubling {context}")));
            Ok(context * 2)
        }
    }

    struct Render;

    impl PipelineStage for Render {
        type SrcCtx = i64;
        type DstCtx = String;

        fn name(&self) -> &'static str {
            "render"
        }

        fn run(&self, context: i64, _: &mut PipelineDiagnostics) -> Result<String, PipelineError> {
            if context < 0 {
                return Err(PipelineError::new("inner", "negative"));
            }
            Ok(context.to_string())
        }
    }

    #[test]
    fn stages_run_in_order() {
        let pipeline = PipelineBuilder::new()
            .add_optional_stage(Double)
            .add_stage(Render)
            .build();
        let mut diagnostics = PipelineDiagnostics::default();
        let out = pipeline
            .run(21, &mut diagnostics, &PipelineOptions::default())
            .unwrap();
        assert_eq!(out, "42");
        assert_eq!(pipeline.stages(), ["double", "render"]);
        assert_eq!(diagnostics.items.len(), 1);
    }

    #[test]
    fn disabled_stage_is_skipped() {
        let pipeline = PipelineBuilder::new()
            .add_optional_stage(Double)
            .add_stage(Render)
            .build();
        let options = PipelineOptions::default().disable("double");
        let out = pipeline
            .run(21, &mut PipelineDiagnostics::default(), &options)
            .unwrap();
        assert_eq!(out, "21");
    }

    struct Reject;

    impl PipelineStage for Reject {
        type SrcCtx = i64;
        type DstCtx = i64;

        fn name(&self) -> &'static str {
            "reject"
        }

        fn run(&self, context: i64, diagnostics: &mut PipelineDiagnostics) -> Result<i64, PipelineError> {
            if context == 0 {
                diagnostics.push(Diagnostic::error("zero is not accepted"));
            }
            if context > 100 {
                return Err(PipelineError::from_error(
                    "reject",
                    rq_core::Error::mapping(format!("{context} is too large")),
                ));
            }
            Ok(context)
        }
    }

    #[test]
    fn error_diagnostics_stop_the_pipeline() {
        let pipeline = PipelineBuilder::new()
            .add_optional_stage(Reject)
            .add_optional_stage(Double)
            .build();
        let mut diagnostics = PipelineDiagnostics::default();
        let err = pipeline
            .run(0, &mut diagnostics, &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(err.stage, "reject");
        assert_eq!(err.message, "zero is not accepted");
        assert!(diagnostics.has_errors());
        // `double` never ran
        assert_eq!(diagnostics.items.len(), 1);
    }

    #[test]
    fn stage_errors_keep_their_kind() {
        let pipeline = PipelineBuilder::new().add_stage(Reject).build();
        let err = pipeline
            .run(101, &mut PipelineDiagnostics::default(), &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "Mapping");
        assert!(std::error::Error::source(&err).is_some());

        let converted = rq_core::Error::from(err);
        assert_eq!(converted.kind(), "Mapping");
        assert!(matches!(converted, rq_core::Error::Mapping(message) if message == "101 is too large"));
    }

    #[test]
    fn plain_stage_errors_convert_to_generic() {
        let pipeline = PipelineBuilder::new().add_stage(Render).build();
        let err = pipeline
            .run(-1, &mut PipelineDiagnostics::default(), &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(rq_core::Error::from(err).kind(), "Generic");
    }

    #[test]
    fn errors_are_attributed_to_the_failing_stage() {
        let pipeline = PipelineBuilder::new().add_stage(Render).build();
        let err = pipeline
            .run(-1, &mut PipelineDiagnostics::default(), &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(err.stage, "render");
        assert_eq!(err.to_string(), "[render] negative");
    }
}
