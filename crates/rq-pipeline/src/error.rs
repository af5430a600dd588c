use crate::config::PipelineOptions;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PipelineDiagnostics {
    pub items: Vec<Diagnostic>,
    emitted: usize,
}

impl PipelineDiagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Log what `stage` reported. Items stay available to the caller.
    pub fn emit_stage(&mut self, stage: &'static str, options: &PipelineOptions) {
        for diagnostic in &self.items[self.emitted..] {
            match diagnostic.level {
                DiagnosticLevel::Info if options.verbose => {
                    tracing::info!(stage, "{}", diagnostic.message)
                }
                DiagnosticLevel::Info => tracing::debug!(stage, "{}", diagnostic.message),
                DiagnosticLevel::Warning => tracing::warn!(stage, "{}", diagnostic.message),
                DiagnosticLevel::Error => tracing::error!(stage, "{}", diagnostic.message),
            }
        }
        self.emitted = self.items.len();
    }

    pub fn has_errors(&self) -> bool {
        self.first_error().is_some()
    }

    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.items
            .iter()
            .find(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }
}

/// A failed stage. Errors raised by the query model keep their kind through
/// the pipeline and come back out unchanged when converted.
#[derive(Debug)]
pub struct PipelineError {
    pub stage: &'static str,
    pub message: String,
    source: Option<rq_core::Error>,
}

impl PipelineError {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            source: None,
        }
    }

    pub fn from_error(stage: &'static str, error: rq_core::Error) -> Self {
        Self {
            stage,
            message: error.to_string(),
            source: Some(error),
        }
    }

    /// Re-attribute to `stage`, keeping the underlying error.
    pub fn in_stage(self, stage: &'static str) -> Self {
        Self { stage, ..self }
    }

    pub fn kind(&self) -> &str {
        self.source.as_ref().map_or("Generic", rq_core::Error::kind)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|error| error as &(dyn Error + 'static))
    }
}

impl From<PipelineError> for rq_core::Error {
    fn from(error: PipelineError) -> Self {
        match error.source {
            Some(source) => source,
            None => rq_core::Error::Generic(rq_core::eyre::Error::msg(error.to_string())),
        }
    }
}
