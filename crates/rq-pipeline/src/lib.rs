pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PipelineOptions;
pub use error::{Diagnostic, DiagnosticLevel, PipelineDiagnostics, PipelineError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStage};
