use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Names of optional stages to skip.
    pub disabled_stages: Vec<String>,
    /// Emit informational diagnostics, not only warnings and errors.
    pub verbose: bool,
}

impl PipelineOptions {
    pub fn is_disabled(&self, stage: &str) -> bool {
        self.disabled_stages.iter().any(|name| name == stage)
    }

    pub fn disable(mut self, stage: impl Into<String>) -> Self {
        self.disabled_stages.push(stage.into());
        self
    }
}
