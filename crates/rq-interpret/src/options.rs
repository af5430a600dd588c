use serde::{Deserialize, Serialize};

use rq_core::config::{strict_mapping, type_emission_enabled};
use rq_pipeline::PipelineOptions;

fn enabled() -> bool {
    true
}

/// Engine settings. Deserializable so hosts can keep them in their own
/// configuration files; unset fields fall back to the environment switches
/// in [`rq_core::config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Run the preparation pipeline before binding. Preparation is
    /// idempotent, so already prepared queries are unaffected.
    #[serde(default = "enabled")]
    pub prepare: bool,
    /// Synthesize types for descriptors with no registered counterpart.
    #[serde(default = "type_emission_enabled")]
    pub emit_types: bool,
    /// Reject result and argument bags with unknown members.
    #[serde(default = "strict_mapping")]
    pub strict_mapping: bool,
    /// Preparation stages to skip, by name.
    #[serde(default)]
    pub disabled_stages: Vec<String>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            prepare: true,
            emit_types: type_emission_enabled(),
            strict_mapping: strict_mapping(),
            disabled_stages: Vec::new(),
        }
    }
}

impl ExecutionOptions {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            disabled_stages: self.disabled_stages.clone(),
            ..PipelineOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: ExecutionOptions =
            serde_json::from_str(r#"{ "disabled_stages": ["partial-eval"] }"#).unwrap();
        assert!(options.prepare);
        assert_eq!(options.disabled_stages, vec!["partial-eval".to_string()]);
        assert!(options.pipeline_options().is_disabled("partial-eval"));
    }
}
