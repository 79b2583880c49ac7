use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_NAMESPACE: &str = "onboarding-draft";

/// What `submit` validates before calling the completion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Only the step being submitted; earlier steps were gated by `advance`.
    #[default]
    CurrentStep,
    /// Every step visible for the current data, in slot order.
    AllVisibleSteps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Key the draft snapshot is stored under.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_persist")]
    pub persist: bool,
    #[serde(default)]
    pub submit_policy: SubmitPolicy,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_persist() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            persist: default_persist(),
            submit_policy: SubmitPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Blank input yields the defaults.
    pub fn from_json(config_json: &str) -> Result<Self, EngineError> {
        if config_json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(config_json).map_err(EngineError::Config)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.submit_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_config_uses_defaults() {
        let config = EngineConfig::from_json("  ").expect("config");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.namespace, "onboarding-draft");
        assert!(config.persist);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config =
            EngineConfig::from_json(r#"{"submit_policy":"all_visible_steps"}"#).expect("config");
        assert_eq!(config.submit_policy, SubmitPolicy::AllVisibleSteps);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(matches!(
            EngineConfig::from_json("{"),
            Err(EngineError::Config(_))
        ));
    }
}
