//! Configuration file parsing for mutation testing

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bytecode::ClassName;
use crate::error::MutationError;
use crate::operators;
use crate::timeout::PercentAndConstantTimeoutStrategy;

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub settings: Settings,
    /// Classes to mutate; every class of the program when empty
    #[serde(default)]
    pub classes: Vec<ClassName>,
}

/// Settings consumed by the mutation test builder
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Maximum mutations per execution unit, 0 for one unit per class
    #[serde(default)]
    pub mutation_unit_size: usize,
    /// Log every mutant outcome
    #[serde(default)]
    pub verbose: bool,
    /// Multiplier applied to the baseline test time
    #[serde(default = "default_timeout_factor")]
    pub timeout_factor: f32,
    /// Milliseconds added to every timeout
    #[serde(default = "default_timeout_constant")]
    pub timeout_constant_ms: u64,
    /// Operator and group names, applied in this order
    #[serde(default = "default_mutators")]
    pub mutators: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mutation_unit_size: 0,
            verbose: false,
            timeout_factor: default_timeout_factor(),
            timeout_constant_ms: default_timeout_constant(),
            mutators: default_mutators(),
        }
    }
}

fn default_timeout_factor() -> f32 {
    PercentAndConstantTimeoutStrategy::DEFAULT_FACTOR
}

fn default_timeout_constant() -> u64 {
    PercentAndConstantTimeoutStrategy::DEFAULT_CONSTANT_MS
}

fn default_mutators() -> Vec<String> {
    vec![operators::DEFAULTS_GROUP.to_string()]
}

impl Settings {
    pub fn validate(&self) -> Result<(), MutationError> {
        if !self.timeout_factor.is_finite() || self.timeout_factor < 0.0 {
            return Err(MutationError::ConfigError {
                message: format!(
                    "timeout_factor must be a non-negative number, got {}",
                    self.timeout_factor
                ),
            });
        }
        if self.mutators.is_empty() {
            return Err(MutationError::ConfigError {
                message: "at least one mutator must be configured".to_string(),
            });
        }
        operators::from_names(&self.mutators)?;
        Ok(())
    }

    pub fn timeout_strategy(&self) -> PercentAndConstantTimeoutStrategy {
        PercentAndConstantTimeoutStrategy::new(self.timeout_factor, self.timeout_constant_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, MutationError> {
        let content = std::fs::read_to_string(path).map_err(|e| MutationError::ConfigError {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| MutationError::ConfigError {
                message: format!("Failed to parse config file '{}': {}", path.display(), e),
            })?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MutationError> {
        self.settings.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
version: "1.0"
settings:
  mutation_unit_size: 2
  timeout_factor: 1.5
  timeout_constant_ms: 250
  mutators: [MATH, CONSTRUCTOR_CALLS]
classes:
  - com/example/Foo
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.settings.mutation_unit_size, 2);
        assert_eq!(config.settings.timeout_constant_ms, 250);
        assert_eq!(config.classes, vec![ClassName::new("com/example/Foo")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
version: "1.0"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.settings.mutators, vec!["DEFAULTS".to_string()]);
        assert!(config.classes.is_empty());
    }

    #[test]
    fn test_negative_unit_size_rejected() {
        let yaml = r#"
version: "1.0"
settings:
  mutation_unit_size: -1
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut settings = Settings::default();
        settings.timeout_factor = f32::NAN;
        assert!(matches!(
            settings.validate(),
            Err(MutationError::ConfigError { .. })
        ));

        let mut settings = Settings::default();
        settings.mutators = vec!["UNKNOWN".to_string()];
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.mutators.clear();
        assert!(settings.validate().is_err());
    }
}
