//! Configuration for the geometry solver

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading solver configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read solver config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse solver config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid solver config value: {0}")]
    Invalid(String),
}

/// Configuration options for the topology builder, coordinate
/// propagator, and csys resolver
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Decimal places for solved node coordinates and orientations
    pub precision: u32,

    /// Maximum hops a csys parent chain may take before it is treated
    /// as cyclic
    pub max_chain_depth: usize,

    /// Length range (inches) for placeholder segments synthesized by
    /// the topology builder
    pub placeholder_length: (f64, f64),

    /// Name used for the hub node when seeding a spoke topology
    pub hub_name: String,

    /// Whether `item_type` values must match case exactly when records
    /// cross the flat-table boundary
    pub case_sensitive_item_types: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            precision: 2,
            max_chain_depth: 64,
            placeholder_length: (1.0, 20.0),
            hub_name: "HUB".to_string(),
            case_sensitive_item_types: false,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coordinate rounding precision
    pub fn with_precision(mut self, decimals: u32) -> Self {
        self.precision = decimals;
        self
    }

    /// Set the csys chain hop bound
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Set the placeholder segment length range
    pub fn with_placeholder_length(mut self, min: f64, max: f64) -> Self {
        self.placeholder_length = (min, max);
        self
    }

    /// Set the synthesized hub node name
    pub fn with_hub_name(mut self, name: impl Into<String>) -> Self {
        self.hub_name = name.into();
        self
    }

    /// Require exact-case `item_type` matching
    pub fn with_case_sensitive_item_types(mut self, on: bool) -> Self {
        self.case_sensitive_item_types = on;
        self
    }

    /// Load configuration from a TOML file, falling back to defaults
    /// for any omitted key
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let toml_config: TomlConfig = toml::from_str(content)?;
        if let Some((min, max)) = toml_config.placeholder_length {
            if !(min < max) || min <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "placeholder_length must be a positive range with min < max, got [{min}, {max}]"
                )));
            }
        }
        let defaults = Self::default();
        Ok(Self {
            precision: toml_config.precision.unwrap_or(defaults.precision),
            max_chain_depth: toml_config
                .max_chain_depth
                .unwrap_or(defaults.max_chain_depth),
            placeholder_length: toml_config
                .placeholder_length
                .unwrap_or(defaults.placeholder_length),
            hub_name: toml_config.hub_name.unwrap_or(defaults.hub_name),
            case_sensitive_item_types: toml_config
                .case_sensitive_item_types
                .unwrap_or(defaults.case_sensitive_item_types),
        })
    }
}

/// TOML structure for deserializing solver configuration
#[derive(Deserialize)]
struct TomlConfig {
    precision: Option<u32>,
    max_chain_depth: Option<usize>,
    placeholder_length: Option<(f64, f64)>,
    hub_name: Option<String>,
    case_sensitive_item_types: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.precision, 2);
        assert_eq!(config.max_chain_depth, 64);
        assert_eq!(config.placeholder_length, (1.0, 20.0));
        assert_eq!(config.hub_name, "HUB");
        assert!(!config.case_sensitive_item_types);
    }

    #[test]
    fn test_builder_pattern() {
        let config = SolverConfig::new()
            .with_precision(3)
            .with_hub_name("FB_HUB")
            .with_max_chain_depth(16);

        assert_eq!(config.precision, 3);
        assert_eq!(config.hub_name, "FB_HUB");
        assert_eq!(config.max_chain_depth, 16);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SolverConfig::from_toml_str(
            r#"
            precision = 4
            placeholder_length = [2.0, 8.0]
        "#,
        )
        .unwrap();

        assert_eq!(config.precision, 4);
        assert_eq!(config.placeholder_length, (2.0, 8.0));
        // Omitted keys fall back to defaults
        assert_eq!(config.max_chain_depth, 64);
        assert_eq!(config.hub_name, "HUB");
    }

    #[test]
    fn test_from_toml_rejects_empty_length_range() {
        let result = SolverConfig::from_toml_str("placeholder_length = [20.0, 1.0]");
        match result {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("placeholder_length")),
            other => panic!("expected Invalid, got {other:?}"),
        }

        let result = SolverConfig::from_toml_str("placeholder_length = [5.0, 5.0]");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = SolverConfig::from_toml_str("precision = \"not a number\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
