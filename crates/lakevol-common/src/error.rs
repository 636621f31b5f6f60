//! Error types for configuration loading.

use thiserror::Error;

/// Errors that can occur while loading or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A parameter is outside its valid range.
    #[error("Invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        /// Dotted path of the parameter (e.g. `curve.step`).
        name: &'static str,
        /// Offending value, formatted.
        value: String,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// Unknown policy or mode name.
    #[error("Unknown {kind} '{value}' (expected one of: {expected})")]
    UnknownVariant {
        /// What was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Accepted spellings.
        expected: &'static str,
    },
}
