//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no kiln configuration found")]
    NotFound,

    #[error("invalid config value in {field}: {hint}")]
    InvalidValue { field: String, hint: String },

    #[error("invalid build variant {name:?}: {reason}")]
    InvalidVariant { name: String, reason: String },

    #[error("project root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
