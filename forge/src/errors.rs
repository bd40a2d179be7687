//! Error types for the release-template forge

use thiserror::Error;

/// Main error type for the forge
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Phase error: {0}")]
    PhaseError(String),

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("Variable error: {0}")]
    VariableError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ForgeError {
    fn from(err: anyhow::Error) -> Self {
        ForgeError::Internal(err.to_string())
    }
}
