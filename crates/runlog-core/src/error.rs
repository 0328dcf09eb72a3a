//! Error types for runlog-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("tracking server rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parameter '{key}' already logged with value '{existing}'")]
    DuplicateParam { key: String, existing: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact upload failed for '{key}': {reason}")]
    Upload { key: String, reason: String },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TrackError>;
