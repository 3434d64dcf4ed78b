use std::path::PathBuf;
use thiserror::Error;

/// Main error type for qtriage
#[derive(Error, Debug)]
pub enum TriageError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Transport-level HTTP failures (connect, timeout, body decode)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status
    #[error("Backend returned {status}: {body}")]
    Server { status: u16, body: String },

    /// A batch submission is already outstanding
    #[error("A questionnaire submission is already in progress")]
    SubmissionInFlight,

    /// Upload rejected before it reached the backend
    #[error("Unsupported questionnaire file '{file_name}': expected one of {allowed:?}")]
    UnsupportedUpload {
        file_name: String,
        allowed: Vec<String>,
    },

    /// Upload file has no content
    #[error("Questionnaire file is empty: {path}")]
    EmptyUpload { path: PathBuf },

    /// An operation needed a batch but none is loaded
    #[error("No batch result is loaded")]
    NoBatchLoaded,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for qtriage operations
pub type Result<T> = std::result::Result<T, TriageError>;
