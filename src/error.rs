use thiserror::Error;

/// Errors raised while configuring, fitting or querying the classifier
#[derive(Debug, Error)]
pub enum Error {
    #[error("Empty or malformed input: {0}")]
    EmptyInput(String),

    #[error("Shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Input of {time_samples} time samples is too short: {stage} needs at least {required}")]
    InputTooShort {
        stage: &'static str,
        time_samples: usize,
        required: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Classifier has not been fitted")]
    NotFitted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
