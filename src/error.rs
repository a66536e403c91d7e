use thiserror::Error;

use crate::readers::line_parser::ParseError;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record {line:?}: {source}")]
    MalformedRecord { line: String, source: ParseError },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Found {count} malformed lines")]
    MalformedInput { count: u64 },

    #[error("Pipeline worker panicked in {stage} stage")]
    WorkerPanicked { stage: &'static str },
}

impl From<config::ConfigError> for ProcessingError {
    fn from(err: config::ConfigError) -> Self {
        ProcessingError::Config(err.to_string())
    }
}
