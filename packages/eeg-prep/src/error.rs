use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Invalid filter specification: {0}")]
    InvalidFilterSpec(String),

    #[error("No events match the requested codes: {codes:?}")]
    NoMatchingEvents { codes: Vec<i32> },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PrepError {
    pub(crate) fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        PrepError::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
