use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaterfallError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown deal template: {0}")]
    UnknownTemplate(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for WaterfallError {
    fn from(e: serde_json::Error) -> Self {
        WaterfallError::SerializationError(e.to_string())
    }
}
