use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    /// The user stopped a streamed reply. Not a failure.
    #[error("Cancelled")]
    Cancelled,

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}
