use thiserror::Error;

/// Error shown when no listing capability is configured
pub const SERVICE_UNAVAILABLE: &str = "Console service not available";

/// Failure of a message listing call
#[derive(Debug, Error)]
pub enum SourceError {
    /// No listing capability is configured
    #[error("{}", SERVICE_UNAVAILABLE)]
    Unavailable,

    /// The call was stopped by its caller
    #[error("stream cancelled")]
    Cancelled,

    #[error("{0}")]
    Transport(String),

    #[error("{message} ({code})")]
    Status { code: String, message: String },

    #[error("invalid frame: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether this error only reports a caller-initiated stop
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
