//! Shared error type across modwss crates.

use thiserror::Error;

/// Caller-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The socket could not be opened or is not open.
    ServiceNotConnected,
    /// A frame could not be written to the socket.
    FailedToSend,
    /// No reply arrived before the wait ceiling.
    Timeout,
    /// The wait was cancelled (shutdown, disconnect, user or server request).
    OperationCancelled,
    /// A payload did not decode into the expected shape.
    UnexpectedMessageShape,
    /// Invalid configuration.
    Config,
    /// Anything else.
    Unknown,
}

impl ErrorCode {
    /// String representation used in logs and by UI layers.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ServiceNotConnected => "SERVICE_NOT_CONNECTED",
            ErrorCode::FailedToSend => "FAILED_TO_SEND",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::OperationCancelled => "OPERATION_CANCELLED",
            ErrorCode::UnexpectedMessageShape => "UNEXPECTED_MESSAGE_SHAPE",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WssError>;

/// Unified error type used by core and client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WssError {
    #[error("service not connected: {0}")]
    ServiceNotConnected(String),
    #[error("failed to send: {0}")]
    FailedToSend(String),
    #[error("timed out waiting for a reply")]
    Timeout,
    #[error("operation cancelled")]
    OperationCancelled,
    #[error("unexpected message shape: {0}")]
    UnexpectedMessageShape(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unknown: {0}")]
    Unknown(String),
}

impl WssError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            WssError::ServiceNotConnected(_) => ErrorCode::ServiceNotConnected,
            WssError::FailedToSend(_) => ErrorCode::FailedToSend,
            WssError::Timeout => ErrorCode::Timeout,
            WssError::OperationCancelled => ErrorCode::OperationCancelled,
            WssError::UnexpectedMessageShape(_) => ErrorCode::UnexpectedMessageShape,
            WssError::Config(_) => ErrorCode::Config,
            WssError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// True for the two outcomes a wait can end in without a reply.
    pub fn is_wait_failure(&self) -> bool {
        matches!(self, WssError::Timeout | WssError::OperationCancelled)
    }
}

impl From<serde_json::Error> for WssError {
    fn from(e: serde_json::Error) -> Self {
        WssError::UnexpectedMessageShape(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(WssError::Timeout.code().as_str(), "TIMEOUT");
        assert_eq!(
            WssError::ServiceNotConnected("refused".into()).code(),
            ErrorCode::ServiceNotConnected
        );
        assert!(WssError::OperationCancelled.is_wait_failure());
        assert!(!WssError::FailedToSend("x".into()).is_wait_failure());
    }

    #[test]
    fn json_errors_are_shape_errors() {
        let err = serde_json::from_str::<u32>("\"nope\"").map_err(WssError::from);
        assert_eq!(
            err.map_err(|e| e.code()),
            Err(ErrorCode::UnexpectedMessageShape)
        );
    }
}
