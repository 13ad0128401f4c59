use crate::status_code::StatusCode;
use thiserror::Error;

/// Main error type for OPC UA stack operations
#[derive(Error, Debug)]
pub enum UaError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    /// A service-level failure carried back to the caller as a status code
    #[error("Service error: {0}")]
    Status(StatusCode),
}

impl UaError {
    /// Status code reported on the wire for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            UaError::Connection(_) => StatusCode::BAD_COMMUNICATION_ERROR,
            UaError::Protocol(_) => StatusCode::BAD_TCP_INTERNAL_ERROR,
            UaError::Security(_) => StatusCode::BAD_SECURITY_CHECKS_FAILED,
            UaError::Timeout => StatusCode::BAD_TIMEOUT,
            UaError::InvalidData(_) => StatusCode::BAD_INVALID_ARGUMENT,
            UaError::Encoding(_) => StatusCode::BAD_ENCODING_ERROR,
            UaError::Decoding(_) => StatusCode::BAD_DECODING_ERROR,
            UaError::Status(code) => *code,
        }
    }

    /// Whether the error must terminate the secure channel it occurred on
    ///
    /// Framing, sequencing, size and cryptographic failures are never
    /// recoverable within a channel. Service-level failures are.
    pub fn is_fatal(&self) -> bool {
        match self {
            UaError::Connection(_)
            | UaError::Protocol(_)
            | UaError::Security(_)
            | UaError::Decoding(_) => true,
            UaError::Status(code) => code.is_channel_fatal(),
            UaError::Timeout | UaError::InvalidData(_) | UaError::Encoding(_) => false,
        }
    }
}

impl From<StatusCode> for UaError {
    fn from(code: StatusCode) -> Self {
        UaError::Status(code)
    }
}

/// Result type alias for OPC UA stack operations
pub type UaResult<T> = Result<T, UaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            UaError::Decoding("short".into()).status_code(),
            StatusCode::BAD_DECODING_ERROR
        );
        assert_eq!(
            UaError::from(StatusCode::BAD_SESSION_ID_INVALID).status_code(),
            StatusCode::BAD_SESSION_ID_INVALID
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(UaError::Security("bad signature".into()).is_fatal());
        assert!(UaError::Protocol("bad sequence".into()).is_fatal());
        assert!(!UaError::Status(StatusCode::BAD_SUBSCRIPTION_ID_INVALID).is_fatal());
        assert!(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TOO_LARGE).is_fatal());
    }
}
