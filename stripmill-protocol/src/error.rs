//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    #[error("truncated header: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("operation identifier too long: {len} bytes (max {max})")]
    OperationTooLong { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the peer went away mid-frame.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::ConnectionClosed {
            expected: 10,
            received: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 of 10"));
        assert!(err.is_connection_closed());

        let err = ProtocolError::Truncated { needed: 4, got: 2 };
        assert!(err.to_string().contains("need 4"));
        assert!(!err.is_connection_closed());

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::OperationTooLong {
            len: 2000,
            max: 1024,
        };
        assert!(err.to_string().contains("2000"));
    }
}
