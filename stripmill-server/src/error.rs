//! Server error types.

use crate::config::ConfigError;
use crate::session::SessionState;
use stripmill_core::CoreError;
use stripmill_protocol::ProtocolError;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("image error: {0}")]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("pool size {0} is outside 1..={}", crate::cluster::MAX_POOL_SIZE)]
    InvalidPoolSize(usize),

    #[error("worker {rank} failed: {reason}")]
    WorkerFailure { rank: usize, reason: String },

    #[error("worker {rank} is no longer running")]
    WorkerUnavailable { rank: usize },

    #[error("invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether this error ends the whole session.
    ///
    /// Image-level failures (bad image bytes, a failed strip, a failed
    /// re-encode) skip one image and the session carries on.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(
            self,
            ServerError::Core(_) | ServerError::WorkerFailure { .. }
        )
    }

    /// Returns whether the client went away.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ServerError::Protocol(e) if e.is_connection_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        let decode = ServerError::Core(CoreError::Decode {
            reason: "bad".to_string(),
        });
        assert!(!decode.is_session_fatal());

        let failure = ServerError::WorkerFailure {
            rank: 2,
            reason: "empty strip".to_string(),
        };
        assert!(!failure.is_session_fatal());
        assert!(failure.to_string().contains("worker 2"));

        let closed = ServerError::Protocol(ProtocolError::ConnectionClosed {
            expected: 4,
            received: 0,
        });
        assert!(closed.is_session_fatal());
        assert!(closed.is_connection_closed());

        assert!(ServerError::WorkerUnavailable { rank: 1 }.is_session_fatal());
    }
}
