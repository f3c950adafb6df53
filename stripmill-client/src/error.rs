//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] stripmill_protocol::ProtocolError),

    #[error("connection timeout")]
    Timeout,

    #[error("too many images in one batch: {0}")]
    BatchTooLarge(usize),

    #[error("image error: {0}")]
    Image(String),

    #[error("sender task failed: {0}")]
    Sender(String),
}
