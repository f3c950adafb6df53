//! Connection setup and the client's half of the header exchange.

use crate::error::ClientError;
use std::net::SocketAddr;
use std::time::Duration;
use stripmill_protocol::{
    encode_operation, write_operation, write_u32, OperationField, ProtocolError, DEFAULT_PORT,
    MAX_PAYLOAD_SIZE, OPERATION_FIELD_LEN,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How the operation identifier is sent. Must match the server.
    pub operation_field: OperationField,
    /// Largest response frame accepted.
    pub max_response_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}

impl ClientConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            operation_field: OperationField::Fixed,
            max_response_size: MAX_PAYLOAD_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_operation_field(mut self, operation_field: OperationField) -> Self {
        self.operation_field = operation_field;
        self
    }

    pub fn with_max_response_size(mut self, size: u32) -> Self {
        self.max_response_size = size;
        self
    }
}

/// Opens a TCP connection to the server.
pub async fn connect(config: &ClientConfig) -> Result<TcpStream, ClientError> {
    tracing::debug!("Connecting to {}...", config.addr);

    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr))
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

    stream.set_nodelay(true).ok();
    Ok(stream)
}

/// Checks that `operation` fits the operation field.
pub fn check_operation(operation: &str) -> Result<(), ClientError> {
    let len = encode_operation(operation).len();
    if len > OPERATION_FIELD_LEN {
        return Err(ProtocolError::OperationTooLong {
            len,
            max: OPERATION_FIELD_LEN,
        }
        .into());
    }
    Ok(())
}

/// Writes the image count and the operation identifier.
pub async fn write_header<W>(
    writer: &mut W,
    count: u32,
    operation: &str,
    mode: OperationField,
) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    write_u32(writer, count).await?;
    match mode {
        OperationField::Fixed => write_operation(writer, operation).await?,
        OperationField::SingleRead => {
            check_operation(operation)?;
            writer.write_all(&encode_operation(operation)).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}
