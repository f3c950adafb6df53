//! Async read/write helpers for the wire protocol.
//!
//! Every read blocks until exactly the declared number of bytes has arrived
//! or the peer closes the stream.

use crate::error::ProtocolError;
use crate::frame::{decode_u32, encode_u32, Frame, LENGTH_PREFIX_SIZE};
use crate::OPERATION_FIELD_LEN;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read chunk size used while accumulating a frame.
const READ_CHUNK_SIZE: usize = 4096;

/// How the server reads the operation identifier field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationField {
    /// Read exactly `OPERATION_FIELD_LEN` bytes and strip NUL padding.
    #[default]
    Fixed,
    /// One read of at most `OPERATION_FIELD_LEN` bytes; whatever arrived is
    /// the identifier. Matches legacy clients that send the bare name.
    SingleRead,
}

impl OperationField {
    /// Parses the config/env spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Some(OperationField::Fixed),
            "single_read" | "singleread" => Some(OperationField::SingleRead),
            _ => None,
        }
    }
}

/// Reads exactly `n` bytes, accumulating chunks until complete.
pub async fn read_exact<R>(reader: &mut R, n: usize) -> Result<BytesMut, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(n);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    while buf.len() < n {
        let want = (n - buf.len()).min(READ_CHUNK_SIZE);
        let read = reader.read(&mut chunk[..want]).await?;
        if read == 0 {
            return Err(ProtocolError::ConnectionClosed {
                expected: n,
                received: buf.len(),
            });
        }
        buf.extend_from_slice(&chunk[..read]);
    }

    Ok(buf)
}

/// Reads a 4-byte big-endian integer (a count frame or a length prefix).
pub async fn read_u32<R>(reader: &mut R) -> Result<u32, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let head = read_exact(reader, LENGTH_PREFIX_SIZE).await?;
    decode_u32(&head)
}

/// Reads a size-prefixed data frame, rejecting sizes above `max_payload`.
pub async fn read_data_frame<R>(reader: &mut R, max_payload: u32) -> Result<Bytes, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let size = read_u32(reader).await?;
    if size > max_payload {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: max_payload,
        });
    }
    tracing::trace!(size, "reading data frame");
    Ok(read_exact(reader, size as usize).await?.freeze())
}

/// Writes a bare 4-byte integer and flushes.
pub async fn write_u32<W>(writer: &mut W, n: u32) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_u32(n)).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes `payload` as one size-prefixed data frame.
///
/// The prefix and payload go out in a single `write_all`.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = Frame::data(Bytes::copy_from_slice(payload)).encode()?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the operation identifier field.
///
/// Bytes are decoded as Latin-1, so any byte sequence yields a string.
pub async fn read_operation<R>(reader: &mut R, mode: OperationField) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let raw = match mode {
        OperationField::Fixed => read_exact(reader, OPERATION_FIELD_LEN).await?,
        OperationField::SingleRead => {
            let mut buf = BytesMut::zeroed(OPERATION_FIELD_LEN);
            let n = reader.read(&mut buf[..]).await?;
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed {
                    expected: 1,
                    received: 0,
                });
            }
            buf.truncate(n);
            buf
        }
    };

    let trimmed = match raw.iter().rposition(|&b| b != 0) {
        Some(last) => &raw[..=last],
        None => &raw[..0],
    };
    Ok(latin1_decode(trimmed))
}

/// Writes the operation identifier as a NUL-padded fixed field.
pub async fn write_operation<W>(writer: &mut W, operation: &str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut field = encode_operation(operation);
    if field.len() > OPERATION_FIELD_LEN {
        return Err(ProtocolError::OperationTooLong {
            len: field.len(),
            max: OPERATION_FIELD_LEN,
        });
    }
    field.resize(OPERATION_FIELD_LEN, 0);
    writer.write_all(&field).await?;
    writer.flush().await?;
    Ok(())
}

fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encodes an operation identifier as Latin-1. Characters outside Latin-1
/// become `?`.
pub fn encode_operation(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_read_exact_accumulates_chunks() {
        let (mut client, mut server) = duplex(8);

        let writer = tokio::spawn(async move {
            // More than the duplex buffer, written in small pieces
            for chunk in [&b"hello "[..], &b"chunked "[..], &b"world"[..]] {
                client.write_all(chunk).await.unwrap();
            }
            client
        });

        let data = read_exact(&mut server, 19).await.unwrap();
        assert_eq!(&data[..], b"hello chunked world");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_exact_connection_closed() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let result = read_exact(&mut server, 10).await;
        assert!(matches!(
            result,
            Err(ProtocolError::ConnectionClosed {
                expected: 10,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_read_exact_zero_bytes() {
        let (_client, mut server) = duplex(64);
        let data = read_exact(&mut server, 0).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_u32_and_frame_roundtrip() {
        let (mut client, mut server) = duplex(1024);

        write_u32(&mut client, 2).await.unwrap();
        write_frame(&mut client, b"image-one").await.unwrap();
        write_frame(&mut client, b"").await.unwrap();

        assert_eq!(read_u32(&mut server).await.unwrap(), 2);
        let first = read_data_frame(&mut server, 1024).await.unwrap();
        assert_eq!(&first[..], b"image-one");
        let second = read_data_frame(&mut server, 1024).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_read_data_frame_too_large() {
        let (mut client, mut server) = duplex(64);
        write_u32(&mut client, 4096).await.unwrap();

        let result = read_data_frame(&mut server, 1024).await;
        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge {
                size: 4096,
                max: 1024
            })
        ));
    }

    #[tokio::test]
    async fn test_truncated_length_prefix() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0, 0]).await.unwrap();
        drop(client);

        let result = read_u32(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed { .. })));
    }

    #[tokio::test]
    async fn test_fixed_operation_field() {
        let (mut client, mut server) = duplex(4096);
        write_operation(&mut client, "color_inversion").await.unwrap();
        // The following size prefix must not bleed into the identifier
        write_u32(&mut client, 7).await.unwrap();

        let op = read_operation(&mut server, OperationField::Fixed).await.unwrap();
        assert_eq!(op, "color_inversion");
        assert_eq!(read_u32(&mut server).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_single_read_operation_field() {
        let (mut client, mut server) = duplex(4096);
        client.write_all(b"blur").await.unwrap();

        let op = read_operation(&mut server, OperationField::SingleRead)
            .await
            .unwrap();
        assert_eq!(op, "blur");
    }

    #[tokio::test]
    async fn test_single_read_operation_field_closed() {
        let (client, mut server) = duplex(64);
        drop(client);

        let result = read_operation(&mut server, OperationField::SingleRead).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed { .. })));
    }

    #[tokio::test]
    async fn test_operation_latin1() {
        let (mut client, mut server) = duplex(4096);
        write_operation(&mut client, "café").await.unwrap();

        let op = read_operation(&mut server, OperationField::Fixed).await.unwrap();
        assert_eq!(op, "café");
    }

    #[tokio::test]
    async fn test_operation_too_long() {
        let (mut client, _server) = duplex(4096);
        let long = "x".repeat(OPERATION_FIELD_LEN + 1);
        let result = write_operation(&mut client, &long).await;
        assert!(matches!(result, Err(ProtocolError::OperationTooLong { .. })));
    }

    #[test]
    fn test_operation_field_parse() {
        assert_eq!(OperationField::parse("fixed"), Some(OperationField::Fixed));
        assert_eq!(
            OperationField::parse("SINGLE_READ"),
            Some(OperationField::SingleRead)
        );
        assert_eq!(OperationField::parse("other"), None);
        assert_eq!(OperationField::default(), OperationField::Fixed);
    }
}
