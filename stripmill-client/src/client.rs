//! High-level client API.

use crate::connection::{check_operation, connect, write_header, ClientConfig};
use crate::error::ClientError;
use bytes::Bytes;
use stripmill_protocol::{write_frame, Decoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Responses for one batch, in submission order.
///
/// The server never reports per-image failures on the wire. A skipped image
/// simply has no response, so `images` can be shorter than `requested` and
/// there is no way to tell which input was dropped.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Number of images sent.
    pub requested: usize,
    /// Encoded processed images received.
    pub images: Vec<Bytes>,
}

impl BatchResult {
    /// Returns whether every image came back.
    pub fn is_complete(&self) -> bool {
        self.images.len() == self.requested
    }

    /// Number of images with no response.
    pub fn missing(&self) -> usize {
        self.requested.saturating_sub(self.images.len())
    }
}

/// High-level client for stripmill.
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs one session: sends `images` for `operation` and collects the
    /// responses until all have arrived or the server closes the connection.
    pub async fn process(
        &self,
        operation: &str,
        images: Vec<Vec<u8>>,
    ) -> Result<BatchResult, ClientError> {
        check_operation(operation)?;
        let requested = images.len();
        let count = u32::try_from(requested).map_err(|_| ClientError::BatchTooLarge(requested))?;

        let stream = connect(&self.config).await?;
        let (mut reader, mut writer) = stream.into_split();

        // Sending runs beside receiving; the server answers image i while
        // later images are still in flight.
        let operation = operation.to_string();
        let mode = self.config.operation_field;
        let sender = tokio::spawn(async move {
            write_header(&mut writer, count, &operation, mode).await?;
            for (i, image) in images.iter().enumerate() {
                write_frame(&mut writer, image).await?;
                tracing::debug!("Sent image {} ({} bytes)", i, image.len());
            }
            writer.shutdown().await?;
            Ok::<_, ClientError>(())
        });

        let received = match receive(&mut reader, requested, self.config.max_response_size).await {
            Ok(received) => received,
            Err(e) => {
                sender.abort();
                return Err(e);
            }
        };

        match sender.await {
            Ok(Ok(())) => {}
            // The server may drop the connection before reading everything
            Ok(Err(e)) => tracing::debug!("Send incomplete: {}", e),
            Err(e) => return Err(ClientError::Sender(e.to_string())),
        }

        Ok(BatchResult {
            requested,
            images: received,
        })
    }
}

/// Reads up to `requested` data frames, stopping early at EOF.
async fn receive<R>(
    reader: &mut R,
    requested: usize,
    max_response_size: u32,
) -> Result<Vec<Bytes>, ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Decoder::with_max_payload(max_response_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut received = Vec::with_capacity(requested);

    while received.len() < requested {
        if let Some(bytes) = decoder.decode_data()? {
            tracing::debug!("Received image {} ({} bytes)", received.len(), bytes.len());
            received.push(bytes);
            continue;
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!(
                "Server closed after {} of {} image(s), {} byte(s) unparsed",
                received.len(),
                requested,
                decoder.buffered()
            );
            break;
        }
        decoder.extend(&buf[..n]);
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use stripmill_protocol::{
        read_data_frame, read_operation, read_u32, write_frame as send_frame, OperationField,
        MAX_PAYLOAD_SIZE,
    };
    use tokio::net::TcpListener;

    /// Serves one session, answering only the first `answer` images with
    /// their reversed bytes.
    async fn fake_server(answer: usize) -> (SocketAddr, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let count = read_u32(&mut stream).await.unwrap();
            let operation = read_operation(&mut stream, OperationField::Fixed)
                .await
                .unwrap();
            for i in 0..count as usize {
                let mut image = read_data_frame(&mut stream, MAX_PAYLOAD_SIZE)
                    .await
                    .unwrap()
                    .to_vec();
                if i < answer {
                    image.reverse();
                    send_frame(&mut stream, &image).await.unwrap();
                }
            }
            operation
        });

        (addr, handle)
    }

    #[tokio::test]
    async fn test_process_complete_batch() {
        let (addr, server) = fake_server(usize::MAX).await;
        let client = Client::new(ClientConfig::new(addr));

        let result = client
            .process("blur", vec![vec![1, 2, 3], vec![4, 5]])
            .await
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.images[0].as_ref(), &[3, 2, 1]);
        assert_eq!(result.images[1].as_ref(), &[5, 4]);
        assert_eq!(server.await.unwrap(), "blur");
    }

    #[tokio::test]
    async fn test_process_partial_batch() {
        let (addr, _server) = fake_server(1).await;
        let client = Client::new(ClientConfig::new(addr));

        let result = client
            .process("erosion", vec![vec![1], vec![2], vec![3]])
            .await
            .unwrap();

        assert!(!result.is_complete());
        assert_eq!(result.missing(), 2);
        assert_eq!(result.images.len(), 1);
    }

    #[tokio::test]
    async fn test_process_empty_batch() {
        let (addr, server) = fake_server(0).await;
        let client = Client::new(ClientConfig::new(addr));

        let result = client.process("dilation", Vec::new()).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(server.await.unwrap(), "dilation");
    }

    #[tokio::test]
    async fn test_operation_checked_before_connecting() {
        // Nothing listens here; the length check must fail first
        let client = Client::new(ClientConfig::new("127.0.0.1:9".parse().unwrap()));
        let result = client.process(&"x".repeat(2000), vec![vec![0]]).await;
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_receive_split_across_reads() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 3, b'a'])
            .read(&[b'b', b'c', 0, 0])
            .read(&[0, 1, b'z'])
            .build();

        let received = receive(&mut reader, 2, 1024).await.unwrap();
        assert_eq!(received[0].as_ref(), b"abc");
        assert_eq!(received[1].as_ref(), b"z");
    }

    #[tokio::test]
    async fn test_receive_rejects_oversized_frame() {
        let mut reader = tokio_test::io::Builder::new().read(&[0, 0, 1, 0]).build();
        let result = receive(&mut reader, 1, 16).await;
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    #[test]
    fn test_batch_result() {
        let result = BatchResult {
            requested: 2,
            images: vec![Bytes::from_static(b"a")],
        };
        assert!(!result.is_complete());
        assert_eq!(result.missing(), 1);
    }
}
