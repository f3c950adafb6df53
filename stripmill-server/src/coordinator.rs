//! Session coordinator: drives one client session and scatters each image
//! across the worker pool.
//!
//! Per image, strip `i` goes to rank `i`. The coordinator sends strips
//! `1..N` to their workers, transforms strip 0 itself, then receives one
//! reply from each worker in ascending rank order. Every dispatched worker is
//! drained before the image is merged or skipped, so the channels stay in
//! step for the next image.

use crate::cluster::ClusterContext;
use crate::error::ServerError;
use crate::server::ServerStats;
use crate::session::{Session, SessionState};
use crate::worker::{process_strip, Task, WorkerReply};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use stripmill_core::{merge, split, EncodeFormat, ImageFrame, OperationKind};
use stripmill_protocol::{
    read_exact, read_operation, read_u32, write_frame, OperationField, ProtocolError,
    MAX_PAYLOAD_SIZE,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Per-session settings.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// How the operation identifier is read.
    pub operation_field: OperationField,
    /// Largest accepted image payload in bytes.
    pub max_image_size: u32,
    /// Encoding for responses.
    pub encode_format: EncodeFormat,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            operation_field: OperationField::Fixed,
            max_image_size: MAX_PAYLOAD_SIZE,
            encode_format: EncodeFormat::Png,
        }
    }
}

/// Owns the cluster context and serves sessions one at a time.
pub struct SessionCoordinator {
    cluster: ClusterContext,
    config: CoordinatorConfig,
    stats: Arc<ServerStats>,
}

impl SessionCoordinator {
    pub fn new(cluster: ClusterContext, config: CoordinatorConfig, stats: Arc<ServerStats>) -> Self {
        Self {
            cluster,
            config,
            stats,
        }
    }

    pub fn cluster(&self) -> &ClusterContext {
        &self.cluster
    }

    #[cfg(test)]
    pub(crate) fn cluster_mut(&mut self) -> &mut ClusterContext {
        &mut self.cluster
    }

    /// Runs one session to completion over `stream`.
    ///
    /// Returns `Err` when the session had to be aborted (client went away,
    /// malformed header, dead worker). Image-level failures are recorded on
    /// the session and do not end it.
    pub async fn run_session<S>(
        &mut self,
        session: &mut Session,
        stream: &mut S,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let addr = session.remote_addr;

        let count = read_u32(stream).await?;
        session.set_image_count(count);
        session.set_state(SessionState::AwaitOperation)?;
        tracing::info!("[{}] Session {}: {} image(s)", addr, session.id, count);

        let identifier = read_operation(stream, self.config.operation_field).await?;
        let operation = OperationKind::parse(&identifier);
        if operation.is_identity() {
            tracing::info!(
                "[{}] Unknown operation {:?}, images pass through unchanged",
                addr,
                identifier
            );
        } else {
            tracing::info!("[{}] Operation: {}", addr, operation);
        }
        session.set_operation(operation.clone());

        for index in 0..count {
            session.set_state(SessionState::AwaitImageSize)?;
            let size = read_u32(stream).await?;
            if size > self.config.max_image_size {
                return Err(ProtocolError::FrameTooLarge {
                    size,
                    max: self.config.max_image_size,
                }
                .into());
            }

            session.set_state(SessionState::AwaitImageData)?;
            let payload = read_exact(stream, size as usize).await?;
            tracing::debug!("[{}] Image {}: received {} bytes", addr, index, payload.len());

            let frame = match ImageFrame::decode(&payload) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("[{}] Image {}: skipped, {}", addr, index, e);
                    self.skip(session, e.to_string());
                    continue;
                }
            };

            let merged = match self.scatter_gather(session, frame, &operation).await {
                Ok(merged) => merged,
                Err(e) if !e.is_session_fatal() => {
                    tracing::warn!("[{}] Image {}: skipped, {}", addr, index, e);
                    self.skip(session, e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };

            session.set_state(SessionState::Respond)?;
            let encoded = match merged.encode(self.config.encode_format) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("[{}] Image {}: skipped, {}", addr, index, e);
                    self.skip(session, e.to_string());
                    continue;
                }
            };

            write_frame(stream, &encoded).await?;
            session.record_response(encoded.len());
            self.stats.images_responded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                "[{}] Image {}: sent {} bytes ({}x{})",
                addr,
                index,
                encoded.len(),
                merged.width(),
                merged.height()
            );
        }

        session.set_state(SessionState::Close)?;
        // Every response is already written; a client that left early
        // does not turn the session into an abort.
        if let Err(e) = stream.shutdown().await {
            tracing::debug!("[{}] Shutdown after last response failed: {}", addr, e);
        }
        Ok(())
    }

    fn skip(&self, session: &mut Session, reason: String) {
        session.record_skip(reason);
        self.stats.images_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Splits `frame` across the pool, gathers the processed strips in rank
    /// order and merges them.
    async fn scatter_gather(
        &mut self,
        session: &mut Session,
        frame: ImageFrame,
        operation: &OperationKind,
    ) -> Result<ImageFrame, ServerError> {
        session.set_state(SessionState::Dispatch)?;

        let pool_size = self.cluster.pool_size();
        let mut strips = split(&frame, pool_size).into_iter();
        let local = strips
            .next()
            .ok_or(ServerError::InvalidPoolSize(pool_size))?;
        tracing::debug!(
            "[{}] Dispatching {} strip(s) of {} rows",
            session.remote_addr,
            pool_size,
            local.height()
        );

        let mut dispatched = 0;
        let mut dispatch_error = None;
        for (worker, strip) in self.cluster.workers().iter().zip(strips) {
            let task = Task {
                strip,
                operation: operation.clone(),
            };
            if let Err(e) = worker.send(task).await {
                dispatch_error = Some(e);
                break;
            }
            dispatched += 1;
        }

        session.set_state(SessionState::Collect)?;
        let mut replies = Vec::with_capacity(pool_size);
        if dispatch_error.is_none() {
            replies.push(process_strip(self.cluster.transform(), local, operation.clone()).await);
        }
        for worker in self.cluster.workers_mut().iter_mut().take(dispatched) {
            replies.push(worker.recv().await?);
        }
        if let Some(e) = dispatch_error {
            return Err(e);
        }

        let mut processed = Vec::with_capacity(replies.len());
        for (rank, reply) in replies.into_iter().enumerate() {
            match reply {
                WorkerReply::Done(strip) => processed.push(strip.frame),
                WorkerReply::Failed { reason } => {
                    return Err(ServerError::WorkerFailure { rank, reason });
                }
            }
        }

        session.set_state(SessionState::Merge)?;
        Ok(merge(processed)?)
    }

    /// Stops the worker pool.
    pub async fn shutdown(&mut self) {
        self.cluster.shutdown().await;
    }
}
