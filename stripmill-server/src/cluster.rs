//! Cluster context: the coordinator's view of the worker pool.
//!
//! Rank 0 is the coordinator itself. Ranks `1..pool_size` are workers, each
//! reached over its own pair of bounded channels. Nothing else is shared
//! between the coordinator and a worker.

use crate::error::ServerError;
use crate::worker::{Task, Worker, WorkerMessage, WorkerReply};
use std::sync::Arc;
use stripmill_core::StripTransform;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Rank of the coordinator.
pub const COORDINATOR_RANK: usize = 0;

/// Largest accepted pool size, coordinator included.
pub const MAX_POOL_SIZE: usize = 1024;

/// Capacity of each worker channel. One task is in flight per worker.
const WORKER_CHANNEL_CAPACITY: usize = 1;

/// The coordinator's end of one worker's channel pair.
pub struct WorkerChannel {
    rank: usize,
    tasks: mpsc::Sender<WorkerMessage>,
    replies: mpsc::Receiver<WorkerReply>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerChannel {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Hands a task to this worker.
    pub async fn send(&self, task: Task) -> Result<(), ServerError> {
        self.tasks
            .send(WorkerMessage::Task(task))
            .await
            .map_err(|_| ServerError::WorkerUnavailable { rank: self.rank })
    }

    /// Blocks until this worker's next reply.
    pub async fn recv(&mut self) -> Result<WorkerReply, ServerError> {
        self.replies
            .recv()
            .await
            .ok_or(ServerError::WorkerUnavailable { rank: self.rank })
    }

    /// Aborts the worker task and waits until it is gone.
    #[cfg(test)]
    pub(crate) async fn kill(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Returns a reply that is already waiting, if any.
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<WorkerReply> {
        self.replies.try_recv().ok()
    }

    async fn shutdown(&mut self) {
        // The worker may already be gone
        let _ = self.tasks.send(WorkerMessage::Shutdown).await;
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Worker rank {} ended abnormally: {}", self.rank, e);
            }
        }
    }
}

/// Identity and channels of the process group, handed to the coordinator.
pub struct ClusterContext {
    self_id: usize,
    pool_size: usize,
    workers: Vec<WorkerChannel>,
    transform: Arc<dyn StripTransform>,
}

impl ClusterContext {
    /// Spawns `pool_size - 1` workers and returns the coordinator's context.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        pool_size: usize,
        transform: Arc<dyn StripTransform>,
    ) -> Result<Self, ServerError> {
        if pool_size == 0 || pool_size > MAX_POOL_SIZE {
            return Err(ServerError::InvalidPoolSize(pool_size));
        }

        let workers = (1..pool_size)
            .map(|rank| {
                let (task_tx, task_rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
                let (reply_tx, reply_rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
                let worker = Worker::new(rank, transform.clone(), task_rx, reply_tx);
                WorkerChannel {
                    rank,
                    tasks: task_tx,
                    replies: reply_rx,
                    handle: Some(tokio::spawn(worker.run())),
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(
            "Worker pool started: {} rank(s), {} worker(s)",
            pool_size,
            workers.len()
        );

        Ok(Self {
            self_id: COORDINATOR_RANK,
            pool_size,
            workers,
            transform,
        })
    }

    /// This process's rank.
    pub fn self_id(&self) -> usize {
        self.self_id
    }

    /// Total ranks, coordinator included.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// The transform the coordinator applies to its own strip.
    pub fn transform(&self) -> Arc<dyn StripTransform> {
        self.transform.clone()
    }

    /// Worker channels in ascending rank order.
    pub fn workers(&self) -> &[WorkerChannel] {
        &self.workers
    }

    pub fn workers_mut(&mut self) -> &mut [WorkerChannel] {
        &mut self.workers
    }

    /// Stops every worker and waits for them to exit.
    pub async fn shutdown(&mut self) {
        for worker in &mut self.workers {
            worker.shutdown().await;
        }
        tracing::info!("Worker pool stopped");
    }
}
