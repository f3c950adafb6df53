//! Worker loop.
//!
//! A worker only ever sees strips and operation kinds, one task at a time,
//! strictly alternating receive and send. It has no notion of sessions or
//! images.

use std::sync::Arc;
use stripmill_core::{OperationKind, Strip, StripTransform};
use tokio::sync::mpsc;

/// One unit of work for a worker.
#[derive(Debug, Clone)]
pub struct Task {
    pub strip: Strip,
    pub operation: OperationKind,
}

/// Coordinator -> worker.
#[derive(Debug)]
pub enum WorkerMessage {
    Task(Task),
    Shutdown,
}

/// Worker -> coordinator.
#[derive(Debug)]
pub enum WorkerReply {
    /// The processed strip.
    Done(Strip),
    /// Failure sentinel: the strip could not be processed.
    Failed { reason: String },
}

impl WorkerReply {
    pub fn is_failed(&self) -> bool {
        matches!(self, WorkerReply::Failed { .. })
    }
}

/// Runs the transform for one strip on the blocking pool.
///
/// Transform errors and panics both come back as `WorkerReply::Failed`.
pub async fn process_strip(
    transform: Arc<dyn StripTransform>,
    strip: Strip,
    operation: OperationKind,
) -> WorkerReply {
    let joined = tokio::task::spawn_blocking(move || {
        let processed = transform.apply(&strip.frame, &operation);
        (strip, processed)
    })
    .await;

    match joined {
        Ok((strip, Ok(frame))) => WorkerReply::Done(Strip {
            rank: strip.rank,
            rows: strip.rows,
            frame,
        }),
        Ok((_, Err(e))) => WorkerReply::Failed {
            reason: e.to_string(),
        },
        Err(e) => WorkerReply::Failed {
            reason: format!("transform panicked: {}", e),
        },
    }
}

/// A pool member bound to one rank and one channel pair.
pub struct Worker {
    rank: usize,
    transform: Arc<dyn StripTransform>,
    tasks: mpsc::Receiver<WorkerMessage>,
    replies: mpsc::Sender<WorkerReply>,
}

impl Worker {
    pub fn new(
        rank: usize,
        transform: Arc<dyn StripTransform>,
        tasks: mpsc::Receiver<WorkerMessage>,
        replies: mpsc::Sender<WorkerReply>,
    ) -> Self {
        Self {
            rank,
            transform,
            tasks,
            replies,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Runs until `Shutdown` arrives or either channel closes.
    pub async fn run(mut self) {
        tracing::debug!("Worker rank {} started", self.rank);

        while let Some(message) = self.tasks.recv().await {
            let task = match message {
                WorkerMessage::Task(task) => task,
                WorkerMessage::Shutdown => break,
            };

            tracing::debug!(
                "Worker rank {}: received strip rows {:?} ({})",
                self.rank,
                task.strip.rows,
                task.operation
            );

            let reply = process_strip(self.transform.clone(), task.strip, task.operation).await;
            if let WorkerReply::Failed { reason } = &reply {
                tracing::warn!("Worker rank {}: strip failed: {}", self.rank, reason);
            }

            if self.replies.send(reply).await.is_err() {
                tracing::debug!("Worker rank {}: coordinator gone", self.rank);
                break;
            }
        }

        tracing::debug!("Worker rank {} stopped", self.rank);
    }
}
