//! # stripmill-server
//!
//! Coordinator for stripmill.
//!
//! This crate provides:
//! - A fixed pool of strip workers, each on its own channel pair
//! - The per-connection session state machine
//! - Scatter/gather of row strips across the pool
//! - A TCP accept loop that serves one session at a time
//! - Configuration from YAML and environment variables

pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod server;
pub mod session;
pub mod worker;

pub use cluster::{ClusterContext, WorkerChannel, MAX_POOL_SIZE};
pub use config::{ClusterConfig, Config, NetworkConfig, OutputConfig, ProtocolConfig};
pub use coordinator::{CoordinatorConfig, SessionCoordinator};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::{ImageOutcome, Session, SessionState};
pub use worker::{Task, Worker, WorkerMessage, WorkerReply};
