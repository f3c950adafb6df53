//! # stripmill-client
//!
//! Client library for stripmill.
//!
//! This crate provides:
//! - Async TCP client that submits one batch of images per connection
//! - Concurrent send/receive so large batches never stall on socket buffers
//! - Image preprocessing (optional resize, JPEG re-encode) before sending

pub mod client;
pub mod connection;
pub mod error;
pub mod preprocess;

pub use client::{BatchResult, Client};
pub use connection::ClientConfig;
pub use error::ClientError;
pub use preprocess::{parse_size, preprocess};
