//! # stripmill-protocol
//!
//! Wire protocol implementation for stripmill.
//!
//! A session on the wire is:
//!
//! ```text
//! client -> server   u32 image_count
//! client -> server   operation field (OPERATION_FIELD_LEN bytes, NUL padded)
//! client -> server   image_count x (u32 size, size bytes of encoded image)
//! server -> client   up to image_count x (u32 size, size bytes of encoded image)
//! ```
//!
//! All integers are big-endian. The connection closes after the last response.
//!
//! This crate provides:
//! - Fixed-width `u32` encoding for length prefixes and counts
//! - The `Frame` type and a buffered `Decoder`
//! - Async read/write helpers over any `AsyncRead`/`AsyncWrite`

pub mod codec;
pub mod error;
pub mod frame;
pub mod io;

pub use codec::Decoder;
pub use error::ProtocolError;
pub use frame::{decode_u32, encode_u32, Frame, FrameKind, LENGTH_PREFIX_SIZE};
pub use io::{
    encode_operation, read_data_frame, read_exact, read_operation, read_u32, write_frame,
    write_operation, write_u32, OperationField,
};

/// Default port for the stripmill coordinator.
pub const DEFAULT_PORT: u16 = 12345;

/// Size of the fixed operation identifier field.
pub const OPERATION_FIELD_LEN: usize = 1024;

/// Default maximum data frame payload size (64 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;
