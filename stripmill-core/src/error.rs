//! Core error types.

use thiserror::Error;

/// Errors from raster handling and transforms.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("image decode failed: {reason}")]
    Decode { reason: String },

    #[error("image encode failed: {reason}")]
    Encode { reason: String },

    #[error("raster buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),

    #[error("empty strip ({width}x{height})")]
    EmptyStrip { width: u32, height: u32 },

    #[error("strip {index} shape mismatch: expected width {expected_width} x {expected_channels} channels, got {actual_width} x {actual_channels}")]
    ShapeMismatch {
        index: usize,
        expected_width: u32,
        expected_channels: u8,
        actual_width: u32,
        actual_channels: u8,
    },

    #[error("nothing to merge")]
    EmptyMerge,

    #[error("transform '{operation}' failed: {reason}")]
    Transform { operation: String, reason: String },
}

impl CoreError {
    /// Returns whether the payload bytes could not be decoded as an image.
    pub fn is_decode(&self) -> bool {
        matches!(self, CoreError::Decode { .. })
    }
}
