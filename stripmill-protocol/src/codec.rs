//! Buffered frame decoder.
//!
//! Used by readers that receive bytes in arbitrary chunks (benchmarks, clients
//! that drain a socket into memory) and want frames out of them.

use crate::error::ProtocolError;
use crate::frame::{Frame, FrameKind};
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Bytes, BytesMut};

/// Decodes frames out of an internal buffer.
pub struct Decoder {
    buffer: BytesMut,
    max_payload: u32,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Creates a decoder that rejects data frames larger than `max_payload`.
    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_payload,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame of the given kind.
    pub fn decode_frame(&mut self, kind: FrameKind) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer, kind, self.max_payload)
    }

    /// Attempts to decode a count frame.
    pub fn decode_count(&mut self) -> Result<Option<u32>, ProtocolError> {
        match self.decode_frame(FrameKind::Count)? {
            Some(Frame::Count(n)) => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    /// Attempts to decode a data frame.
    pub fn decode_data(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        match self.decode_frame(FrameKind::Data)? {
            Some(Frame::Data(payload)) => Ok(Some(payload)),
            _ => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
