//! Length-prefixed frame format.
//!
//! ```text
//! count frame:  +------------------+
//!               | count (u32 BE)   |
//!               +------------------+
//!
//! data frame:   +------------------+---------------------+
//!               | len (u32 BE)     | payload (len bytes) |
//!               +------------------+---------------------+
//! ```
//!
//! The declared length always equals the number of payload bytes that follow.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Width of every integer on the wire.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encodes `n` as 4 big-endian bytes.
pub fn encode_u32(n: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    n.to_be_bytes()
}

/// Decodes a big-endian `u32` from the first 4 bytes of `bytes`.
pub fn decode_u32(bytes: &[u8]) -> Result<u32, ProtocolError> {
    let head: [u8; LENGTH_PREFIX_SIZE] = bytes
        .get(..LENGTH_PREFIX_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::Truncated {
            needed: LENGTH_PREFIX_SIZE,
            got: bytes.len(),
        })?;
    Ok(u32::from_be_bytes(head))
}

/// Which frame shape the reader expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A bare 4-byte count.
    Count,
    /// A 4-byte length followed by that many payload bytes.
    Data,
}

/// A parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Number of images in the session.
    Count(u32),
    /// Encoded image bytes.
    Data(Bytes),
}

impl Frame {
    /// Creates a data frame from any byte source.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Frame::Data(payload.into())
    }

    /// Returns the frame kind.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Count(_) => FrameKind::Count,
            Frame::Data(_) => FrameKind::Data,
        }
    }

    /// Returns the encoded size of this frame in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Frame::Count(_) => LENGTH_PREFIX_SIZE,
            Frame::Data(payload) => LENGTH_PREFIX_SIZE + payload.len(),
        }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        match self {
            Frame::Count(n) => buf.put_u32(*n),
            Frame::Data(payload) => {
                let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
                    size: u32::MAX,
                    max: u32::MAX,
                })?;
                buf.put_u32(len);
                buf.put_slice(payload);
            }
        }
        Ok(buf)
    }

    /// Decodes a frame of the given kind from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` if the declared length
    /// exceeds `max_payload`.
    pub fn decode(
        buf: &mut BytesMut,
        kind: FrameKind,
        max_payload: u32,
    ) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let value = decode_u32(&buf[..LENGTH_PREFIX_SIZE])?;

        match kind {
            FrameKind::Count => {
                buf.advance(LENGTH_PREFIX_SIZE);
                Ok(Some(Frame::Count(value)))
            }
            FrameKind::Data => {
                if value > max_payload {
                    return Err(ProtocolError::FrameTooLarge {
                        size: value,
                        max: max_payload,
                    });
                }

                let total = LENGTH_PREFIX_SIZE + value as usize;
                if buf.len() < total {
                    return Ok(None);
                }

                buf.advance(LENGTH_PREFIX_SIZE);
                let payload = buf.split_to(value as usize).freeze();
                Ok(Some(Frame::Data(payload)))
            }
        }
    }

    /// Decodes a frame using the default payload limit.
    pub fn decode_default(
        buf: &mut BytesMut,
        kind: FrameKind,
    ) -> Result<Option<Self>, ProtocolError> {
        Self::decode(buf, kind, MAX_PAYLOAD_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_u32_big_endian() {
        assert_eq!(encode_u32(1024), [0x00, 0x00, 0x04, 0x00]);
        assert_eq!(encode_u32(0), [0, 0, 0, 0]);
        assert_eq!(encode_u32(u32::MAX), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_u32() {
        assert_eq!(decode_u32(&[0x00, 0x00, 0x04, 0x00]).unwrap(), 1024);
        assert_eq!(decode_u32(&[0, 0, 0, 0]).unwrap(), 0);
        // Extra bytes are ignored
        assert_eq!(decode_u32(&[0, 0, 0, 7, 9, 9]).unwrap(), 7);
    }

    #[test]
    fn test_decode_u32_truncated() {
        let result = decode_u32(&[0x00, 0x01]);
        assert!(matches!(
            result,
            Err(ProtocolError::Truncated { needed: 4, got: 2 })
        ));
        assert!(decode_u32(&[]).is_err());
    }

    #[test]
    fn test_data_frame_roundtrip() {
        let frame = Frame::data(&b"\x89PNG fake image"[..]);
        let mut buf = frame.encode().unwrap();
        assert_eq!(buf.len(), frame.encoded_len());

        let decoded = Frame::decode_default(&mut buf, FrameKind::Data)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_count_frame_roundtrip() {
        let mut buf = Frame::Count(3).encode().unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 3]);

        let decoded = Frame::decode_default(&mut buf, FrameKind::Count)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, Frame::Count(3));
        assert_eq!(decoded.kind(), FrameKind::Count);
    }

    #[test]
    fn test_incomplete_header() {
        let mut buf = BytesMut::from(&b"\x00\x00"[..]);
        let result = Frame::decode_default(&mut buf, FrameKind::Data);
        assert!(result.unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_incomplete_payload() {
        // Declares 10 bytes, carries 3
        let mut buf = BytesMut::from(&b"\x00\x00\x00\x0aabc"[..]);
        let result = Frame::decode_default(&mut buf, FrameKind::Data);
        assert!(result.unwrap().is_none());
        // Nothing consumed
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn test_zero_length_data_frame() {
        let mut buf = BytesMut::from(&b"\x00\x00\x00\x00"[..]);
        let decoded = Frame::decode_default(&mut buf, FrameKind::Data)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, Frame::Data(Bytes::new()));
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::from(&b"\x00\x00\x01\x00"[..]);
        let result = Frame::decode(&mut buf, FrameKind::Data, 16);
        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge { size: 256, max: 16 })
        ));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::Count(2).encode().unwrap());
        buf.extend_from_slice(&Frame::data(&b"first"[..]).encode().unwrap());
        buf.extend_from_slice(&Frame::data(&b"second"[..]).encode().unwrap());

        let count = Frame::decode_default(&mut buf, FrameKind::Count).unwrap();
        assert_eq!(count, Some(Frame::Count(2)));

        let first = Frame::decode_default(&mut buf, FrameKind::Data).unwrap();
        assert_eq!(first, Some(Frame::data(&b"first"[..])));

        let second = Frame::decode_default(&mut buf, FrameKind::Data).unwrap();
        assert_eq!(second, Some(Frame::data(&b"second"[..])));
        assert!(buf.is_empty());
    }

    proptest! {
        #[test]
        fn prop_u32_roundtrip(n in any::<u32>()) {
            prop_assert_eq!(decode_u32(&encode_u32(n)).unwrap(), n);
        }

        #[test]
        fn prop_data_frame_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let frame = Frame::data(payload.clone());
            let mut buf = frame.encode().unwrap();
            let decoded = Frame::decode_default(&mut buf, FrameKind::Data).unwrap().unwrap();
            prop_assert_eq!(decoded, Frame::Data(Bytes::from(payload)));
        }
    }
}
