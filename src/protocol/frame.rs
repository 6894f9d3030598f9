//! Frame struct with typed accessors.
//!
//! Represents one self-delimited unit of wire transfer: a decoded header
//! plus the opaque payload. Uses `bytes::Bytes` for zero-copy payload
//! sharing between the read loop and the handler that consumes the frame.

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get the message-type code.
    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.header.msg_type
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the header and appends the payload into a contiguous buffer,
/// ready for a single write to the socket.
pub fn build_frame(msg_type: u8, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(msg_type, payload.len() as u32);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let header = Header::new(0x10, 5);
        let payload = Bytes::from_static(b"hello");
        let frame = Frame::new(header, payload);

        assert_eq!(frame.msg_type(), 0x10);
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.payload_len(), 5);
    }

    #[test]
    fn test_frame_empty_payload() {
        let frame = Frame::new(Header::new(1, 0), Bytes::new());

        assert_eq!(frame.payload_len(), 0);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_payload_bytes_zero_copy() {
        let original = Bytes::from_static(b"test data");
        let frame = Frame::new(Header::new(1, 9), original.clone());

        let cloned = frame.payload_bytes();
        assert_eq!(cloned, original);
        assert_eq!(cloned.as_ptr(), original.as_ptr());
    }

    #[test]
    fn test_build_frame() {
        let bytes = build_frame(0x10, b"hello");

        assert_eq!(bytes.len(), HEADER_SIZE + 5);
        let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.msg_type, 0x10);
        assert_eq!(header.payload_length, 5);
        assert_eq!(&bytes[HEADER_SIZE..], b"hello");
    }

    #[test]
    fn test_build_frame_empty_payload() {
        let bytes = build_frame(1, b"");
        assert_eq!(bytes.len(), HEADER_SIZE);
    }

    #[test]
    fn test_build_frame_roundtrip() {
        use super::super::FrameBuffer;

        let payload = b"0123456789";
        let bytes = build_frame(0x42, payload);

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_type(), 0x42);
        assert_eq!(frames[0].payload(), payload);
    }
}
