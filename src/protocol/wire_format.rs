//! Wire format encoding and decoding.
//!
//! Implements the 5-byte frame header:
//! ```text
//! ┌────────────────┬──────────┐
//! │ Payload Length │ Msg Type │
//! │ 4 bytes        │ 1 byte   │
//! │ uint32 BE      │          │
//! └────────────────┴──────────┘
//! ```
//!
//! The length counts payload bytes only (the header is excluded). The
//! message-type byte identifies the packet kind; a reply frame carries the
//! same type code as the request it answers.

use crate::error::{BeelineError, Result};

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Message-type codes owned by the transport core.
///
/// Everything outside this module's codes belongs to the facade layer,
/// which maps relational operations onto its own request/decoder pairs.
pub mod msg_type {
    /// Connect handshake request and its reply.
    pub const CONNECT: u8 = 0x01;
    /// Fire-and-forget liveness probe.
    pub const PING: u8 = 0x06;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes, excluding the header itself.
    pub payload_length: u32,
    /// Message-type code identifying the packet kind.
    pub msg_type: u8,
}

impl Header {
    /// Create a new header.
    pub fn new(msg_type: u8, payload_length: u32) -> Self {
        Self {
            payload_length,
            msg_type,
        }
    }

    /// Encode header to bytes (Big Endian length first, then the type byte).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (5 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.payload_length.to_be_bytes());
        buf[4] = self.msg_type;
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            payload_length: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            msg_type: buf[4],
        })
    }

    /// Validate the declared payload length against the configured bound.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(BeelineError::Framing(format!(
                "payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(0x10, 100);
        let encoded = original.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = Header::new(0xAB, 0x01020304);
        let bytes = header.encode();

        // Payload length: 0x01020304 in BE
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x02);
        assert_eq!(bytes[2], 0x03);
        assert_eq!(bytes[3], 0x04);

        // Message type last
        assert_eq!(bytes[4], 0xAB);
    }

    #[test]
    fn test_header_size_is_exactly_5() {
        assert_eq!(HEADER_SIZE, 5);
        let header = Header::new(1, 0);
        assert_eq!(header.encode().len(), 5);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 4]; // One byte short
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn test_validate_payload_too_large() {
        let header = Header::new(1, 1_000_000);
        let result = header.validate(100);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_at_bound() {
        let header = Header::new(1, 100);
        assert!(header.validate(100).is_ok());
    }

    #[test]
    fn test_encode_into() {
        let header = Header::new(0x10, 42);
        let mut buf = [0u8; HEADER_SIZE];
        header.encode_into(&mut buf);

        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(header, decoded);
    }
}
