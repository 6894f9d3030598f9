//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: need at least 5 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! The buffer also drives the adaptive receive sizing of the read loop via
//! [`FrameBuffer::read_hint`]: header-sized while idle, remaining-payload
//! sized mid-frame, since payloads range from single-row acks to streamed
//! result sets.

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// Cap on a single read hint; large payloads arrive in chunks of this size.
const MAX_READ_HINT: usize = 64 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header (need 5 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default payload bound (1 GB).
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with a custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(HEADER_SIZE),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns a vector of complete frames. If data is fragmented, partial
    /// data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns `FramingError` if a declared payload exceeds the configured
    /// maximum.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let header = match Header::decode(&self.buffer) {
                    Some(header) => header,
                    None => return Ok(None),
                };
                header.validate(self.max_payload_size)?;

                let _ = self.buffer.split_to(HEADER_SIZE);

                if header.payload_length == 0 {
                    return Ok(Some(Frame::new(header, Bytes::new())));
                }

                self.state = State::WaitingForPayload {
                    header,
                    remaining: header.payload_length,
                };
                self.try_extract_one()
            }

            State::WaitingForPayload { header, remaining } => {
                let remaining = *remaining as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                // Zero-copy freeze of exactly the payload bytes.
                let payload = self.buffer.split_to(remaining).freeze();
                let header = *header;
                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(header, payload)))
            }
        }
    }

    /// True if a frame has been started but not yet completed.
    ///
    /// The read loop applies the read timeout only in this state; an idle
    /// connection with no partial frame may legitimately stay quiet.
    pub fn mid_frame(&self) -> bool {
        match self.state {
            State::WaitingForHeader => !self.buffer.is_empty(),
            State::WaitingForPayload { .. } => true,
        }
    }

    /// How many bytes the next read should aim for.
    pub fn read_hint(&self) -> usize {
        match &self.state {
            State::WaitingForHeader => HEADER_SIZE.saturating_sub(self.buffer.len()).max(1),
            State::WaitingForPayload { remaining, .. } => {
                (*remaining as usize)
                    .saturating_sub(self.buffer.len())
                    .clamp(1, MAX_READ_HINT)
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
