//! Wire protocol: header format, frames, and incremental frame parsing.
//!
//! A frame is one self-delimited unit of transfer: a 5-byte header (4-byte
//! big-endian payload length plus 1 message-type byte) followed by the
//! payload. The stream reader needs no external framing; [`FrameBuffer`]
//! reassembles frames from arbitrarily fragmented reads.

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{msg_type, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
