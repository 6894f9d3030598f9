//! Request/reply seam between the transport core and the facade layer.
//!
//! The facade maps relational operations onto concrete
//! [`RequestEncoder`]/[`ReplyDecoder`] pairs; the transport only moves the
//! resulting frames and routes replies back. Replies are not addressed by
//! an explicit request id on the wire: correlation is structural, by
//! message type plus [`ReplyDecoder::matches`], which may inspect
//! identifiers embedded in the payload (e.g. a statement id).

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::Result;

/// Encodes one outbound request payload.
pub trait RequestEncoder {
    /// Message-type code carried in the frame header. Replies to this
    /// request arrive with the same code.
    fn msg_type(&self) -> u8;

    /// Append the request payload to `buf`.
    fn encode(&self, buf: &mut BytesMut) -> Result<()>;
}

/// One decoded step of a reply sequence.
#[derive(Debug)]
pub enum Reply<T> {
    /// A non-terminal element of a multi-frame reply.
    Item(T),
    /// The final element; no further frames belong to this request.
    Last(T),
    /// A terminal frame that carries no element (bare end marker).
    End,
}

/// Validates and extracts typed results from reply payloads.
///
/// A single-reply decoder returns [`Reply::Last`] from its one frame. A
/// multi-reply decoder returns [`Reply::Item`] per element frame and
/// recognizes its own end marker with [`Reply::Last`] or [`Reply::End`];
/// the handler stays in the pending queue until then.
pub trait ReplyDecoder: Send + 'static {
    /// The decoded element type.
    type Item: Send + 'static;

    /// Structural identity check: does this payload belong to this
    /// request? Must not consume the payload; called before [`decode`]
    /// during queue matching.
    ///
    /// [`decode`]: ReplyDecoder::decode
    fn matches(&self, payload: &[u8]) -> bool {
        let _ = payload;
        true
    }

    /// Decode one frame payload into the next step of the reply.
    fn decode(&mut self, payload: Bytes) -> Result<Reply<Self::Item>>;
}

/// A lazy, single-consumer sequence of decoded reply elements.
///
/// Produced by [`Session::send_streaming`](crate::Session::send_streaming)
/// for multi-reply requests. Finite and non-restartable: once the decoder
/// recognizes the terminal frame, [`next`](ReplyStream::next) yields
/// `None` forever. A decode or transport failure surfaces as one `Err`
/// element followed by the end of the stream.
pub struct ReplyStream<T> {
    rx: mpsc::UnboundedReceiver<Result<T>>,
}

impl<T> ReplyStream<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<T>>) -> Self {
        Self { rx }
    }

    /// Next decoded element, or `None` once the reply is complete.
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }

    /// Drain the remaining elements, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}
