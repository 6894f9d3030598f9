//! Pending-request queue and the rotate-scan matching algorithm.
//!
//! Replies on this protocol carry no request id in the frame header, so an
//! inbound frame is correlated structurally: scan the queue of outstanding
//! handlers front to back, rotating non-matching handlers to the back, and
//! deliver the frame to the first handler whose message type and
//! payload-identity check both accept it. The rotation is bounded by the
//! queue length snapshotted at scan start, so a frame nobody claims cannot
//! spin the loop, and the relative order of unmatched handlers is
//! preserved across scans (FIFO fairness over many frames).
//!
//! This supports pipelining: several requests may be outstanding before
//! their replies arrive, and replies may arrive out of issue order as long
//! as each is still uniquely identifiable by (type, payload-embedded id).

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{BeelineError, Result};
use crate::promise::Promise;
use crate::protocol::Frame;
use crate::request::{Reply, ReplyDecoder};

/// What to do with a handler after it consumed a frame.
pub(crate) enum Disposition {
    /// The reply sequence is complete; drop the handler permanently.
    Finished,
    /// A multi-reply handler that expects more frames; re-queue it.
    KeepListening,
}

/// A type-erased outstanding request awaiting its reply frames.
pub(crate) trait PacketHandler: Send {
    /// The message-type code this handler accepts.
    fn msg_type(&self) -> u8;

    /// Structural identity check against the payload; must not consume it.
    fn matches(&self, payload: &[u8]) -> bool;

    /// Decode the payload and deliver the result to the waiting caller.
    fn handle(&mut self, payload: Bytes) -> Disposition;

    /// Fail the waiting caller; used when the session tears down.
    fn abandon(&mut self, error: BeelineError);
}

/// Result of feeding one frame through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// A handler accepted and consumed the frame.
    Matched,
    /// No handler claimed the frame after a full rotation; it is dropped.
    Unmatched,
}

/// Ordered collection of outstanding request handlers.
#[derive(Default)]
pub(crate) struct PendingQueue {
    handlers: VecDeque<Box<dyn PacketHandler>>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self {
            handlers: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, handler: Box<dyn PacketHandler>) {
        self.handlers.push_back(handler);
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Rotate-scan the queue for a handler accepting `frame`.
    ///
    /// Stops at the first successful match or after one full rotation of
    /// the queue length snapshotted on entry.
    pub(crate) fn dispatch(&mut self, frame: &Frame) -> DispatchOutcome {
        let budget = self.handlers.len();
        for _ in 0..budget {
            let mut handler = match self.handlers.pop_front() {
                Some(handler) => handler,
                None => break,
            };

            if handler.msg_type() != frame.msg_type() || !handler.matches(frame.payload()) {
                self.handlers.push_back(handler);
                continue;
            }

            if let Disposition::KeepListening = handler.handle(frame.payload_bytes()) {
                self.handlers.push_back(handler);
            }
            return DispatchOutcome::Matched;
        }
        DispatchOutcome::Unmatched
    }

    /// Fail every outstanding handler with `error` and clear the queue.
    pub(crate) fn fail_all(&mut self, error: &BeelineError) {
        for mut handler in self.handlers.drain(..) {
            handler.abandon(error.clone());
        }
    }
}

/// Single-reply pending request: decodes one frame and settles a promise.
pub(crate) struct PromiseHandler<D: ReplyDecoder> {
    msg_type: u8,
    decoder: D,
    promise: Promise<D::Item>,
}

impl<D: ReplyDecoder> PromiseHandler<D> {
    pub(crate) fn new(msg_type: u8, decoder: D, promise: Promise<D::Item>) -> Self {
        Self {
            msg_type,
            decoder,
            promise,
        }
    }
}

impl<D> PacketHandler for PromiseHandler<D>
where
    D: ReplyDecoder,
    D::Item: Clone,
{
    fn msg_type(&self) -> u8 {
        self.msg_type
    }

    fn matches(&self, payload: &[u8]) -> bool {
        self.decoder.matches(payload)
    }

    fn handle(&mut self, payload: Bytes) -> Disposition {
        match self.decoder.decode(payload) {
            Ok(Reply::Last(item)) | Ok(Reply::Item(item)) => self.promise.resolve(item),
            Ok(Reply::End) => self.promise.fail(BeelineError::Decode(
                "end marker without a value on a single-reply request".into(),
            )),
            Err(err) => self.promise.fail(err),
        }
        Disposition::Finished
    }

    fn abandon(&mut self, error: BeelineError) {
        self.promise.fail(error);
    }
}

/// Multi-reply pending request: feeds decoded elements into a
/// [`ReplyStream`](crate::ReplyStream) until the decoder recognizes its
/// end marker.
pub(crate) struct StreamHandler<D: ReplyDecoder> {
    msg_type: u8,
    decoder: D,
    tx: mpsc::UnboundedSender<Result<D::Item>>,
}

impl<D: ReplyDecoder> StreamHandler<D> {
    pub(crate) fn new(
        msg_type: u8,
        decoder: D,
        tx: mpsc::UnboundedSender<Result<D::Item>>,
    ) -> Self {
        Self {
            msg_type,
            decoder,
            tx,
        }
    }
}

impl<D: ReplyDecoder> PacketHandler for StreamHandler<D> {
    fn msg_type(&self) -> u8 {
        self.msg_type
    }

    fn matches(&self, payload: &[u8]) -> bool {
        self.decoder.matches(payload)
    }

    fn handle(&mut self, payload: Bytes) -> Disposition {
        match self.decoder.decode(payload) {
            Ok(Reply::Item(item)) => {
                // The consumer may have dropped its stream; keep draining
                // the reply sequence off the wire regardless.
                let _ = self.tx.send(Ok(item));
                Disposition::KeepListening
            }
            Ok(Reply::Last(item)) => {
                let _ = self.tx.send(Ok(item));
                Disposition::Finished
            }
            Ok(Reply::End) => Disposition::Finished,
            Err(err) => {
                let _ = self.tx.send(Err(err));
                Disposition::Finished
            }
        }
    }

    fn abandon(&mut self, error: BeelineError) {
        let _ = self.tx.send(Err(error));
    }
}
