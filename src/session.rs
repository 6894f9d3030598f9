//! Connection session: one persistent TCP connection multiplexing all
//! requests of a logical database connection.
//!
//! A [`Session`] owns the socket's write half behind an async mutex and a
//! background read task that drives the inbound side: read, reassemble
//! frames, and dispatch each frame through the pending-request queue.
//! Requests are enqueued and written under the write lock, so queue order
//! always matches wire order even with concurrent senders.
//!
//! Any fatal error (socket failure, malformed frame, peer disconnect)
//! poisons the session: the first error is recorded, every pending promise
//! is failed with it, and all later sends are refused with the same error.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::{BeelineError, Result};
use crate::handshake::{ConnectReplyDecoder, ConnectRequest, PingRequest};
use crate::pending::{
    DispatchOutcome, PacketHandler, PendingQueue, PromiseHandler, StreamHandler,
};
use crate::promise::Promise;
use crate::protocol::{build_frame, Frame, FrameBuffer};
use crate::request::{ReplyDecoder, ReplyStream, RequestEncoder};

/// Exclusive upper bound for request ids handed out by
/// [`Session::next_request_id`]; the counter wraps back to zero here.
pub const MAX_REQUEST_ID: u32 = 65_535;

/// Lock a std mutex, recovering the guard if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    write: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Mutex<PendingQueue>,
    closed: AtomicBool,
    /// First fatal error observed; reported by every send after it.
    fatal: Mutex<Option<BeelineError>>,
    next_id: AtomicU32,
    unmatched: AtomicU64,
    read_task: Mutex<Option<JoinHandle<()>>>,
    config: SessionConfig,
}

impl Shared {
    /// Record `error` as the session's fatal error (first one wins), mark
    /// the session closed, and fail every pending request with it.
    fn fail(&self, error: BeelineError) {
        let recorded = {
            let mut fatal = lock(&self.fatal);
            fatal.get_or_insert(error).clone()
        };
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.pending).fail_all(&recorded);
    }

    /// The error a refused operation reports: the recorded fatal error if
    /// one exists, otherwise a plain not-connected.
    fn closed_error(&self) -> BeelineError {
        lock(&self.fatal)
            .clone()
            .unwrap_or(BeelineError::NotConnected)
    }

    fn dispatch(&self, frame: &Frame) {
        if lock(&self.pending).dispatch(frame) == DispatchOutcome::Unmatched {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                msg_type = frame.msg_type(),
                payload_len = frame.payload_len(),
                "dropping frame no pending request claimed"
            );
        }
    }
}

/// Handle to one live protocol connection.
///
/// Cheaply cloneable; all clones share the socket, the pending queue, and
/// the session lifecycle. Requests may be pipelined from any number of
/// tasks concurrently.
pub struct Session {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Session {
    /// Open a TCP connection to `host:port` and perform the connect
    /// handshake, identifying as `application` against database `url`.
    ///
    /// The configured connect timeout bounds both socket establishment and
    /// the handshake reply. On any failure the socket is torn down and no
    /// usable session is returned.
    pub async fn connect(
        host: &str,
        port: u16,
        url: &str,
        application: &str,
        config: SessionConfig,
    ) -> Result<Session> {
        let connect_timeout = config.connect_timeout;
        let stream = match tokio::time::timeout(
            connect_timeout,
            TcpStream::connect((host, port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(BeelineError::Connect(format!(
                    "tcp connect to {host}:{port} failed: {err}"
                )))
            }
            Err(_) => return Err(BeelineError::Timeout),
        };
        // Small request/reply frames; coalescing delays hurt latency.
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(%err, "set_nodelay failed, continuing without");
        }

        let (read_half, write_half) = stream.into_split();
        let shared = Arc::new(Shared {
            write: tokio::sync::Mutex::new(write_half),
            pending: Mutex::new(PendingQueue::new()),
            closed: AtomicBool::new(false),
            fatal: Mutex::new(None),
            next_id: AtomicU32::new(0),
            unmatched: AtomicU64::new(0),
            read_task: Mutex::new(None),
            config,
        });
        let handle = tokio::spawn(read_loop(Arc::clone(&shared), read_half));
        *lock(&shared.read_task) = Some(handle);

        let session = Session { shared };
        let request = ConnectRequest {
            url: url.to_string(),
            application: application.to_string(),
        };
        let promise = match session.send(&request, ConnectReplyDecoder).await {
            Ok(promise) => promise,
            Err(err) => {
                session.close().await;
                return Err(BeelineError::Connect(format!("handshake failed: {err}")));
            }
        };
        let reply = match promise.wait(connect_timeout).await {
            Ok(reply) => reply,
            Err(err) => {
                session.close().await;
                return Err(match err {
                    BeelineError::Timeout => BeelineError::Timeout,
                    other => BeelineError::Connect(format!("handshake failed: {other}")),
                });
            }
        };
        if !reply.ok {
            session.close().await;
            let detail = reply
                .error_detail
                .unwrap_or_else(|| "server refused connection".to_string());
            return Err(BeelineError::Connect(detail));
        }
        tracing::debug!(host, port, application, "session established");
        Ok(session)
    }

    /// Send a single-reply request. The returned promise settles when the
    /// matching reply frame arrives, or fails if the session dies first.
    pub async fn send<E, D>(&self, request: &E, decoder: D) -> Result<Promise<D::Item>>
    where
        E: RequestEncoder,
        D: ReplyDecoder,
        D::Item: Clone,
    {
        let promise = Promise::new();
        let handler = PromiseHandler::new(request.msg_type(), decoder, promise.clone());
        self.write_request(request, Some(Box::new(handler))).await?;
        Ok(promise)
    }

    /// Send a multi-reply request. Decoded elements arrive on the returned
    /// stream until the decoder recognizes the terminal frame.
    pub async fn send_streaming<E, D>(
        &self,
        request: &E,
        decoder: D,
    ) -> Result<ReplyStream<D::Item>>
    where
        E: RequestEncoder,
        D: ReplyDecoder,
    {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = StreamHandler::new(request.msg_type(), decoder, tx);
        self.write_request(request, Some(Box::new(handler))).await?;
        Ok(ReplyStream::new(rx))
    }

    /// Fire-and-forget liveness probe; no reply is awaited.
    pub async fn ping(&self) -> Result<()> {
        self.write_request(&PingRequest, None).await
    }

    /// Encode `request` into one frame, write it, and (for replied
    /// requests) enqueue its handler.
    ///
    /// The handler is enqueued before the frame hits the wire, still under
    /// the write lock, so a reply can never race past its handler. If the
    /// write fails the session is poisoned and every pending handler,
    /// including this one, is failed with the write error.
    async fn write_request(
        &self,
        request: &impl RequestEncoder,
        handler: Option<Box<dyn PacketHandler>>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(self.shared.closed_error());
        }

        let mut payload = BytesMut::new();
        request.encode(&mut payload)?;
        let bytes = build_frame(request.msg_type(), &payload);

        let mut write = self.shared.write.lock().await;
        // The session may have failed while we waited for the lock.
        if self.is_closed() {
            return Err(self.shared.closed_error());
        }
        if let Some(handler) = handler {
            lock(&self.shared.pending).push(handler);
        }
        let result = async {
            write.write_all(&bytes).await?;
            write.flush().await
        }
        .await;
        if let Err(err) = result {
            let err = BeelineError::from(err);
            self.shared.fail(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Close the session: stop the read task, fail every pending request,
    /// and shut the socket down. Idempotent.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = lock(&self.shared.read_task).take() {
            task.abort();
        }
        lock(&self.shared.pending).fail_all(&BeelineError::NotConnected);
        let mut write = self.shared.write.lock().await;
        if let Err(err) = write.shutdown().await {
            tracing::debug!(%err, "socket shutdown failed during close");
        }
        tracing::debug!("session closed");
    }

    /// Whether the session has been closed or has failed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// The fatal error that killed this session, if any.
    pub fn last_error(&self) -> Option<BeelineError> {
        lock(&self.shared.fatal).clone()
    }

    /// Allocate the next request id for payload-embedded correlation.
    ///
    /// Wraps within `[0, MAX_REQUEST_ID)`; with up to that many requests
    /// in flight the id uniquely identifies one of them.
    pub fn next_request_id(&self) -> u16 {
        let id = self
            .shared
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some((v + 1) % MAX_REQUEST_ID)
            })
            .unwrap_or(0);
        id as u16
    }

    /// Frames dropped because no pending request claimed them.
    pub fn unmatched_frames(&self) -> u64 {
        self.shared.unmatched.load(Ordering::Relaxed)
    }
}

/// Read-side driver task: runs until the connection dies or the session is
/// closed, then poisons the session with whatever ended it.
async fn read_loop(shared: Arc<Shared>, read: OwnedReadHalf) {
    let error = match run_read_loop(&shared, read).await {
        Ok(()) => BeelineError::ConnectionClosed,
        Err(err) => err,
    };
    // A close() initiated by the user aborts this task; reaching here with
    // the closed flag already set means the teardown was deliberate.
    if !shared.closed.load(Ordering::SeqCst) {
        tracing::error!(%error, "read loop terminated");
        shared.fail(error);
    }
}

async fn run_read_loop(shared: &Shared, mut read: OwnedReadHalf) -> Result<()> {
    let mut framer = FrameBuffer::with_max_payload(shared.config.max_payload_size);
    let mut buf = BytesMut::with_capacity(crate::protocol::HEADER_SIZE);
    loop {
        buf.clear();
        buf.reserve(framer.read_hint());

        // An idle connection may stay quiet indefinitely; only a stall in
        // the middle of a frame indicates a dead peer or broken stream.
        let n = if framer.mid_frame() {
            match tokio::time::timeout(shared.config.read_timeout, read.read_buf(&mut buf)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(BeelineError::Framing(format!(
                        "mid-frame read stalled for {:?} with {} bytes buffered",
                        shared.config.read_timeout,
                        framer.len()
                    )))
                }
            }
        } else {
            read.read_buf(&mut buf).await?
        };
        if n == 0 {
            return Err(BeelineError::ConnectionClosed);
        }

        for frame in framer.push(&buf)? {
            tracing::trace!(
                msg_type = frame.msg_type(),
                payload_len = frame.payload_len(),
                "frame received"
            );
            shared.dispatch(&frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn session_over_loopback() -> Session {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, _server) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (_read, write) = client.unwrap().into_split();
        Session {
            shared: Arc::new(Shared {
                write: tokio::sync::Mutex::new(write),
                pending: Mutex::new(PendingQueue::new()),
                closed: AtomicBool::new(false),
                fatal: Mutex::new(None),
                next_id: AtomicU32::new(0),
                unmatched: AtomicU64::new(0),
                read_task: Mutex::new(None),
                config: SessionConfig::default(),
            }),
        }
    }

    #[tokio::test]
    async fn test_request_id_wraps_before_max() {
        let session = session_over_loopback().await;
        session
            .shared
            .next_id
            .store(MAX_REQUEST_ID - 1, Ordering::SeqCst);

        assert_eq!(session.next_request_id(), (MAX_REQUEST_ID - 1) as u16);
        assert_eq!(session.next_request_id(), 0);
        assert_eq!(session.next_request_id(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_is_sticky() {
        let session = session_over_loopback().await;
        session.shared.fail(BeelineError::ConnectionClosed);
        session.shared.fail(BeelineError::Timeout);

        // First error wins and is what later sends report.
        assert!(session.is_closed());
        assert!(matches!(
            session.last_error(),
            Some(BeelineError::ConnectionClosed)
        ));
        assert!(matches!(
            session.shared.closed_error(),
            BeelineError::ConnectionClosed
        ));
    }
}
