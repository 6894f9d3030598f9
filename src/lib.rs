//! Client-side transport for a binary database protocol over one
//! persistent TCP connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ facade (caller-defined request/decoder pairs)        │
//! ├──────────────────────────────────────────────────────┤
//! │ Session      one socket, write lock + read task      │
//! │ PendingQueue rotate-scan reply correlation           │
//! │ Promise      single-assignment result cells          │
//! ├──────────────────────────────────────────────────────┤
//! │ protocol     5-byte header framing, FrameBuffer      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! All requests of one logical connection are pipelined over a single
//! socket. A reply frame carries the same message-type code as its
//! request but no request id; the [`Session`]'s read task correlates it
//! by scanning the queue of outstanding requests for the first handler
//! whose type and [`ReplyDecoder::matches`] check both accept the
//! payload. Decoders for pipelined requests of the same type
//! disambiguate via identifiers they embed in the payload (see
//! [`Session::next_request_id`]).
//!
//! # Example
//!
//! ```no_run
//! use beeline::{Session, SessionConfig};
//!
//! # async fn run() -> beeline::Result<()> {
//! let session = Session::connect(
//!     "db.example.com",
//!     9090,
//!     "bee://db.example.com:9090/orders",
//!     "reporting",
//!     SessionConfig::default(),
//! )
//! .await?;
//!
//! session.ping().await?;
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod request;

mod handshake;
mod pending;
mod promise;
mod session;

pub use config::SessionConfig;
pub use error::{BeelineError, Result};
pub use promise::Promise;
pub use request::{Reply, ReplyDecoder, ReplyStream, RequestEncoder};
pub use session::{Session, MAX_REQUEST_ID};
