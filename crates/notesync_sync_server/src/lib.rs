//! # notesync sync server
//!
//! Reference remote side for notesync.
//!
//! This crate provides:
//! - the authoritative event log, kept with the same core as clients
//! - the command service: one command per call, checked against the
//!   revision the client based it on
//! - the event stream: pages of events after a given event id
//! - an [`RpcHandler`](notesync_sync_protocol::RpcHandler) implementation
//!   answering encoded requests
//!
//! # Protocol
//!
//! A client submits each local event as a command carrying the last
//! remote revision it knows. The server appends at most one event and
//! answers with its id and revision, or with an id of `0` when the
//! command changed nothing. Rejected commands are answered with a
//! failure status rather than a call error.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::CommandServer;
