//! # notesync sync protocol
//!
//! Wire contract between a notesync client and the remote side.
//!
//! This crate provides:
//! - `PostCommandRequest`/`PostCommandResponse`, one remote call per command
//! - `GetEventsRequest`/`GetEventsResponse`, the remote event stream
//! - CBOR encoding of every message
//! - the mapping between core [`Command`](notesync_core::Command)s and
//!   requests
//! - [`RpcHandler`], the byte-level endpoint a server exposes
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod mapping;
mod messages;
mod rpc;

pub use error::{ProtocolError, ProtocolResult};
pub use mapping::{command_to_request, request_to_command};
pub use messages::{
    CborMessage, CommandMessage, CommandStatus, GetEventsRequest, GetEventsResponse,
    PostCommandRequest, PostCommandResponse,
};
pub use rpc::{RpcCode, RpcHandler, RpcStatus, GET_EVENTS, POST_COMMAND};
