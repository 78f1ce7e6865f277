//! # notesync testkit
//!
//! Test utilities for notesync.
//!
//! This crate provides:
//! - proptest strategies for paths, events and edit commands
//! - event fixtures and temporary replica directories
//! - a loopback harness running several replicas against one in-process
//!   server
//!
//! ## Usage
//!
//! ```rust
//! use notesync_testkit::prelude::*;
//!
//! let harness = LoopbackHarness::new(2);
//! harness.replica(0).execute(&create_note_command("note-1", "T")).unwrap();
//! harness.settle();
//! harness.assert_converged();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
