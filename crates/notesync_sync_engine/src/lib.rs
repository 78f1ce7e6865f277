//! # notesync sync engine
//!
//! Keeps a local note log and a remote, authoritative one in step.
//!
//! This crate provides:
//! - the [`Synchronizer`], which mirrors pending events between two
//!   staging logs and hands diverged aggregates to a strategy
//! - importers that fill the staging logs from the local log and from a
//!   remote [`EventService`]
//! - the [`DifferenceAnalyzer`] and [`DifferenceCompensator`], which turn
//!   two versions of an aggregate into the events that align them
//! - synchronization strategies: the no-conflict fast path, manual
//!   resolution and their composition
//! - transports: [`RpcTransport`] over an in-process handler, and
//!   [`MockTransport`] for tests
//! - [`SyncClient`], which wires all of the above for one replica
//!
//! ## Key invariants
//!
//! - an event leaves its staging log only after its effect is confirmed
//! - events caused by the synchronizer itself are recognized by id and
//!   never mirrored back
//! - failures are isolated to the aggregate they concern
//! - an unreachable remote postpones work, it never drops it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod compensator;
mod config;
mod difference;
mod error;
mod event_mapper;
mod importer;
mod state;
mod strategy;
mod synchronizer;
mod transport;

pub use client::{ClientStores, Conflict, SyncClient, SyncClientBuilder};
pub use compensator::{CompensatingEvents, DifferenceCompensator, Side};
pub use config::SyncConfig;
pub use difference::{Difference, DifferenceAnalyzer, Reconcilable};
pub use error::{SyncError, SyncResult};
pub use event_mapper::event_to_command;
pub use importer::{LocalEventImporter, RemoteEventImporter};
pub use state::{FileStateStore, ImportCursor, MemoryStateStore, StateStore, SynchronizerState};
pub use strategy::{
    CompensatingAction, CompositeStrategy, ConflictData, IdGenerator, ManualMergeStrategy,
    MergeResult, MergeSolution, MergeStrategy, MergingSynchronizationStrategy,
    NoConflictStrategy, ResolutionChoice, ResolutionResult, SynchronizationStrategy,
};
pub use synchronizer::{SyncPassReport, Synchronizer};
pub use transport::{CommandService, EventService, MockTransport, RpcTransport};
