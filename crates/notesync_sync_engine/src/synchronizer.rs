//! The synchronization driver.
//!
//! A pass drains both staging logs and routes every pending event:
//!
//! 1. events the synchronizer caused itself (echoes) are dropped
//! 2. aggregates with pending events on one side only are mirrored to the
//!    other side
//! 3. aggregates with pending events on both sides go to the strategy
//!
//! An event leaves its staging log only after its effect is confirmed, so
//! a failed pass is repeated by the next one.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::event_mapper::event_to_command;
use crate::state::{StateStore, SynchronizerState};
use crate::strategy::{CompensatingAction, ResolutionResult, SynchronizationStrategy};
use crate::transport::CommandService;
use notesync_core::{
    AggId, ChangeFeed, CommandOrigin, CommandProcessor, Event, ModifiableEventStore, StateFeed,
};
use notesync_sync_protocol::command_to_request;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPassReport {
    /// Events confirmed by the remote side.
    pub sent: usize,
    /// Events applied to the local side.
    pub applied: usize,
    /// Echo events dropped from staging.
    pub ignored: usize,
    /// Diverged aggregates reconciled by the strategy.
    pub resolved: usize,
    /// Aggregates that failed and stay pending.
    pub errored: BTreeSet<AggId>,
    /// Aggregates waiting for a manual decision.
    pub conflicting: BTreeSet<AggId>,
    /// Whether the remote side could not be reached.
    pub remote_unavailable: bool,
}

impl SyncPassReport {
    /// Returns true if nothing was left pending.
    pub fn is_clean(&self) -> bool {
        self.errored.is_empty() && self.conflicting.is_empty() && !self.remote_unavailable
    }
}

fn group_by_aggregate(events: Vec<Event>) -> BTreeMap<AggId, Vec<Event>> {
    let mut grouped: BTreeMap<AggId, Vec<Event>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.agg_id.clone()).or_default().push(event);
    }
    for events in grouped.values_mut() {
        events.sort_by_key(|event| event.revision);
    }
    grouped
}

#[derive(Clone, Copy)]
enum Origin {
    Local,
    Remote,
}

/// Drives synchronization between the local log and the remote service.
pub struct Synchronizer {
    config: SyncConfig,
    processor: Arc<CommandProcessor>,
    local_staging: Arc<dyn ModifiableEventStore>,
    remote_staging: Arc<dyn ModifiableEventStore>,
    commands: Arc<dyn CommandService>,
    strategy: Arc<dyn SynchronizationStrategy>,
    state: StateFeed<SynchronizerState>,
    state_store: Option<Arc<dyn StateStore<SynchronizerState>>>,
    conflicts: ChangeFeed<AggId>,
    pass_lock: Mutex<()>,
}

impl Synchronizer {
    /// Creates a synchronizer with empty state.
    pub fn new(
        config: SyncConfig,
        processor: Arc<CommandProcessor>,
        local_staging: Arc<dyn ModifiableEventStore>,
        remote_staging: Arc<dyn ModifiableEventStore>,
        commands: Arc<dyn CommandService>,
        strategy: Arc<dyn SynchronizationStrategy>,
    ) -> Self {
        Self {
            config,
            processor,
            local_staging,
            remote_staging,
            commands,
            strategy,
            state: StateFeed::default(),
            state_store: None,
            conflicts: ChangeFeed::new(),
            pass_lock: Mutex::new(()),
        }
    }

    /// Restores state from `store` and persists every later change there.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state cannot be read.
    pub fn with_state_store(
        mut self,
        store: Arc<dyn StateStore<SynchronizerState>>,
    ) -> SyncResult<Self> {
        if let Some(state) = store.load()? {
            self.state.publish(state);
        }
        self.state_store = Some(store);
        Ok(self)
    }

    /// Returns the current state.
    pub fn state(&self) -> SynchronizerState {
        self.state.get()
    }

    /// Subscribes to state changes. The current state is delivered first.
    pub fn state_updates(&self) -> Receiver<SynchronizerState> {
        self.state.subscribe()
    }

    /// Subscribes to aggregates that need a manual decision.
    pub fn conflict_updates(&self) -> Receiver<AggId> {
        self.conflicts.subscribe()
    }

    /// Runs one pass. Concurrent calls are serialized.
    ///
    /// Failures of single aggregates are reported in the result and leave
    /// their events staged.
    ///
    /// # Errors
    ///
    /// Returns an error only if a staging log cannot be read.
    pub fn synchronize(&self) -> SyncResult<SyncPassReport> {
        let _pass = self.pass_lock.lock();
        let mut report = SyncPassReport::default();

        let local = self.local_staging.events()?;
        let remote = self.remote_staging.events()?;

        self.update_state(|state| {
            for event in &local {
                state.observe_local(&event.agg_id, event.revision);
            }
            for event in &remote {
                state.observe_remote(&event.agg_id, event.revision);
            }
        })?;

        let mut local = group_by_aggregate(self.drop_echoes(local, Origin::Local, &mut report));
        let mut remote = group_by_aggregate(self.drop_echoes(remote, Origin::Remote, &mut report));

        let conflicting: Vec<AggId> = local
            .keys()
            .filter(|agg_id| remote.contains_key(*agg_id))
            .cloned()
            .collect();
        let mut diverged = Vec::with_capacity(conflicting.len());
        for agg_id in conflicting {
            if let (Some(local_events), Some(remote_events)) =
                (local.remove(&agg_id), remote.remove(&agg_id))
            {
                diverged.push((agg_id, local_events, remote_events));
            }
        }

        for (agg_id, events) in &local {
            if report.remote_unavailable {
                break;
            }
            self.send_pending(agg_id, events, &mut report);
        }

        for (agg_id, events) in &remote {
            self.apply_pending(agg_id, events, &mut report);
        }

        if report.remote_unavailable && !diverged.is_empty() {
            debug!(aggregates = diverged.len(), "remote unavailable, postponing diverged aggregates");
        } else {
            for (agg_id, local_events, remote_events) in &diverged {
                self.reconcile(agg_id, local_events, remote_events, &mut report);
            }
        }

        info!(
            sent = report.sent,
            applied = report.applied,
            ignored = report.ignored,
            resolved = report.resolved,
            errored = report.errored.len(),
            conflicting = report.conflicting.len(),
            remote_unavailable = report.remote_unavailable,
            "synchronization pass finished"
        );
        Ok(report)
    }

    fn drop_echoes(
        &self,
        events: Vec<Event>,
        origin: Origin,
        report: &mut SyncPassReport,
    ) -> Vec<Event> {
        let state = self.state.get();
        let (ignored, staging) = match origin {
            Origin::Local => (&state.local_event_ids_to_ignore, &self.local_staging),
            Origin::Remote => (&state.remote_event_ids_to_ignore, &self.remote_staging),
        };

        let mut pending = Vec::with_capacity(events.len());
        for event in events {
            if !ignored.contains(&event.event_id) {
                pending.push(event);
                continue;
            }
            let dropped = staging.remove(&event).map_err(SyncError::from).and_then(|()| {
                self.update_state(|state| {
                    match origin {
                        Origin::Local => state.local_event_ids_to_ignore.remove(&event.event_id),
                        Origin::Remote => state.remote_event_ids_to_ignore.remove(&event.event_id),
                    };
                })
            });
            match dropped {
                Ok(()) => {
                    debug!(event_id = event.event_id, agg_id = %event.agg_id, "dropped echo");
                    report.ignored += 1;
                }
                Err(err) => self.record_failure(&event.agg_id, &err, report),
            }
        }
        pending
    }

    fn send_pending(&self, agg_id: &str, events: &[Event], report: &mut SyncPassReport) {
        for event in events {
            let sent = self.send(event).and_then(|()| {
                self.update_state(|state| state.mark_synchronized(agg_id, event.revision))?;
                Ok(self.local_staging.remove(event)?)
            });
            match sent {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    self.record_failure(agg_id, &err, report);
                    return;
                }
            }
        }
    }

    fn apply_pending(&self, agg_id: &str, events: &[Event], report: &mut SyncPassReport) {
        for event in events {
            let applied = self
                .apply(event)
                .and_then(|()| Ok(self.remote_staging.remove(event)?));
            match applied {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    self.record_failure(agg_id, &err, report);
                    return;
                }
            }
        }
    }

    fn reconcile(
        &self,
        agg_id: &str,
        local_events: &[Event],
        remote_events: &[Event],
        report: &mut SyncPassReport,
    ) {
        match self.strategy.resolve(agg_id, local_events, remote_events) {
            Ok(ResolutionResult::NoSolution) => {
                info!(agg_id, "conflict waiting for a decision");
                report.conflicting.insert(agg_id.to_string());
                self.conflicts.emit(agg_id.to_string());
            }
            Ok(ResolutionResult::Solution(actions)) => {
                let confirmed_before = report.sent + report.applied;
                for action in &actions {
                    if let Err(err) = self.execute(action, report) {
                        let partially_applied = report.sent + report.applied > confirmed_before;
                        self.strategy.reopen(agg_id, partially_applied);
                        self.record_failure(agg_id, &err, report);
                        return;
                    }
                }
                self.strategy.settled(agg_id);
                debug!(agg_id, actions = actions.len(), "diverged aggregate reconciled");
                report.resolved += 1;
            }
            Err(err) => self.record_failure(agg_id, &err, report),
        }
    }

    fn execute(&self, action: &CompensatingAction, report: &mut SyncPassReport) -> SyncResult<()> {
        for event in &action.new_remote_events {
            self.send(event)?;
            report.sent += 1;
        }
        for event in &action.new_local_events {
            self.apply(event)?;
            report.applied += 1;
        }

        self.update_state(|state| {
            for event in &action.compensated_local_events {
                state.mark_synchronized(&event.agg_id, event.revision);
            }
        })?;
        for event in &action.compensated_local_events {
            self.local_staging.remove(event)?;
        }
        for event in &action.compensated_remote_events {
            self.remote_staging.remove(event)?;
        }
        Ok(())
    }

    /// Submits the command reproducing `event` to the remote side.
    fn send(&self, event: &Event) -> SyncResult<()> {
        let last_revision = self.state.get().last_known_remote(&event.agg_id);
        let request = command_to_request(&event_to_command(event, Some(last_revision)));
        let response = self
            .commands
            .post_command(&request, self.config.rpc_deadline)?;

        if !response.is_success() {
            return Err(SyncError::Rejected {
                agg_id: event.agg_id.clone(),
                reason: response.error_description,
            });
        }
        if response.has_event() {
            self.update_state(|state| {
                state.remote_event_ids_to_ignore.insert(response.new_event_id);
                state.observe_remote(&event.agg_id, response.new_revision);
            })?;
        }

        debug!(
            agg_id = %event.agg_id,
            event = event.payload.name(),
            last_revision,
            new_event_id = response.new_event_id,
            "sent event"
        );
        Ok(())
    }

    /// Applies the command reproducing `event` to the local side.
    fn apply(&self, event: &Event) -> SyncResult<()> {
        let last_revision = self.state.get().last_known_local(&event.agg_id);
        let command = event_to_command(event, Some(last_revision));
        let produced = self.processor.process(&command, CommandOrigin::Remote)?;

        if let Some(produced) = &produced {
            self.update_state(|state| {
                state.local_event_ids_to_ignore.insert(produced.event_id);
                state.observe_local(&produced.agg_id, produced.revision);
                state.mark_synchronized(&produced.agg_id, produced.revision);
            })?;
        }

        debug!(
            agg_id = %event.agg_id,
            event = event.payload.name(),
            last_revision,
            produced = ?produced.as_ref().map(|e| e.event_id),
            "applied event"
        );
        Ok(())
    }

    fn record_failure(&self, agg_id: &str, err: &SyncError, report: &mut SyncPassReport) {
        if err.is_transient() {
            if !report.remote_unavailable {
                warn!(error = %err, "remote unavailable, postponing submissions");
            }
            report.remote_unavailable = true;
        } else {
            warn!(agg_id, error = %err, "aggregate failed, keeping its events staged");
            report.errored.insert(agg_id.to_string());
        }
    }

    fn update_state(&self, change: impl FnOnce(&mut SynchronizerState)) -> SyncResult<()> {
        let (next, changed) = self.state.update(|current| {
            let mut next = current.clone();
            change(&mut next);
            next
        });
        if changed && self.config.persist_state {
            if let Some(store) = &self.state_store {
                store.save(&next)?;
            }
        }
        Ok(())
    }
}
