// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sync coordinator — fans a master's changes out to its slaves.
//
// Dispatch rules:
//   - Reactive waves (selection change, new messages) hit all slaves
//     concurrently and are awaited together.
//   - Full syncs walk the slaves one at a time, so at most one slave holds a
//     session for this wave at any moment.
//   - Every command runs in its own connect/send/disconnect session.
//   - A failed command is logged and skipped. No retries, nothing raised.
//   - A trigger that arrives while a wave holds the guard is dropped.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use inkwerk_core::command::Command;
use inkwerk_core::config::GuardStrategy;
use inkwerk_core::types::{DispatchRecord, MasterState, Printer, PrinterId, PrinterRole, WaveId};
use inkwerk_link::registry::PrinterRegistry;
use inkwerk_link::source::MasterStateSource;
use inkwerk_link::transport::{Transport, send_once};

use crate::events::SyncEvent;
use crate::guard::{WaveGuard, WavePermit};
use crate::snapshot::SnapshotStore;

/// Dispatch records buffered for slow subscribers.
const RECORD_CHANNEL_CAPACITY: usize = 256;

/// What one coordinator call did. Informational only; failures of individual
/// commands are counted here, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveOutcome {
    /// Another wave held the guard; the trigger was dropped.
    Skipped,
    /// The master has no available slaves.
    NoSlaves,
    /// No source holds live state for the master.
    NoState,
    /// The trigger carried nothing to send.
    NothingToSend,
    Completed {
        wave: WaveId,
        slaves: usize,
        sent: usize,
        failed: usize,
    },
}

impl std::fmt::Display for WaveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped (sync already in progress)"),
            Self::NoSlaves => f.write_str("no available slaves"),
            Self::NoState => f.write_str("no live state for master"),
            Self::NothingToSend => f.write_str("nothing to send"),
            Self::Completed {
                wave,
                slaves,
                sent,
                failed,
            } => write!(
                f,
                "wave {wave}: {sent} sent, {failed} failed across {slaves} slave(s)"
            ),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    sent: usize,
    failed: usize,
}

pub struct SyncCoordinator {
    registry: PrinterRegistry,
    transport: Arc<dyn Transport>,
    /// State of the locally connected master, used by `full_sync`.
    local: Arc<dyn MasterStateSource>,
    /// Every place a master's state may live, used by `sync_specific_master`.
    sources: Arc<dyn MasterStateSource>,
    snapshots: SnapshotStore,
    guard: WaveGuard,
    records: broadcast::Sender<DispatchRecord>,
}

impl SyncCoordinator {
    /// Coordinator reading master state from `local` for every operation.
    pub fn new(
        registry: PrinterRegistry,
        transport: Arc<dyn Transport>,
        local: Arc<dyn MasterStateSource>,
    ) -> Self {
        let (records, _) = broadcast::channel(RECORD_CHANNEL_CAPACITY);
        Self {
            registry,
            transport,
            sources: Arc::clone(&local),
            local,
            snapshots: SnapshotStore::new(),
            guard: WaveGuard::default(),
            records,
        }
    }

    /// Sources consulted by `sync_specific_master`.
    pub fn with_sources(mut self, sources: Arc<dyn MasterStateSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_guard_strategy(mut self, strategy: GuardStrategy) -> Self {
        self.guard = WaveGuard::new(strategy);
        self
    }

    pub fn guard_strategy(&self) -> GuardStrategy {
        self.guard.strategy()
    }

    pub fn registry(&self) -> &PrinterRegistry {
        &self.registry
    }

    /// Whether a trigger for `master_id` would be dropped right now.
    pub fn is_syncing(&self, master_id: PrinterId) -> bool {
        self.guard.is_busy(master_id)
    }

    /// Receive a record of every command attempt from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchRecord> {
        self.records.subscribe()
    }

    /// Feed a master's live state through change detection.
    ///
    /// Updates the snapshot before returning, so the caller dispatches
    /// against the newest state only. Printers that are not currently
    /// masters produce no events and lose their snapshot.
    pub fn observe(&self, master_id: PrinterId, live: &MasterState) -> Vec<SyncEvent> {
        let is_master = self
            .registry
            .get(master_id)
            .is_some_and(|p| p.role == PrinterRole::Master);
        if !is_master {
            self.snapshots.forget(master_id);
            return Vec::new();
        }

        let delta = self.snapshots.observe(master_id, live);
        // Under the global guard the selection wave queued behind this
        // announce wave is dropped, and the snapshot no longer shows it as new.
        let mut events = Vec::new();
        if !delta.added_names.is_empty() {
            events.push(SyncEvent::MessageListChanged {
                master_id,
                added_names: delta.added_names,
            });
        }
        if let Some(name) = delta.new_selection {
            events.push(SyncEvent::SelectionChanged { master_id, name });
        }
        events
    }

    /// Route an event to the matching operation.
    pub async fn handle(&self, event: SyncEvent) -> WaveOutcome {
        match event {
            SyncEvent::SelectionChanged { master_id, name } => {
                self.on_selection_changed(master_id, &name).await
            }
            SyncEvent::MessageListChanged {
                master_id,
                added_names,
            } => self.on_message_list_changed(master_id, &added_names).await,
            SyncEvent::FullSyncRequested { master_id } => self.full_sync(master_id).await,
        }
    }

    /// Make every available slave of `master_id` select `name`.
    #[instrument(skip(self))]
    pub async fn on_selection_changed(&self, master_id: PrinterId, name: &str) -> WaveOutcome {
        if name.is_empty() {
            return WaveOutcome::NothingToSend;
        }
        let commands = [Command::SelectMessage(name.to_string())];
        self.reactive_wave(master_id, &commands).await
    }

    /// Announce `added_names`, in order, to every available slave.
    #[instrument(skip(self, added_names), fields(count = added_names.len()))]
    pub async fn on_message_list_changed(
        &self,
        master_id: PrinterId,
        added_names: &[String],
    ) -> WaveOutcome {
        if added_names.is_empty() {
            return WaveOutcome::NothingToSend;
        }
        let commands: Vec<Command> = added_names
            .iter()
            .map(|name| Command::AnnounceMessage(name.clone()))
            .collect();
        self.reactive_wave(master_id, &commands).await
    }

    /// Resend the locally connected master's whole catalogue and selection.
    #[instrument(skip(self))]
    pub async fn full_sync(&self, master_id: PrinterId) -> WaveOutcome {
        let Some(permit) = self.begin(master_id) else {
            return WaveOutcome::Skipped;
        };
        let Some(state) = self.local.master_state(master_id) else {
            warn!(master = %master_id, "full sync requested but master is not connected");
            return WaveOutcome::NoState;
        };
        self.sequential_wave(permit, master_id, &state).await
    }

    /// Same as `full_sync`, sourced from any master whose state is held by
    /// one of the configured sources.
    #[instrument(skip(self))]
    pub async fn sync_specific_master(&self, master_id: PrinterId) -> WaveOutcome {
        let Some(permit) = self.begin(master_id) else {
            return WaveOutcome::Skipped;
        };
        let Some(state) = self.sources.master_state(master_id) else {
            warn!(master = %master_id, "no live state found for master");
            return WaveOutcome::NoState;
        };
        self.sequential_wave(permit, master_id, &state).await
    }

    fn begin(&self, master_id: PrinterId) -> Option<WavePermit> {
        let permit = self.guard.try_begin(master_id);
        if permit.is_none() {
            info!(master = %master_id, "sync already in progress, trigger dropped");
        }
        permit
    }

    async fn reactive_wave(&self, master_id: PrinterId, commands: &[Command]) -> WaveOutcome {
        let Some(_permit) = self.begin(master_id) else {
            return WaveOutcome::Skipped;
        };
        let slaves = self.registry.slaves_of(master_id);
        if slaves.is_empty() {
            debug!(master = %master_id, "no available slaves");
            return WaveOutcome::NoSlaves;
        }

        let wave = WaveId::new();
        info!(%wave, master = %master_id, slaves = slaves.len(), commands = commands.len(), "sync wave started");

        let tallies = join_all(
            slaves
                .iter()
                .map(|slave| self.send_sequence(wave, master_id, slave, commands)),
        )
        .await;

        finish(wave, master_id, slaves.len(), tallies)
    }

    async fn sequential_wave(
        &self,
        _permit: WavePermit,
        master_id: PrinterId,
        state: &MasterState,
    ) -> WaveOutcome {
        let slaves = self.registry.slaves_of(master_id);
        if slaves.is_empty() {
            debug!(master = %master_id, "no available slaves");
            return WaveOutcome::NoSlaves;
        }

        let mut commands: Vec<Command> = state
            .names()
            .map(|name| Command::AnnounceMessage(name.to_string()))
            .collect();
        if let Some(selection) = state.selection.as_deref().filter(|s| !s.is_empty()) {
            commands.push(Command::SelectMessage(selection.to_string()));
        }
        if commands.is_empty() {
            return WaveOutcome::NothingToSend;
        }

        let wave = WaveId::new();
        info!(%wave, master = %master_id, slaves = slaves.len(), commands = commands.len(), "full sync started");

        let mut tallies = Vec::with_capacity(slaves.len());
        for slave in &slaves {
            tallies.push(self.send_sequence(wave, master_id, slave, &commands).await);
        }

        finish(wave, master_id, slaves.len(), tallies)
    }

    /// Send `commands` to one slave in order, one session per command.
    async fn send_sequence(
        &self,
        wave: WaveId,
        master_id: PrinterId,
        slave: &Printer,
        commands: &[Command],
    ) -> Tally {
        let endpoint = slave.endpoint();
        let mut tally = Tally::default();

        for command in commands {
            let wire = command.to_wire();
            let result = send_once(self.transport.as_ref(), &endpoint, &wire).await;

            let (success, detail) = match result {
                Ok(response) => {
                    debug!(%wave, slave = %slave.id, command = %wire, "command delivered");
                    tally.sent += 1;
                    (true, Some(response))
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(%wave, slave = %slave.id, command = %wire, error = %e, "command not delivered");
                    } else {
                        error!(%wave, slave = %slave.id, command = %wire, error = %e, "command rejected");
                    }
                    tally.failed += 1;
                    (false, Some(e.to_string()))
                }
            };

            // Nobody listening is fine.
            let _ = self.records.send(DispatchRecord {
                wave,
                master_id,
                slave_id: slave.id,
                command: wire,
                success,
                detail,
                at: Utc::now(),
            });
        }
        tally
    }
}

fn finish(wave: WaveId, master_id: PrinterId, slaves: usize, tallies: Vec<Tally>) -> WaveOutcome {
    let (sent, failed) = tallies
        .iter()
        .fold((0, 0), |(s, f), t| (s + t.sent, f + t.failed));
    if failed > 0 {
        warn!(%wave, master = %master_id, sent, failed, "sync wave finished with failures");
    } else {
        info!(%wave, master = %master_id, sent, "sync wave finished");
    }
    WaveOutcome::Completed {
        wave,
        slaves,
        sent,
        failed,
    }
}
