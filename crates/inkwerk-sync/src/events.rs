// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sync events and the control loop that consumes them.
//
// Whoever owns a master's state publishes events; `SyncService` takes them
// in arrival order and starts one wave task per event. Waves are not awaited
// by the loop, so a trigger that arrives while a wave is running reaches the
// coordinator, finds the guard taken, and is dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use inkwerk_core::error::{InkwerkError, Result};
use inkwerk_core::types::PrinterId;

use crate::coordinator::{SyncCoordinator, WaveOutcome};

/// Events capacity before publishers wait.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A change worth synchronising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The master switched its active message.
    SelectionChanged { master_id: PrinterId, name: String },
    /// The master gained messages.
    MessageListChanged {
        master_id: PrinterId,
        added_names: Vec<String>,
    },
    /// Operator asked for a complete resync of one master.
    FullSyncRequested { master_id: PrinterId },
}

/// Cloneable sender side of the event channel.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<SyncEvent>,
}

impl EventPublisher {
    pub async fn publish(&self, event: SyncEvent) -> Result<()> {
        debug!(?event, "publishing sync event");
        self.tx
            .send(event)
            .await
            .map_err(|_| InkwerkError::ChannelClosed)
    }
}

/// Handle for a running control loop.
pub struct SyncHandle {
    publisher: EventPublisher,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    pub async fn publish(&self, event: SyncEvent) -> Result<()> {
        self.publisher.publish(event).await
    }

    /// Stop accepting events and wait for waves already in flight.
    ///
    /// Other `EventPublisher` clones keep the loop alive until they are
    /// dropped too.
    pub async fn shutdown(self) {
        drop(self.publisher);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "sync control loop panicked");
        }
    }
}

/// The sync control loop.
pub struct SyncService;

impl SyncService {
    /// Start the loop on the current runtime.
    pub fn spawn(coordinator: Arc<SyncCoordinator>) -> SyncHandle {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = tokio::spawn(control_loop(coordinator, rx));
        SyncHandle {
            publisher: EventPublisher { tx },
            task,
        }
    }
}

async fn control_loop(coordinator: Arc<SyncCoordinator>, mut rx: mpsc::Receiver<SyncEvent>) {
    info!(strategy = ?coordinator.guard_strategy(), "sync control loop started");
    let mut waves: JoinSet<WaveOutcome> = JoinSet::new();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let coordinator = Arc::clone(&coordinator);
                waves.spawn(async move { coordinator.handle(event).await });
            }
            Some(done) = waves.join_next(), if !waves.is_empty() => {
                if let Err(e) = done {
                    tracing::error!(error = %e, "sync wave task failed");
                }
            }
        }
    }

    // No cancellation: waves already dispatched run to completion.
    while let Some(done) = waves.join_next().await {
        if let Err(e) = done {
            tracing::error!(error = %e, "sync wave task failed");
        }
    }
    info!("sync control loop stopped");
}
