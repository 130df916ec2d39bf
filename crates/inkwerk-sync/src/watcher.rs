// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Polls master state and publishes the changes it finds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use inkwerk_core::error::Result;
use inkwerk_link::source::MasterStateSource;

use crate::coordinator::SyncCoordinator;
use crate::events::EventPublisher;

/// Periodically reads every registered master and turns state changes into
/// sync events.
pub struct StateWatcher {
    coordinator: Arc<SyncCoordinator>,
    source: Arc<dyn MasterStateSource>,
    publisher: EventPublisher,
    interval: Duration,
}

/// Stops a spawned watcher.
pub struct WatcherHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "state watcher panicked");
        }
    }
}

impl StateWatcher {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        source: Arc<dyn MasterStateSource>,
        publisher: EventPublisher,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            source,
            publisher,
            interval,
        }
    }

    /// Observe every master once and publish the resulting events.
    ///
    /// Returns the number of events published.
    pub async fn poll_once(&self) -> Result<usize> {
        let mut published = 0;
        for master in self.coordinator.registry().masters() {
            let Some(state) = self.source.master_state(master.id) else {
                continue;
            };
            for event in self.coordinator.observe(master.id, &state) {
                self.publisher.publish(event).await?;
                published += 1;
            }
        }
        if published > 0 {
            debug!(published, "state changes published");
        }
        Ok(published)
    }

    /// Run `poll_once` every interval until stopped.
    pub fn spawn(self) -> WatcherHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = self.interval.as_millis() as u64, "state watcher started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.poll_once().await {
                            warn!(error = %e, "state watcher stopping");
                            break;
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
            info!("state watcher stopped");
        });
        WatcherHandle { stop, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwerk_core::command::Command;
    use inkwerk_core::types::{Printer, PrinterId};
    use inkwerk_link::emulator::{EmulatedPrinter, Emulator};
    use inkwerk_link::registry::PrinterRegistry;

    use crate::events::SyncService;

    const M: PrinterId = PrinterId(1);
    const S: PrinterId = PrinterId(2);

    fn setup() -> (Arc<Emulator>, Arc<SyncCoordinator>) {
        let emulator = Arc::new(Emulator::new());
        emulator.add_printer(M, EmulatedPrinter::with_messages(["A"], Some("A")));
        emulator.add_printer(S, EmulatedPrinter::default());
        let registry = PrinterRegistry::from_printers([
            Printer::new(M, "10.0.0.1", 3100).as_master(),
            Printer::new(S, "10.0.0.2", 3100).as_slave_of(M),
        ]);
        let coordinator = Arc::new(SyncCoordinator::new(
            registry,
            emulator.clone(),
            emulator.clone(),
        ));
        (emulator, coordinator)
    }

    #[tokio::test]
    async fn first_poll_is_silent_then_changes_flow_to_slave() {
        let (emulator, coordinator) = setup();
        let service = SyncService::spawn(coordinator.clone());
        let watcher = StateWatcher::new(
            coordinator,
            emulator.clone(),
            service.publisher(),
            Duration::from_millis(10),
        );

        assert_eq!(watcher.poll_once().await.unwrap(), 0);

        emulator.add_message(M, "B").unwrap();
        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        assert_eq!(watcher.poll_once().await.unwrap(), 0);

        drop(watcher);
        service.shutdown().await;

        assert_eq!(
            emulator.command_log(S),
            [Command::AnnounceMessage("B".into())]
        );
    }

    #[tokio::test]
    async fn spawned_watcher_picks_up_selection() {
        let (emulator, coordinator) = setup();
        let service = SyncService::spawn(coordinator.clone());
        let handle = StateWatcher::new(
            coordinator,
            emulator.clone(),
            service.publisher(),
            Duration::from_millis(5),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(30)).await;
        emulator.select_message(M, "A2").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        handle.stop().await;
        service.shutdown().await;

        assert_eq!(emulator.selection(S).as_deref(), Some("A2"));
    }
}
