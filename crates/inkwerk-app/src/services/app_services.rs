// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — builds the transport, registry and sync engine from
// the configuration and exposes the operations the console needs.
//
// The journal connection is `Send` but not `Sync`, so it sits behind a
// `Mutex`; every journal operation is a single short SQLite statement.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use inkwerk_core::error::{InkwerkError, Result};
use inkwerk_core::types::{MasterState, Printer, PrinterId, PrinterRole};
use inkwerk_core::{AppConfig, TransportKind};
use inkwerk_link::emulator::{EmulatedPrinter, Emulator};
use inkwerk_link::registry::PrinterRegistry;
use inkwerk_link::source::{ChainedSource, LiveStateTable, MasterStateSource, PinnedSource};
use inkwerk_link::tcp::TcpTransport;
use inkwerk_link::transport::Transport;
use inkwerk_sync::journal::{self, DispatchJournal, JournalEntry};
use inkwerk_sync::{
    StateWatcher, SyncCoordinator, SyncEvent, SyncHandle, SyncService, WatcherHandle, WaveOutcome,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long shutdown waits for the journal to catch up.
const RECORDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct AppServices {
    config: AppConfig,
    data_dir: PathBuf,
    registry: PrinterRegistry,
    /// Present when running against the emulator.
    emulator: Option<Arc<Emulator>>,
    /// State reported by the locally connected printer.
    live: LiveStateTable,
    sources: Arc<ChainedSource>,
    coordinator: Arc<SyncCoordinator>,
    service: SyncHandle,
    watcher: WatcherHandle,
    journal: Option<Arc<Mutex<DispatchJournal>>>,
    recorder: Option<JoinHandle<()>>,
}

impl AppServices {
    /// Load configuration from `data_dir` and start the sync engine.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(data_dir: &Path) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising services");
        let config = load_config(data_dir);

        let registry = PrinterRegistry::from_printers(config.printers.clone());
        let live = LiveStateTable::new();

        let (transport, emulator, local): (
            Arc<dyn Transport>,
            Option<Arc<Emulator>>,
            Arc<dyn MasterStateSource>,
        ) = match config.transport {
            TransportKind::Emulator => {
                let emulator = Arc::new(Emulator::new());
                for printer in registry.all() {
                    let mut emulated = EmulatedPrinter::default();
                    emulated.session_limit = config.emulator_session_limit;
                    emulator.add_printer(printer.id, emulated);
                }
                let local = PinnedSource::new(config.local_printer, emulator.clone());
                (emulator.clone(), Some(emulator), Arc::new(local))
            }
            TransportKind::Network => {
                let transport = TcpTransport::new(
                    Duration::from_secs(config.connect_timeout_secs),
                    Duration::from_secs(config.command_timeout_secs),
                );
                let local = PinnedSource::new(config.local_printer, Arc::new(live.clone()));
                (Arc::new(transport), None, Arc::new(local))
            }
        };

        let mut chain = ChainedSource::new().with(Arc::new(live.clone()));
        if let Some(emulator) = &emulator {
            chain = chain.with(emulator.clone());
        }
        let sources = Arc::new(chain);

        let coordinator = Arc::new(
            SyncCoordinator::new(registry.clone(), transport, local)
                .with_sources(sources.clone())
                .with_guard_strategy(config.guard_strategy),
        );

        let (journal, recorder) = if config.journal_enabled {
            let journal = Arc::new(Mutex::new(DispatchJournal::open(
                data_dir.join(journal::JOURNAL_FILE),
            )?));
            let recorder = journal::spawn_recorder(journal.clone(), coordinator.subscribe());
            (Some(journal), Some(recorder))
        } else {
            (None, None)
        };

        let service = SyncService::spawn(coordinator.clone());
        let watcher = StateWatcher::new(
            coordinator.clone(),
            sources.clone(),
            service.publisher(),
            Duration::from_millis(config.poll_interval_ms),
        )
        .spawn();

        info!(
            transport = ?config.transport,
            printers = registry.all().len(),
            guard = ?config.guard_strategy,
            "services started"
        );

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            registry,
            emulator,
            live,
            sources,
            coordinator,
            service,
            watcher,
            journal,
            recorder,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // -- Master-side edits ---------------------------------------------------

    /// Record a new message on a master, as if created on its panel.
    pub fn add_message(&self, master: PrinterId, name: &str) -> Result<()> {
        match &self.emulator {
            Some(emulator) => emulator.add_message(master, name),
            None => {
                self.live.add_message(master, name);
                Ok(())
            }
        }
    }

    /// Change a master's active message, as if selected on its panel.
    pub fn select_message(&self, master: PrinterId, name: &str) -> Result<()> {
        match &self.emulator {
            Some(emulator) => emulator.select_message(master, name),
            None => {
                self.live.select(master, name);
                Ok(())
            }
        }
    }

    pub fn master_state(&self, printer: PrinterId) -> Option<MasterState> {
        self.sources.master_state(printer)
    }

    // -- Sync ----------------------------------------------------------------

    /// Queue a full resync of the locally connected master.
    pub async fn request_full_sync(&self) -> Result<PrinterId> {
        let master_id = self
            .config
            .local_printer
            .ok_or_else(|| InkwerkError::Config("no local printer configured".into()))?;
        self.service
            .publish(SyncEvent::FullSyncRequested { master_id })
            .await?;
        Ok(master_id)
    }

    /// Resync any master right away and report what happened.
    pub async fn sync_master(&self, master: PrinterId) -> WaveOutcome {
        self.coordinator.sync_specific_master(master).await
    }

    // -- Registry ------------------------------------------------------------

    pub fn printers(&self) -> Vec<Printer> {
        self.registry.all()
    }

    pub fn set_role(
        &self,
        printer: PrinterId,
        role: PrinterRole,
        master: Option<PrinterId>,
    ) -> Result<()> {
        self.registry.set_role(printer, role, master)
    }

    pub fn set_available(&self, printer: PrinterId, available: bool) -> Result<()> {
        self.registry.set_available(printer, available)
    }

    /// Take an emulated printer on or off the network.
    pub fn set_online(&self, printer: PrinterId, online: bool) -> Result<()> {
        match &self.emulator {
            Some(emulator) => emulator.set_online(printer, online),
            None => Err(InkwerkError::Config(
                "online toggling needs the emulator transport".into(),
            )),
        }
    }

    // -- Journal -------------------------------------------------------------

    fn query_journal(
        &self,
        query: impl FnOnce(&DispatchJournal) -> Result<Vec<JournalEntry>>,
    ) -> Result<Vec<JournalEntry>> {
        match &self.journal {
            Some(journal) => query(&journal.lock().unwrap_or_else(|e| e.into_inner())),
            None => Ok(Vec::new()),
        }
    }

    /// Newest first.
    pub fn recent_dispatches(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        self.query_journal(|j| j.recent(limit))
    }

    /// Everything sent on behalf of `master`, oldest first.
    pub fn dispatches_for_master(&self, master: PrinterId) -> Result<Vec<JournalEntry>> {
        self.query_journal(|j| j.for_master(master))
    }

    /// Commands `slave` missed, oldest first.
    pub fn failed_dispatches(&self, slave: PrinterId) -> Result<Vec<JournalEntry>> {
        self.query_journal(|j| j.failures_for(slave))
    }

    /// Stop watching, let in-flight waves finish, then flush the journal.
    pub async fn shutdown(self) {
        self.watcher.stop().await;
        self.service.shutdown().await;

        // The coordinator owns the record sender; dropping the last handle
        // closes the channel and lets the recorder drain.
        drop(self.coordinator);
        if let Some(recorder) = self.recorder {
            if tokio::time::timeout(RECORDER_DRAIN_TIMEOUT, recorder)
                .await
                .is_err()
            {
                warn!("dispatch journal did not drain before shutdown");
            }
        }
        info!("services stopped");
    }
}

/// Load `config.json`, writing defaults on first run.
fn load_config(data_dir: &Path) -> AppConfig {
    match AppConfig::load(data_dir) {
        Ok(Some(config)) => config,
        Ok(None) => {
            let config = AppConfig::default();
            if let Err(e) = config.save(data_dir) {
                warn!(error = %e, "could not write default configuration");
            }
            config
        }
        Err(e) => {
            warn!(error = %e, "configuration unreadable, using defaults");
            AppConfig::default()
        }
    }
}
