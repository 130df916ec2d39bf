// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InkwerkError, Result};
use crate::types::{Printer, PrinterId};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Which transport carries commands to the printers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process printer emulator (no hardware needed).
    #[default]
    Emulator,
    /// TCP bridge to real printers.
    Network,
}

/// Scope of the in-flight guard that drops triggers during a sync wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardStrategy {
    /// One flag for the whole coordinator: a wave for any master blocks
    /// triggers for every master.
    #[default]
    Global,
    /// One flag per master id: unrelated masters never block each other.
    PerMaster,
}

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Transport used for printer sessions.
    pub transport: TransportKind,
    /// Scope of the sync in-flight guard.
    pub guard_strategy: GuardStrategy,
    /// How often the state watcher reads master state, in milliseconds.
    pub poll_interval_ms: u64,
    /// Timeout for opening a printer session (network transport).
    pub connect_timeout_secs: u64,
    /// Timeout for one command round trip (network transport).
    pub command_timeout_secs: u64,
    /// Concurrent sessions each emulated printer accepts.
    pub emulator_session_limit: usize,
    /// Record every dispatched command in the SQLite journal.
    pub journal_enabled: bool,
    /// Printer registry seed.
    pub printers: Vec<Printer>,
    /// The printer this station is connected to, if any.
    pub local_printer: Option<PrinterId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Emulator,
            guard_strategy: GuardStrategy::Global,
            poll_interval_ms: 500,
            connect_timeout_secs: 5,
            command_timeout_secs: 5,
            emulator_session_limit: 4,
            journal_enabled: true,
            printers: Vec::new(),
            local_printer: None,
        }
    }
}

impl AppConfig {
    /// Load `config.json` from `data_dir`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.check()?;
        Ok(Some(config))
    }

    /// Write the configuration as pretty JSON into `data_dir`.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// Reject values the runtime cannot work with.
    pub fn check(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(InkwerkError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.emulator_session_limit == 0 {
            return Err(InkwerkError::Config(
                "emulator_session_limit must be > 0".into(),
            ));
        }
        Ok(())
    }
}
