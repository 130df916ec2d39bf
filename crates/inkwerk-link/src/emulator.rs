// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process printer emulator.
//
// Emulates a line of CIJ printers closely enough to exercise synchronisation
// without hardware: each printer has a message catalogue, an active
// selection, an online flag and a session ceiling. `^NM` and `^SM` are
// applied idempotently, the same way the devices treat them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use inkwerk_core::command::{Command, ERROR_RESPONSE_PREFIX};
use inkwerk_core::error::{InkwerkError, Result};
use inkwerk_core::types::{MasterState, MessageRef, PrinterEndpoint, PrinterId};

use crate::source::MasterStateSource;
use crate::transport::Transport;

/// Sessions a printer accepts at once unless configured otherwise.
pub const DEFAULT_SESSION_LIMIT: usize = 4;

/// Response to an accepted command.
const OK_RESPONSE: &str = "^OK";

/// State of one emulated printer.
#[derive(Debug, Clone)]
pub struct EmulatedPrinter {
    pub messages: Vec<MessageRef>,
    pub selection: Option<String>,
    pub online: bool,
    pub session_limit: usize,
    open_sessions: usize,
    peak_sessions: usize,
    command_log: Vec<Command>,
}

impl Default for EmulatedPrinter {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            selection: None,
            online: true,
            session_limit: DEFAULT_SESSION_LIMIT,
            open_sessions: 0,
            peak_sessions: 0,
            command_log: Vec::new(),
        }
    }
}

impl EmulatedPrinter {
    /// A printer preloaded with `names`, selecting `selection`.
    pub fn with_messages<I, S>(names: I, selection: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = MasterState::from_names(names, selection);
        Self {
            messages: state.messages,
            selection: state.selection,
            ..Self::default()
        }
    }

    fn register(&mut self, name: &str) -> bool {
        if self.messages.iter().any(|m| m.name == name) {
            return false;
        }
        let next_id = self.messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        self.messages.push(MessageRef::new(next_id, name));
        true
    }
}

#[derive(Default)]
struct EmulatorState {
    printers: HashMap<PrinterId, EmulatedPrinter>,
    /// Every accepted command across all printers, in acceptance order.
    journal: Vec<(PrinterId, Command)>,
}

/// Emulated printer line implementing [`Transport`] and
/// [`MasterStateSource`].
///
/// Locks are held only for bookkeeping, never across an await.
pub struct Emulator {
    state: Mutex<EmulatorState>,
    /// Simulated time for one command round trip.
    latency: Duration,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EmulatorState::default()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every command by `latency`, so that waves stay in flight long
    /// enough to observe overlapping triggers.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, EmulatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_printer<T>(&self, id: PrinterId, f: impl FnOnce(&mut EmulatedPrinter) -> T) -> Option<T> {
        self.lock().printers.get_mut(&id).map(f)
    }

    pub fn add_printer(&self, id: PrinterId, printer: EmulatedPrinter) {
        info!(printer = %id, messages = printer.messages.len(), "emulated printer added");
        self.lock().printers.insert(id, printer);
    }

    /// Create a message on a printer from its own panel (master-side edit).
    pub fn add_message(&self, id: PrinterId, name: &str) -> Result<()> {
        self.with_printer(id, |p| {
            p.register(name);
        })
        .ok_or(InkwerkError::UnknownPrinter(id))
    }

    /// Change the active message from the printer's own panel.
    pub fn select_message(&self, id: PrinterId, name: &str) -> Result<()> {
        self.with_printer(id, |p| {
            p.selection = Some(name.to_string());
        })
        .ok_or(InkwerkError::UnknownPrinter(id))
    }

    pub fn set_online(&self, id: PrinterId, online: bool) -> Result<()> {
        self.with_printer(id, |p| p.online = online)
            .ok_or(InkwerkError::UnknownPrinter(id))
    }

    pub fn messages(&self, id: PrinterId) -> Option<Vec<String>> {
        self.with_printer(id, |p| p.messages.iter().map(|m| m.name.clone()).collect())
    }

    pub fn selection(&self, id: PrinterId) -> Option<String> {
        self.with_printer(id, |p| p.selection.clone()).flatten()
    }

    pub fn open_sessions(&self, id: PrinterId) -> Option<usize> {
        self.with_printer(id, |p| p.open_sessions)
    }

    /// Highest number of simultaneously open sessions seen on the printer.
    pub fn peak_sessions(&self, id: PrinterId) -> Option<usize> {
        self.with_printer(id, |p| p.peak_sessions)
    }

    /// Commands accepted by one printer, in order.
    pub fn command_log(&self, id: PrinterId) -> Vec<Command> {
        self.with_printer(id, |p| p.command_log.clone())
            .unwrap_or_default()
    }

    /// Commands accepted by all printers, in acceptance order.
    pub fn journal(&self) -> Vec<(PrinterId, Command)> {
        self.lock().journal.clone()
    }

    pub fn clear_logs(&self) {
        let mut state = self.lock();
        state.journal.clear();
        for printer in state.printers.values_mut() {
            printer.command_log.clear();
        }
    }
}

#[async_trait]
impl Transport for Emulator {
    fn name(&self) -> &str {
        "emulator"
    }

    async fn connect(&self, printer: &PrinterEndpoint) -> Result<()> {
        let mut state = self.lock();
        let emulated = state
            .printers
            .get_mut(&printer.id)
            .ok_or_else(|| InkwerkError::Connect {
                printer: printer.id,
                detail: format!("no emulated printer at {}", printer.socket_addr()),
            })?;

        if !emulated.online {
            return Err(InkwerkError::Connect {
                printer: printer.id,
                detail: "printer offline".into(),
            });
        }
        if emulated.open_sessions >= emulated.session_limit {
            warn!(printer = %printer.id, limit = emulated.session_limit, "session limit reached");
            return Err(InkwerkError::SessionLimit(printer.id));
        }

        emulated.open_sessions += 1;
        emulated.peak_sessions = emulated.peak_sessions.max(emulated.open_sessions);
        Ok(())
    }

    async fn send_command(&self, printer_id: PrinterId, command: &str) -> Result<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.lock();
        let emulated = state
            .printers
            .get_mut(&printer_id)
            .ok_or(InkwerkError::NotConnected(printer_id))?;

        if emulated.open_sessions == 0 {
            return Err(InkwerkError::NotConnected(printer_id));
        }
        if !emulated.online {
            return Err(InkwerkError::Connect {
                printer: printer_id,
                detail: "printer went offline".into(),
            });
        }

        let Some(parsed) = Command::parse(command) else {
            return Err(InkwerkError::Command {
                printer: printer_id,
                detail: format!("{ERROR_RESPONSE_PREFIX} unknown command"),
            });
        };

        match &parsed {
            Command::AnnounceMessage(name) => {
                let added = emulated.register(name);
                debug!(printer = %printer_id, name = %name, added, "announce");
            }
            Command::SelectMessage(name) => {
                emulated.selection = Some(name.clone());
                debug!(printer = %printer_id, name = %name, "select");
            }
        }
        emulated.command_log.push(parsed.clone());
        state.journal.push((printer_id, parsed));
        Ok(OK_RESPONSE.to_string())
    }

    async fn disconnect(&self, printer_id: PrinterId) -> Result<()> {
        self.with_printer(printer_id, |p| {
            p.open_sessions = p.open_sessions.saturating_sub(1);
        });
        Ok(())
    }
}

impl MasterStateSource for Emulator {
    fn master_state(&self, master_id: PrinterId) -> Option<MasterState> {
        self.with_printer(master_id, |p| MasterState {
            messages: p.messages.clone(),
            selection: p.selection.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: u32) -> PrinterEndpoint {
        PrinterEndpoint {
            id: PrinterId(id),
            ip_address: "emu".into(),
            port: 0,
        }
    }

    #[tokio::test]
    async fn announce_is_idempotent() {
        let emu = Emulator::new();
        emu.add_printer(PrinterId(1), EmulatedPrinter::default());

        emu.connect(&endpoint(1)).await.unwrap();
        emu.send_command(PrinterId(1), "^NM A").await.unwrap();
        emu.send_command(PrinterId(1), "^NM A").await.unwrap();
        emu.disconnect(PrinterId(1)).await.unwrap();

        assert_eq!(emu.messages(PrinterId(1)).unwrap(), ["A"]);
        assert_eq!(emu.command_log(PrinterId(1)).len(), 2);
    }

    #[tokio::test]
    async fn session_limit_is_enforced() {
        let emu = Emulator::new();
        emu.add_printer(
            PrinterId(1),
            EmulatedPrinter {
                session_limit: 2,
                ..EmulatedPrinter::default()
            },
        );

        emu.connect(&endpoint(1)).await.unwrap();
        emu.connect(&endpoint(1)).await.unwrap();
        assert!(matches!(
            emu.connect(&endpoint(1)).await,
            Err(InkwerkError::SessionLimit(_))
        ));

        emu.disconnect(PrinterId(1)).await.unwrap();
        emu.connect(&endpoint(1)).await.unwrap();
        assert_eq!(emu.peak_sessions(PrinterId(1)), Some(2));
    }

    #[tokio::test]
    async fn offline_printer_refuses_sessions() {
        let emu = Emulator::new();
        emu.add_printer(PrinterId(1), EmulatedPrinter::default());
        emu.set_online(PrinterId(1), false).unwrap();

        let err = emu.connect(&endpoint(1)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn command_without_session_is_rejected() {
        let emu = Emulator::new();
        emu.add_printer(PrinterId(1), EmulatedPrinter::default());
        assert!(matches!(
            emu.send_command(PrinterId(1), "^SM A").await,
            Err(InkwerkError::NotConnected(_))
        ));
    }

    #[test]
    fn master_state_reflects_panel_edits() {
        let emu = Emulator::new();
        emu.add_printer(PrinterId(1), EmulatedPrinter::with_messages(["A"], Some("A")));
        emu.add_message(PrinterId(1), "B").unwrap();
        emu.add_message(PrinterId(1), "A").unwrap();
        emu.select_message(PrinterId(1), "B").unwrap();

        let state = emu.master_state(PrinterId(1)).unwrap();
        assert_eq!(state.names().collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(state.messages[1].id, 2);
        assert_eq!(state.selection.as_deref(), Some("B"));
        assert!(emu.master_state(PrinterId(7)).is_none());
    }

    #[test]
    fn panel_edit_on_unknown_printer_fails() {
        let emu = Emulator::new();
        assert!(matches!(
            emu.add_message(PrinterId(3), "A"),
            Err(InkwerkError::UnknownPrinter(PrinterId(3)))
        ));
    }
}
