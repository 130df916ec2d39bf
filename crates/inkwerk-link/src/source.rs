// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where a master's live message catalogue comes from.
//
// The locally connected printer publishes its state into a `LiveStateTable`;
// emulated printers answer from the emulator. `ChainedSource` asks each in
// turn, which lets a sync be sourced from any master, connected or not.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use inkwerk_core::types::{MasterState, MessageRef, PrinterId};

/// Read access to a master's current messages and selection.
pub trait MasterStateSource: Send + Sync {
    /// Current state of `master_id`, or `None` if this source does not hold it.
    fn master_state(&self, master_id: PrinterId) -> Option<MasterState>;
}

/// State of printers this station holds a live connection to.
#[derive(Debug, Clone, Default)]
pub struct LiveStateTable {
    states: Arc<RwLock<HashMap<PrinterId, MasterState>>>,
}

impl LiveStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recorded state of a printer.
    pub fn update(&self, printer_id: PrinterId, state: MasterState) {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(printer_id, state);
    }

    /// Record a new message on a printer; known names are ignored.
    pub fn add_message(&self, printer_id: PrinterId, name: &str) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let state = states.entry(printer_id).or_default();
        if state.messages.iter().any(|m| m.name == name) {
            return;
        }
        let next_id = state.messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        state.messages.push(MessageRef::new(next_id, name));
    }

    pub fn select(&self, printer_id: PrinterId, name: &str) {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(printer_id)
            .or_default()
            .selection = Some(name.to_string());
    }

    /// Forget a printer, e.g. when its connection drops.
    pub fn remove(&self, printer_id: PrinterId) -> Option<MasterState> {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&printer_id)
    }
}

impl MasterStateSource for LiveStateTable {
    fn master_state(&self, master_id: PrinterId) -> Option<MasterState> {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&master_id)
            .cloned()
    }
}

/// Tries several sources in order and returns the first hit.
#[derive(Clone, Default)]
pub struct ChainedSource {
    sources: Vec<Arc<dyn MasterStateSource>>,
}

impl ChainedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn MasterStateSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl MasterStateSource for ChainedSource {
    fn master_state(&self, master_id: PrinterId) -> Option<MasterState> {
        self.sources
            .iter()
            .find_map(|source| source.master_state(master_id))
    }
}

/// Answers only for one printer, e.g. the one this station is cabled to.
pub struct PinnedSource {
    printer: Option<PrinterId>,
    inner: Arc<dyn MasterStateSource>,
}

impl PinnedSource {
    /// With `printer = None` the source answers for nobody.
    pub fn new(printer: Option<PrinterId>, inner: Arc<dyn MasterStateSource>) -> Self {
        Self { printer, inner }
    }
}

impl MasterStateSource for PinnedSource {
    fn master_state(&self, master_id: PrinterId) -> Option<MasterState> {
        if self.printer != Some(master_id) {
            return None;
        }
        self.inner.master_state(master_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::{EmulatedPrinter, Emulator};

    #[test]
    fn live_table_tracks_edits() {
        let table = LiveStateTable::new();
        table.add_message(PrinterId(1), "A");
        table.add_message(PrinterId(1), "B");
        table.add_message(PrinterId(1), "A");
        table.select(PrinterId(1), "B");

        let state = table.master_state(PrinterId(1)).unwrap();
        assert_eq!(state.names().collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(state.selection.as_deref(), Some("B"));

        table.remove(PrinterId(1));
        assert!(table.master_state(PrinterId(1)).is_none());
    }

    #[test]
    fn chain_prefers_live_connection() {
        let live = LiveStateTable::new();
        live.update(PrinterId(1), MasterState::from_names(["LIVE"], None));

        let emulator = Emulator::new();
        emulator.add_printer(PrinterId(1), EmulatedPrinter::with_messages(["EMU"], None));
        emulator.add_printer(PrinterId(4), EmulatedPrinter::with_messages(["OTHER"], None));

        let chain = ChainedSource::new()
            .with(Arc::new(live))
            .with(Arc::new(emulator));

        let first = chain.master_state(PrinterId(1)).unwrap();
        assert_eq!(first.names().collect::<Vec<_>>(), ["LIVE"]);
        let fallback = chain.master_state(PrinterId(4)).unwrap();
        assert_eq!(fallback.names().collect::<Vec<_>>(), ["OTHER"]);
        assert!(chain.master_state(PrinterId(9)).is_none());
    }

    #[test]
    fn pinned_source_hides_other_printers() {
        let emulator = Emulator::new();
        emulator.add_printer(PrinterId(1), EmulatedPrinter::with_messages(["A"], None));
        emulator.add_printer(PrinterId(5), EmulatedPrinter::with_messages(["B"], None));
        let emulator: Arc<dyn MasterStateSource> = Arc::new(emulator);

        let pinned = PinnedSource::new(Some(PrinterId(1)), emulator.clone());
        assert!(pinned.master_state(PrinterId(1)).is_some());
        assert!(pinned.master_state(PrinterId(5)).is_none());

        let unpinned = PinnedSource::new(None, emulator);
        assert!(unpinned.master_state(PrinterId(1)).is_none());
    }
}
