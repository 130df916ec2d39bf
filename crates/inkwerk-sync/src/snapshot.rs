// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-master snapshots of the last observed state.
//
// Memory only. Nothing here is persisted, so after a restart every master
// starts from a fresh baseline.

use std::collections::HashMap;
use std::sync::Mutex;

use inkwerk_core::types::{MasterState, PrinterId};

use crate::detector::{self, ChangeDelta, SyncSnapshot};

#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: Mutex<HashMap<PrinterId, SyncSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `live` against the stored snapshot and replace the snapshot with
    /// `live` in the same step.
    ///
    /// The snapshot moves to the latest state before anything is dispatched,
    /// so a burst of edits collapses into the newest value.
    pub fn observe(&self, master_id: PrinterId, live: &MasterState) -> ChangeDelta {
        let mut snapshots = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
        let delta = detector::detect(live, snapshots.get(&master_id));
        snapshots.insert(master_id, SyncSnapshot::from_state(live));
        delta
    }

    /// Drop a master's snapshot; its next observation is a new baseline.
    pub fn forget(&self, master_id: PrinterId) {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&master_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_observations_report_increments() {
        let store = SnapshotStore::new();
        let m = PrinterId(1);

        assert!(store.observe(m, &MasterState::from_names(["A"], None)).is_empty());

        let second = store.observe(m, &MasterState::from_names(["A", "B"], None));
        assert_eq!(second.added_names, ["B"]);

        let third = store.observe(m, &MasterState::from_names(["A", "B", "C"], None));
        assert_eq!(third.added_names, ["C"]);
    }

    #[test]
    fn forget_resets_baseline() {
        let store = SnapshotStore::new();
        let m = PrinterId(1);
        store.observe(m, &MasterState::from_names(["A"], None));
        store.forget(m);

        assert!(store.observe(m, &MasterState::from_names(["A", "B"], Some("B"))).is_empty());
    }

    #[test]
    fn masters_are_tracked_independently() {
        let store = SnapshotStore::new();
        store.observe(PrinterId(1), &MasterState::from_names(["A"], None));
        store.observe(PrinterId(4), &MasterState::from_names(["Z"], None));

        let delta = store.observe(PrinterId(4), &MasterState::from_names(["Z", "A"], None));
        assert_eq!(delta.added_names, ["A"]);
    }
}
