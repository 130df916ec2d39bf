// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Change detection between a master's live state and its last snapshot.
//
// The first observation of a master only establishes the baseline: nothing
// it already holds is reported, so a restart does not flood the slaves with
// the master's whole catalogue. Removed names are never reported; slaves keep
// every name they were ever sent.

use std::collections::HashSet;

use inkwerk_core::types::MasterState;

/// What the coordinator last saw of a master.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub message_names: HashSet<String>,
    pub selection: Option<String>,
}

impl SyncSnapshot {
    pub fn from_state(state: &MasterState) -> Self {
        Self {
            message_names: state.names().map(str::to_string).collect(),
            selection: state.selection.clone(),
        }
    }
}

/// Difference between a live state and the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeDelta {
    /// Names present now but not before, in the master's listing order.
    pub added_names: Vec<String>,
    /// The new active selection, when it changed to a non-empty value.
    pub new_selection: Option<String>,
}

impl ChangeDelta {
    pub fn is_empty(&self) -> bool {
        self.added_names.is_empty() && self.new_selection.is_none()
    }

    pub fn selection_changed(&self) -> bool {
        self.new_selection.is_some()
    }
}

/// Compute the delta of `live` against `previous`.
///
/// Pure: the snapshot is not touched. `previous = None` means the master has
/// not been observed yet and always yields an empty delta.
pub fn detect(live: &MasterState, previous: Option<&SyncSnapshot>) -> ChangeDelta {
    let Some(previous) = previous else {
        return ChangeDelta::default();
    };

    let mut seen = HashSet::new();
    let added_names = live
        .names()
        .filter(|name| !previous.message_names.contains(*name))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect();

    let new_selection = match &live.selection {
        Some(current) if previous.selection.as_ref() != Some(current) => Some(current.clone()),
        _ => None,
    };

    ChangeDelta {
        added_names,
        new_selection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(names: &[&str], selection: Option<&str>) -> MasterState {
        MasterState::from_names(names.iter().copied(), selection)
    }

    #[test]
    fn first_observation_is_baseline_only() {
        let delta = detect(&state(&["A", "B"], Some("A")), None);
        assert!(delta.is_empty());
        assert!(!delta.selection_changed());
    }

    #[test]
    fn reports_only_new_names_in_listing_order() {
        let before = SyncSnapshot::from_state(&state(&["A", "B"], None));
        let delta = detect(&state(&["D", "A", "C", "B"], None), Some(&before));
        assert_eq!(delta.added_names, ["D", "C"]);
        assert!(!delta.selection_changed());
    }

    #[test]
    fn duplicate_listing_reports_name_once() {
        let before = SyncSnapshot::default();
        let delta = detect(&state(&["X", "X"], None), Some(&before));
        assert_eq!(delta.added_names, ["X"]);
    }

    #[test]
    fn selection_change_to_value() {
        let before = SyncSnapshot::from_state(&state(&["A", "B"], Some("A")));
        let delta = detect(&state(&["A", "B"], Some("B")), Some(&before));
        assert_eq!(delta.new_selection.as_deref(), Some("B"));
        assert!(delta.added_names.is_empty());
    }

    #[test]
    fn clearing_selection_is_not_a_change() {
        let before = SyncSnapshot::from_state(&state(&["A"], Some("A")));
        let delta = detect(&state(&["A"], None), Some(&before));
        assert!(delta.is_empty());
    }

    #[test]
    fn removed_names_are_not_reported() {
        let before = SyncSnapshot::from_state(&state(&["A", "B"], Some("A")));
        let delta = detect(&state(&["A"], Some("A")), Some(&before));
        assert!(delta.is_empty());
    }

    #[test]
    fn unchanged_state_is_empty() {
        let live = state(&["A", "B"], Some("B"));
        let before = SyncSnapshot::from_state(&live);
        assert!(detect(&live, Some(&before)).is_empty());
    }
}
