// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-flight guard for sync waves.
//
// While a wave holds a permit, further triggers under the same key are
// dropped, not queued. With `GuardStrategy::Global` every master shares one
// key; with `GuardStrategy::PerMaster` each master has its own.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use inkwerk_core::config::GuardStrategy;
use inkwerk_core::types::PrinterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GuardKey {
    All,
    Master(PrinterId),
}

type BusySet = Arc<Mutex<HashSet<GuardKey>>>;

#[derive(Debug)]
pub struct WaveGuard {
    strategy: GuardStrategy,
    busy: BusySet,
}

/// Proof that a wave is running. Dropping it returns the guard to idle.
#[derive(Debug)]
pub struct WavePermit {
    key: GuardKey,
    busy: BusySet,
}

impl Drop for WavePermit {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

impl WaveGuard {
    pub fn new(strategy: GuardStrategy) -> Self {
        Self {
            strategy,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn strategy(&self) -> GuardStrategy {
        self.strategy
    }

    fn key(&self, master_id: PrinterId) -> GuardKey {
        match self.strategy {
            GuardStrategy::Global => GuardKey::All,
            GuardStrategy::PerMaster => GuardKey::Master(master_id),
        }
    }

    /// Start a wave for `master_id`, or `None` if one is already in flight
    /// under the same key.
    pub fn try_begin(&self, master_id: PrinterId) -> Option<WavePermit> {
        let key = self.key(master_id);
        let inserted = self
            .busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key);
        inserted.then(|| WavePermit {
            key,
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self, master_id: PrinterId) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&self.key(master_id))
    }
}

impl Default for WaveGuard {
    fn default() -> Self {
        Self::new(GuardStrategy::default())
    }
}
