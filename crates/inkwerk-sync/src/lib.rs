// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inkwerk Sync — keeps slave printers' message names and active selection in
// step with their master.  Changes are detected against a per-master snapshot,
// published as events, and fanned out to the slaves in waves, one printer
// session per command.

pub mod coordinator;
pub mod detector;
pub mod events;
pub mod guard;
pub mod journal;
pub mod snapshot;
pub mod watcher;

pub use coordinator::{SyncCoordinator, WaveOutcome};
pub use detector::{ChangeDelta, SyncSnapshot, detect};
pub use events::{EventPublisher, SyncEvent, SyncHandle, SyncService};
pub use journal::DispatchJournal;
pub use watcher::{StateWatcher, WatcherHandle};
