// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inkwerk Link — printer sessions (TCP bridge or in-process emulator), the
// printer registry, and the sources a master's live state is read from.
// Synchronisation sits on top of this crate and never touches sockets itself.

pub mod emulator;
pub mod registry;
pub mod source;
pub mod tcp;
pub mod transport;

pub use emulator::{EmulatedPrinter, Emulator};
pub use registry::PrinterRegistry;
pub use source::{ChainedSource, LiveStateTable, MasterStateSource, PinnedSource};
pub use tcp::TcpTransport;
pub use transport::{Transport, send_once};
