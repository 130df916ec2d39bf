// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inkwerk — Core types, commands and error definitions shared across all crates.

pub mod command;
pub mod config;
pub mod error;
pub mod types;

pub use command::Command;
pub use config::{AppConfig, GuardStrategy, TransportKind};
pub use error::InkwerkError;
pub use types::*;
