// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer control commands used by synchronisation.
//
// Both commands are ASCII control strings. The device treats them as
// idempotent: re-announcing a known name or re-selecting the active message
// changes nothing.
//
//   ^SM <NAME>   select message <NAME> for printing
//   ^NM <NAME>   register message name <NAME>

use serde::{Deserialize, Serialize};

/// Wire prefix for the select-message command.
pub const SELECT_PREFIX: &str = "^SM";

/// Wire prefix for the announce (new message) command.
pub const ANNOUNCE_PREFIX: &str = "^NM";

/// Prefix a printer uses for an error response.
pub const ERROR_RESPONSE_PREFIX: &str = "^ER";

/// A synchronisation command addressed to a slave printer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Make `name` the slave's active print message.
    SelectMessage(String),
    /// Register `name` on the slave (name only, no field content).
    AnnounceMessage(String),
}

impl Command {
    /// Encode as the ASCII control string sent over the transport.
    pub fn to_wire(&self) -> String {
        match self {
            Self::SelectMessage(name) => format!("{SELECT_PREFIX} {name}"),
            Self::AnnounceMessage(name) => format!("{ANNOUNCE_PREFIX} {name}"),
        }
    }

    /// Decode a control string. Returns `None` for anything that is not a
    /// well-formed `^SM`/`^NM` command with a non-empty name.
    pub fn parse(wire: &str) -> Option<Self> {
        let wire = wire.trim_end_matches(['\r', '\n']);
        let (prefix, name) = wire.split_once(' ')?;
        if name.is_empty() {
            return None;
        }
        match prefix {
            SELECT_PREFIX => Some(Self::SelectMessage(name.to_string())),
            ANNOUNCE_PREFIX => Some(Self::AnnounceMessage(name.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}
