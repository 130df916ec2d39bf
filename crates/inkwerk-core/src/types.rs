// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Inkwerk synchronisation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a printer in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrinterId(pub u32);

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PrinterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Role a printer plays in master/slave synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterRole {
    /// Standalone printer, not part of any sync group.
    #[default]
    None,
    /// Source of truth for its slaves' messages and selection.
    Master,
    /// Mirrors the printer referenced by `master_id`.
    Slave,
}

impl std::fmt::Display for PrinterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Master => "master",
            Self::Slave => "slave",
        })
    }
}

impl std::str::FromStr for PrinterRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "master" => Ok(Self::Master),
            "slave" => Ok(Self::Slave),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A printer as recorded in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    #[serde(default)]
    pub role: PrinterRole,
    /// Only meaningful when `role` is `Slave`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_id: Option<PrinterId>,
    pub ip_address: String,
    pub port: u16,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl Printer {
    pub fn new(id: PrinterId, ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            role: PrinterRole::None,
            master_id: None,
            ip_address: ip_address.into(),
            port,
            is_available: true,
        }
    }

    pub fn as_master(mut self) -> Self {
        self.role = PrinterRole::Master;
        self.master_id = None;
        self
    }

    pub fn as_slave_of(mut self, master_id: PrinterId) -> Self {
        self.role = PrinterRole::Slave;
        self.master_id = Some(master_id);
        self
    }

    pub fn available(mut self, is_available: bool) -> Self {
        self.is_available = is_available;
        self
    }

    /// The addressing subset handed to a transport on connect.
    pub fn endpoint(&self) -> PrinterEndpoint {
        PrinterEndpoint {
            id: self.id,
            ip_address: self.ip_address.clone(),
            port: self.port,
        }
    }
}

/// Where to reach a printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterEndpoint {
    pub id: PrinterId,
    pub ip_address: String,
    pub port: u16,
}

impl PrinterEndpoint {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

/// A message stored on a printer. Only the name is synchronised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: u32,
    pub name: String,
}

impl MessageRef {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A master's live message catalogue and active selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterState {
    pub messages: Vec<MessageRef>,
    pub selection: Option<String>,
}

impl MasterState {
    /// Build a state from bare names, numbering messages from 1.
    pub fn from_names<I, S>(names: I, selection: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| MessageRef::new(i as u32 + 1, name))
            .collect();
        Self {
            messages,
            selection: selection.map(str::to_string),
        }
    }

    /// Message names in the order the master lists them.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.name.as_str())
    }
}

/// Identifier for one sync wave (one dispatch triggered by one change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveId(pub Uuid);

impl WaveId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WaveId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WaveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The result of one command attempt against one slave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub wave: WaveId,
    pub master_id: PrinterId,
    pub slave_id: PrinterId,
    /// Wire form of the command, e.g. `^NM LOT42`.
    pub command: String,
    pub success: bool,
    /// Printer response on success, error text on failure.
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_serde_defaults() {
        let json = r#"{"id": 7, "ip_address": "10.0.0.7", "port": 3100}"#;
        let printer: Printer = serde_json::from_str(json).unwrap();
        assert_eq!(printer.role, PrinterRole::None);
        assert_eq!(printer.master_id, None);
        assert!(printer.is_available);

        let json = r#"{"id": 8, "ip_address": "10.0.0.8", "port": 3100, "is_available": false}"#;
        let printer: Printer = serde_json::from_str(json).unwrap();
        assert!(!printer.is_available);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Master".parse::<PrinterRole>().unwrap(), PrinterRole::Master);
        assert_eq!("slave".parse::<PrinterRole>().unwrap(), PrinterRole::Slave);
        assert!("boss".parse::<PrinterRole>().is_err());
    }

    #[test]
    fn master_state_from_names_keeps_order() {
        let state = MasterState::from_names(["B", "A", "C"], Some("A"));
        let names: Vec<&str> = state.names().collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert_eq!(state.messages[2].id, 3);
        assert_eq!(state.selection.as_deref(), Some("A"));
    }

    #[test]
    fn builder_helpers_enforce_master_shape() {
        let p = Printer::new(PrinterId(1), "127.0.0.1", 3100)
            .as_slave_of(PrinterId(2))
            .as_master();
        assert_eq!(p.role, PrinterRole::Master);
        assert_eq!(p.master_id, None);
    }
}
