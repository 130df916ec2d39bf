// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry: roles, master links and availability.
//
// Synchronisation only reads the registry. Roles can be reassigned at any
// time, so resolution always reads the current records and never caches a
// slave set across waves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use inkwerk_core::error::{InkwerkError, Result};
use inkwerk_core::types::{Printer, PrinterId, PrinterRole};

/// A registry record that breaks the role invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleViolation {
    pub printer: PrinterId,
    pub reason: String,
}

/// Thread-safe, cheaply cloneable printer registry.
#[derive(Debug, Clone, Default)]
pub struct PrinterRegistry {
    printers: Arc<RwLock<HashMap<PrinterId, Printer>>>,
}

impl PrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured records. Inconsistent records are
    /// kept (and logged); resolution excludes them.
    pub fn from_printers(printers: impl IntoIterator<Item = Printer>) -> Self {
        let registry = Self::new();
        for printer in printers {
            registry.upsert(printer);
        }
        for violation in registry.validate() {
            warn!(printer = %violation.printer, reason = %violation.reason, "registry inconsistency");
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PrinterId, Printer>> {
        self.printers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PrinterId, Printer>> {
        self.printers.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert(&self, printer: Printer) {
        debug!(printer = %printer.id, role = ?printer.role, "registry upsert");
        self.write().insert(printer.id, printer);
    }

    pub fn remove(&self, id: PrinterId) -> Option<Printer> {
        self.write().remove(&id)
    }

    pub fn get(&self, id: PrinterId) -> Option<Printer> {
        self.read().get(&id).cloned()
    }

    /// All printers ordered by id.
    pub fn all(&self) -> Vec<Printer> {
        let mut printers: Vec<Printer> = self.read().values().cloned().collect();
        printers.sort_by_key(|p| p.id);
        printers
    }

    /// Printers currently holding the master role, ordered by id.
    pub fn masters(&self) -> Vec<Printer> {
        self.all()
            .into_iter()
            .filter(|p| p.role == PrinterRole::Master)
            .collect()
    }

    /// Reassign a printer's role.
    ///
    /// `master_id` is required for `Slave` and must name a current master
    /// other than the printer itself; it is ignored for other roles. Demoting
    /// a master leaves its former slaves dangling; resolution skips them
    /// until they are reassigned.
    pub fn set_role(
        &self,
        id: PrinterId,
        role: PrinterRole,
        master_id: Option<PrinterId>,
    ) -> Result<()> {
        let mut printers = self.write();

        let invalid = |reason: &str| InkwerkError::InvalidRole {
            printer: id,
            role,
            reason: reason.to_string(),
        };

        if !printers.contains_key(&id) {
            return Err(InkwerkError::UnknownPrinter(id));
        }

        let master_id = match role {
            PrinterRole::Slave => {
                let master_id = master_id.ok_or_else(|| invalid("a slave needs a master"))?;
                if master_id == id {
                    return Err(invalid("a printer cannot be its own master"));
                }
                match printers.get(&master_id) {
                    Some(m) if m.role == PrinterRole::Master => Some(master_id),
                    Some(_) => return Err(invalid("referenced printer is not a master")),
                    None => return Err(InkwerkError::UnknownPrinter(master_id)),
                }
            }
            PrinterRole::Master | PrinterRole::None => None,
        };

        if let Some(printer) = printers.get_mut(&id) {
            printer.role = role;
            printer.master_id = master_id;
        }
        info!(printer = %id, role = ?role, master = ?master_id, "printer role changed");
        Ok(())
    }

    pub fn set_available(&self, id: PrinterId, is_available: bool) -> Result<()> {
        let mut printers = self.write();
        let printer = printers
            .get_mut(&id)
            .ok_or(InkwerkError::UnknownPrinter(id))?;
        if printer.is_available != is_available {
            info!(printer = %id, is_available, "printer availability changed");
        }
        printer.is_available = is_available;
        Ok(())
    }

    /// Slaves that should receive `master_id`'s sync commands right now.
    ///
    /// A printer qualifies when it is a slave of `master_id`, is available,
    /// is not `master_id` itself, and `master_id` currently is a master.
    /// Anything else (including a dangling master reference) resolves to an
    /// empty set, never an error.
    pub fn slaves_of(&self, master_id: PrinterId) -> Vec<Printer> {
        let printers = self.read();

        let master_ok = printers
            .get(&master_id)
            .is_some_and(|m| m.role == PrinterRole::Master);
        if !master_ok {
            return Vec::new();
        }

        let mut slaves: Vec<Printer> = printers
            .values()
            .filter(|p| {
                p.role == PrinterRole::Slave
                    && p.master_id == Some(master_id)
                    && p.id != master_id
                    && p.is_available
            })
            .cloned()
            .collect();
        slaves.sort_by_key(|p| p.id);
        slaves
    }

    /// Check every record against the role invariants.
    pub fn validate(&self) -> Vec<RoleViolation> {
        let printers = self.read();
        let mut violations = Vec::new();

        let mut ids: Vec<&PrinterId> = printers.keys().collect();
        ids.sort();

        for id in ids {
            let printer = &printers[id];
            let reason = match (printer.role, printer.master_id) {
                (PrinterRole::Slave, None) => Some("slave without a master".to_string()),
                (PrinterRole::Slave, Some(m)) if m == printer.id => {
                    Some("printer is its own master".to_string())
                }
                (PrinterRole::Slave, Some(m)) => match printers.get(&m) {
                    None => Some(format!("master {m} does not exist")),
                    Some(master) if master.role != PrinterRole::Master => {
                        Some(format!("printer {m} is not a master"))
                    }
                    Some(_) => None,
                },
                (PrinterRole::Master, Some(_)) => Some("master has a master_id".to_string()),
                _ => None,
            };
            if let Some(reason) = reason {
                violations.push(RoleViolation {
                    printer: printer.id,
                    reason,
                });
            }
        }
        violations
    }
}
