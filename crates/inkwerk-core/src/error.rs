// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Inkwerk.

use thiserror::Error;

use crate::types::{PrinterId, PrinterRole};

/// Top-level error type for all Inkwerk operations.
#[derive(Debug, Error)]
pub enum InkwerkError {
    // -- Transport errors --
    #[error("connection to printer {printer} failed: {detail}")]
    Connect { printer: PrinterId, detail: String },

    #[error("command to printer {printer} failed: {detail}")]
    Command { printer: PrinterId, detail: String },

    #[error("printer {0} has no free command session")]
    SessionLimit(PrinterId),

    #[error("printer {0} is not connected")]
    NotConnected(PrinterId),

    #[error("printer {printer} timed out after {secs}s")]
    Timeout { printer: PrinterId, secs: u64 },

    // -- Registry errors --
    #[error("unknown printer {0}")]
    UnknownPrinter(PrinterId),

    #[error("printer {printer} cannot take role {role:?}: {reason}")]
    InvalidRole {
        printer: PrinterId,
        role: PrinterRole,
        reason: String,
    },

    // -- Sync errors --
    #[error("sync control loop has stopped")]
    ChannelClosed,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl InkwerkError {
    /// Whether the failure is the kind an unreliable slave produces and a
    /// later sync is expected to get past (network, timeout, busy device).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. }
            | Self::SessionLimit(_)
            | Self::NotConnected(_)
            | Self::Timeout { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InkwerkError>;
