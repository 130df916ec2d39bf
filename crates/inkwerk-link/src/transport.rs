// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport abstraction over printer command sessions.
//
// A printer accepts only a handful of concurrent command sessions, so callers
// never hold one open: every command goes through `send_once`, which opens a
// fresh session, sends, and releases the session again whatever the outcome.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use inkwerk_core::error::Result;
use inkwerk_core::types::{PrinterEndpoint, PrinterId};

/// Session-oriented access to printers.
///
/// Implementations: [`crate::tcp::TcpTransport`] for real printers and
/// [`crate::emulator::Emulator`] for the in-process emulator. Sync code only
/// ever sees `dyn Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs ("tcp", "emulator").
    fn name(&self) -> &str;

    /// Open a command session to the printer.
    async fn connect(&self, printer: &PrinterEndpoint) -> Result<()>;

    /// Send one ASCII control string and return the printer's response.
    ///
    /// Requires an open session. An error response from the device is
    /// reported as `InkwerkError::Command`.
    async fn send_command(&self, printer_id: PrinterId, command: &str) -> Result<String>;

    /// Release the session. Disconnecting a printer with no open session
    /// succeeds.
    async fn disconnect(&self, printer_id: PrinterId) -> Result<()>;
}

/// Run one command in its own session: connect, send, disconnect.
///
/// The session is released even when the send fails. A failed disconnect
/// after a successful send is logged and does not fail the command.
#[instrument(skip(transport), fields(transport = transport.name(), printer = %printer.id))]
pub async fn send_once(
    transport: &dyn Transport,
    printer: &PrinterEndpoint,
    command: &str,
) -> Result<String> {
    transport.connect(printer).await?;

    let sent = transport.send_command(printer.id, command).await;

    if let Err(e) = transport.disconnect(printer.id).await {
        warn!(error = %e, "disconnect after command failed");
    }

    let response = sent?;
    debug!(response = %response, "command acknowledged");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::{EmulatedPrinter, Emulator};
    use inkwerk_core::InkwerkError;

    fn endpoint(id: u32) -> PrinterEndpoint {
        PrinterEndpoint {
            id: PrinterId(id),
            ip_address: "127.0.0.1".into(),
            port: 3100,
        }
    }

    #[tokio::test]
    async fn send_once_releases_session() {
        let emulator = Emulator::new();
        emulator.add_printer(PrinterId(2), EmulatedPrinter::default());

        send_once(&emulator, &endpoint(2), "^NM LOT1").await.unwrap();

        assert_eq!(emulator.open_sessions(PrinterId(2)), Some(0));
        assert_eq!(emulator.messages(PrinterId(2)).unwrap(), ["LOT1"]);
    }

    #[tokio::test]
    async fn send_once_releases_session_on_rejection() {
        let emulator = Emulator::new();
        emulator.add_printer(PrinterId(2), EmulatedPrinter::default());

        let err = send_once(&emulator, &endpoint(2), "^ZZ nonsense")
            .await
            .unwrap_err();

        assert!(matches!(err, InkwerkError::Command { .. }));
        assert_eq!(emulator.open_sessions(PrinterId(2)), Some(0));
    }

    #[tokio::test]
    async fn send_once_surfaces_connect_failure() {
        let emulator = Emulator::new();
        let err = send_once(&emulator, &endpoint(9), "^SM LOT1")
            .await
            .unwrap_err();
        assert!(matches!(err, InkwerkError::Connect { .. }));
    }
}
