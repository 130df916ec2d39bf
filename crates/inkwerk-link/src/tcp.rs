// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP command bridge to networked CIJ printers.
//
// One TCP stream per open session. Commands are ASCII lines terminated by
// CR LF; the printer answers each with a single line. A line starting with
// `^ER` is an error response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use inkwerk_core::command::ERROR_RESPONSE_PREFIX;
use inkwerk_core::error::{InkwerkError, Result};
use inkwerk_core::types::{PrinterEndpoint, PrinterId};

use crate::transport::Transport;

/// Default timeout for opening a session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for one command round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// An open command session.
struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Transport that talks to printers over TCP.
pub struct TcpTransport {
    /// Open sessions. Each session has its own lock so that commands to
    /// different printers run concurrently.
    sessions: Mutex<HashMap<PrinterId, Arc<Mutex<Session>>>>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_COMMAND_TIMEOUT)
    }
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            connect_timeout,
            command_timeout,
        }
    }

    async fn session(&self, printer_id: PrinterId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .lock()
            .await
            .get(&printer_id)
            .cloned()
            .ok_or(InkwerkError::NotConnected(printer_id))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn name(&self) -> &str {
        "tcp"
    }

    #[instrument(skip(self, printer), fields(printer = %printer.id, addr = %printer.socket_addr()))]
    async fn connect(&self, printer: &PrinterEndpoint) -> Result<()> {
        if self.sessions.lock().await.contains_key(&printer.id) {
            return Err(InkwerkError::SessionLimit(printer.id));
        }

        let addr = printer.socket_addr();
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| InkwerkError::Timeout {
                printer: printer.id,
                secs: self.connect_timeout.as_secs(),
            })?
            .map_err(|e| InkwerkError::Connect {
                printer: printer.id,
                detail: format!("{addr}: {e}"),
            })?;
        stream.set_nodelay(true)?;

        let (read_half, writer) = stream.into_split();
        let session = Session {
            reader: BufReader::new(read_half),
            writer,
        };

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&printer.id) {
            // Lost a race with a concurrent connect to the same printer.
            return Err(InkwerkError::SessionLimit(printer.id));
        }
        sessions.insert(printer.id, Arc::new(Mutex::new(session)));
        debug!("session opened");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_command(&self, printer_id: PrinterId, command: &str) -> Result<String> {
        let session = self.session(printer_id).await?;
        let mut session = session.lock().await;

        let round_trip = async {
            session
                .writer
                .write_all(format!("{command}\r\n").as_bytes())
                .await?;
            session.writer.flush().await?;

            let mut line = String::new();
            let read = session.reader.read_line(&mut line).await?;
            Ok::<_, std::io::Error>((read, line))
        };

        let (read, line) = tokio::time::timeout(self.command_timeout, round_trip)
            .await
            .map_err(|_| InkwerkError::Timeout {
                printer: printer_id,
                secs: self.command_timeout.as_secs(),
            })?
            .map_err(|e| InkwerkError::Command {
                printer: printer_id,
                detail: e.to_string(),
            })?;

        if read == 0 {
            return Err(InkwerkError::Command {
                printer: printer_id,
                detail: "connection closed by printer".into(),
            });
        }

        let response = line.trim_end_matches(['\r', '\n']).to_string();
        if response.starts_with(ERROR_RESPONSE_PREFIX) {
            return Err(InkwerkError::Command {
                printer: printer_id,
                detail: response,
            });
        }
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn disconnect(&self, printer_id: PrinterId) -> Result<()> {
        let Some(session) = self.sessions.lock().await.remove(&printer_id) else {
            return Ok(());
        };
        let mut session = session.lock().await;
        session.writer.shutdown().await?;
        info!("session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Fake printer: answers every line with `reply(line)` until EOF.
    async fn fake_printer(reply: fn(&str) -> String) -> (PrinterEndpoint, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut seen = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let line = line.trim_end().to_string();
                write_half
                    .write_all(format!("{}\r\n", reply(&line)).as_bytes())
                    .await
                    .unwrap();
                seen.push(line);
            }
            seen
        });
        let endpoint = PrinterEndpoint {
            id: PrinterId(2),
            ip_address: "127.0.0.1".into(),
            port,
        };
        (endpoint, handle)
    }

    #[tokio::test]
    async fn command_round_trip() {
        let (endpoint, printer) = fake_printer(|_| "^OK".to_string()).await;
        let transport = TcpTransport::default();

        transport.connect(&endpoint).await.unwrap();
        let response = transport.send_command(endpoint.id, "^NM LOT1").await.unwrap();
        transport.disconnect(endpoint.id).await.unwrap();

        assert_eq!(response, "^OK");
        assert_eq!(printer.await.unwrap(), ["^NM LOT1"]);
    }

    #[tokio::test]
    async fn error_response_is_a_command_error() {
        let (endpoint, _printer) = fake_printer(|_| "^ER message not found".to_string()).await;
        let transport = TcpTransport::default();

        transport.connect(&endpoint).await.unwrap();
        let err = transport
            .send_command(endpoint.id, "^SM MISSING")
            .await
            .unwrap_err();
        transport.disconnect(endpoint.id).await.unwrap();

        match err {
            InkwerkError::Command { detail, .. } => assert_eq!(detail, "^ER message not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_session_to_same_printer_is_refused() {
        let (endpoint, _printer) = fake_printer(|_| "^OK".to_string()).await;
        let transport = TcpTransport::default();

        transport.connect(&endpoint).await.unwrap();
        let err = transport.connect(&endpoint).await.unwrap_err();
        assert!(matches!(err, InkwerkError::SessionLimit(_)));
        transport.disconnect(endpoint.id).await.unwrap();
    }

    #[tokio::test]
    async fn send_without_session_fails() {
        let transport = TcpTransport::default();
        let err = transport
            .send_command(PrinterId(5), "^SM LOT1")
            .await
            .unwrap_err();
        assert!(matches!(err, InkwerkError::NotConnected(PrinterId(5))));
        // Releasing an unknown session is a no-op.
        transport.disconnect(PrinterId(5)).await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint = PrinterEndpoint {
            id: PrinterId(3),
            ip_address: "127.0.0.1".into(),
            port,
        };
        let err = TcpTransport::default().connect(&endpoint).await.unwrap_err();
        assert!(err.is_transient());
    }
}
