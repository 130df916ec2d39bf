// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator console — line commands read from stdin.

use std::fmt;

use inkwerk_core::types::{PrinterId, PrinterRole};
use inkwerk_sync::journal::JournalEntry;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::services::app_services::AppServices;

const DEFAULT_JOURNAL_LINES: u32 = 20;

const HELP: &str = "\
commands:
  add <master> <name>                    create a message on a master's panel
  select <master> <name>                 select a message on a master's panel
  sync [master]                          full resync (local master if omitted)
  online <printer> on|off                take an emulated printer on/off the network
  avail <printer> on|off                 mark a printer available for sync
  role <printer> none|master|slave [m]   change a printer's role
  list                                   show printers and their state
  journal [n]                            show the last n dispatches
  journal master <id>                    show dispatches made for a master
  journal failures <slave>               show commands a slave missed
  help                                   this text
  quit                                   stop inkwerk";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Add { master: PrinterId, name: String },
    Select { master: PrinterId, name: String },
    Sync(Option<PrinterId>),
    Online { printer: PrinterId, online: bool },
    Avail { printer: PrinterId, available: bool },
    Role {
        printer: PrinterId,
        role: PrinterRole,
        master: Option<PrinterId>,
    },
    List,
    Journal(JournalQuery),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalQuery {
    Recent(u32),
    Master(PrinterId),
    Failures(PrinterId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn printer_arg(arg: Option<&str>) -> Result<PrinterId, ParseError> {
    let arg = arg.ok_or_else(|| ParseError("missing printer id".into()))?;
    arg.parse()
        .map_err(|_| ParseError(format!("not a printer id: {arg}")))
}

fn switch_arg(arg: Option<&str>) -> Result<bool, ParseError> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(ParseError("expected on|off".into())),
    }
}

/// Message names may contain spaces; everything after the printer id is the
/// name.
fn name_arg(rest: &str) -> Result<String, ParseError> {
    let name = rest.trim();
    if name.is_empty() {
        return Err(ParseError("missing message name".into()));
    }
    Ok(name.to_string())
}

/// Parse one console line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    let Some((verb, rest)) = line
        .split_once(char::is_whitespace)
        .or((!line.is_empty()).then_some((line, "")))
    else {
        return Ok(None);
    };
    let mut args = rest.split_whitespace();

    let command = match verb {
        "add" | "select" => {
            let rest = rest.trim_start();
            let (id, name) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let master = printer_arg((!id.is_empty()).then_some(id))?;
            let name = name_arg(name)?;
            if verb == "add" {
                ConsoleCommand::Add { master, name }
            } else {
                ConsoleCommand::Select { master, name }
            }
        }
        "sync" => ConsoleCommand::Sync(args.next().map(|a| printer_arg(Some(a))).transpose()?),
        "online" => ConsoleCommand::Online {
            printer: printer_arg(args.next())?,
            online: switch_arg(args.next())?,
        },
        "avail" => ConsoleCommand::Avail {
            printer: printer_arg(args.next())?,
            available: switch_arg(args.next())?,
        },
        "role" => {
            let printer = printer_arg(args.next())?;
            let role: PrinterRole = args
                .next()
                .ok_or_else(|| ParseError("missing role".into()))?
                .parse()
                .map_err(|_| ParseError("role must be none|master|slave".into()))?;
            let master = args.next().map(|a| printer_arg(Some(a))).transpose()?;
            ConsoleCommand::Role {
                printer,
                role,
                master,
            }
        }
        "list" | "ls" => ConsoleCommand::List,
        "journal" => ConsoleCommand::Journal(match args.next() {
            Some("master") => JournalQuery::Master(printer_arg(args.next())?),
            Some("failures") => JournalQuery::Failures(printer_arg(args.next())?),
            Some(n) => JournalQuery::Recent(
                n.parse()
                    .map_err(|_| ParseError(format!("not a count: {n}")))?,
            ),
            None => JournalQuery::Recent(DEFAULT_JOURNAL_LINES),
        }),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ParseError(format!("unknown command: {other} (try `help`)"))),
    };
    Ok(Some(command))
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(services: &AppServices) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("inkwerk ready, type `help` for commands");

    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => execute(services, command).await,
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}

async fn execute(services: &AppServices, command: ConsoleCommand) {
    let result = match command {
        ConsoleCommand::Add { master, name } => services.add_message(master, &name),
        ConsoleCommand::Select { master, name } => services.select_message(master, &name),
        ConsoleCommand::Sync(None) => services
            .request_full_sync()
            .await
            .map(|master| println!("full sync of {master} queued")),
        ConsoleCommand::Sync(Some(master)) => {
            println!("{}", services.sync_master(master).await);
            Ok(())
        }
        ConsoleCommand::Online { printer, online } => services.set_online(printer, online),
        ConsoleCommand::Avail { printer, available } => {
            services.set_available(printer, available)
        }
        ConsoleCommand::Role {
            printer,
            role,
            master,
        } => services.set_role(printer, role, master),
        ConsoleCommand::List => {
            list(services);
            Ok(())
        }
        ConsoleCommand::Journal(query) => {
            let entries = match query {
                // Oldest of the window first, like the other queries.
                JournalQuery::Recent(limit) => services.recent_dispatches(limit).map(|mut e| {
                    e.reverse();
                    e
                }),
                JournalQuery::Master(master) => services.dispatches_for_master(master),
                JournalQuery::Failures(slave) => services.failed_dispatches(slave),
            };
            entries.map(|entries| print_entries(&entries))
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };

    if let Err(e) = result {
        println!("error: {e}");
    }
}

fn print_entries(entries: &[JournalEntry]) {
    for entry in entries {
        match serde_json::to_string(entry) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "could not render journal entry"),
        }
    }
}

fn list(services: &AppServices) {
    for printer in services.printers() {
        let role = match (printer.role, printer.master_id) {
            (PrinterRole::Slave, Some(master)) => format!("slave of {master}"),
            (role, _) => role.to_string(),
        };
        let availability = if printer.is_available { "" } else { " (unavailable)" };
        println!(
            "{:>4}  {:<15} {}:{}{availability}",
            printer.id.to_string(),
            role,
            printer.ip_address,
            printer.port
        );
        if let Some(state) = services.master_state(printer.id) {
            let names: Vec<&str> = state.names().collect();
            println!(
                "      messages: [{}]  selected: {}",
                names.join(", "),
                state.selection.as_deref().unwrap_or("-")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn message_names_keep_spaces() {
        assert_eq!(
            parse("add 1 LOT 42 BEST BEFORE").unwrap(),
            Some(ConsoleCommand::Add {
                master: PrinterId(1),
                name: "LOT 42 BEST BEFORE".into()
            })
        );
        assert_eq!(
            parse("select 3 X").unwrap(),
            Some(ConsoleCommand::Select {
                master: PrinterId(3),
                name: "X".into()
            })
        );
        assert!(parse("add 1").is_err());
        assert!(parse("select").is_err());
    }

    #[test]
    fn sync_with_and_without_master() {
        assert_eq!(parse("sync").unwrap(), Some(ConsoleCommand::Sync(None)));
        assert_eq!(
            parse("sync 4").unwrap(),
            Some(ConsoleCommand::Sync(Some(PrinterId(4))))
        );
        assert!(parse("sync four").is_err());
    }

    #[test]
    fn switches_and_roles() {
        assert_eq!(
            parse("online 2 off").unwrap(),
            Some(ConsoleCommand::Online {
                printer: PrinterId(2),
                online: false
            })
        );
        assert!(parse("avail 2 maybe").is_err());
        assert_eq!(
            parse("role 5 slave 1").unwrap(),
            Some(ConsoleCommand::Role {
                printer: PrinterId(5),
                role: PrinterRole::Slave,
                master: Some(PrinterId(1))
            })
        );
        assert!(parse("role 5 boss").is_err());
    }

    #[test]
    fn journal_count_defaults() {
        assert_eq!(
            parse("journal").unwrap(),
            Some(ConsoleCommand::Journal(JournalQuery::Recent(DEFAULT_JOURNAL_LINES)))
        );
        assert_eq!(
            parse("journal 5").unwrap(),
            Some(ConsoleCommand::Journal(JournalQuery::Recent(5)))
        );
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn journal_by_master_and_failures() {
        assert_eq!(
            parse("journal master 1").unwrap(),
            Some(ConsoleCommand::Journal(JournalQuery::Master(PrinterId(1))))
        );
        assert_eq!(
            parse("journal failures 3").unwrap(),
            Some(ConsoleCommand::Journal(JournalQuery::Failures(PrinterId(3))))
        );
        assert!(parse("journal master").is_err());
    }
}
