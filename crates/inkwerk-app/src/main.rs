// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inkwerk — master/slave message synchronisation for CIJ printers
//
// Entry point. Initialises logging and backend services, then hands stdin to
// the operator console.

mod console;
mod services;

use std::process::ExitCode;

use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Inkwerk starting");

    let data_dir = services::data_dir::data_dir();
    let svc = match AppServices::start(&data_dir) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "backend services failed to start");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        path = %svc.data_dir().display(),
        local = ?svc.config().local_printer,
        "backend services initialised"
    );

    let status = match console::run(&svc).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "console input failed");
            ExitCode::FAILURE
        }
    };

    svc.shutdown().await;
    status
}
