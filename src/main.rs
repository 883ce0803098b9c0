//! CLI relay binary
//!
//! Run with: cargo run
//!
//! For help: cargo run -- --help

use clap::Parser;
use cli_relay::{cli::Cli, run_relay_with_cli, shutdown_otel};
use std::io::IsTerminal;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Dropping the relay on a signal drops any running request, and the
    // kill-on-drop tool processes with it
    let result = tokio::select! {
        result = run_relay_with_cli(&cli) => result,
        _ = signal::ctrl_c() => {
            eprintln!("Received SIGINT, shutting down...");
            Ok(())
        }
        () = terminate_signal() => {
            eprintln!("Received SIGTERM, shutting down...");
            Ok(())
        }
    };

    // Shutdown OpenTelemetry to flush all pending spans
    shutdown_otel();

    if let Err(e) = result {
        // Replies go to stdout, errors to stderr
        eprintln!("Error: {}", e);

        if std::io::stdin().is_terminal() {
            eprintln!("\nFor debugging, run with --diagnostic to log to a file.");
            eprintln!("Or use -v/-vv/-vvv for more verbose logging.");
        }

        std::process::exit(1);
    }

    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            eprintln!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
