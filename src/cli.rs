//! Command-line interface definitions
//!
//! Provides CLI argument parsing using clap for the relay binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::types::RelayConfig;

/// CLI relay - Chat with Claude Code, Gemini CLI or OpenCode from a terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "cli-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Tool to relay to (overrides DEFAULT_CLI)
    #[arg(short, long, value_name = "ID")]
    pub tool: Option<String>,

    /// Working directory of the tool (overrides RELAY_WORKING_DIR)
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Maximum seconds per request for built-in tools (overrides AI_CLI_TIMEOUT)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Tool definitions file (overrides RELAY_TOOLS_FILE)
    #[arg(long, value_name = "FILE")]
    pub tools_file: Option<PathBuf>,

    /// Send a single message, print the reply and exit
    #[arg(short, long, value_name = "TEXT")]
    pub message: Option<String>,

    /// Enable diagnostic mode (auto-log to temp file)
    #[arg(short, long)]
    pub diagnostic: bool,

    /// Log directory (implies diagnostic mode)
    #[arg(short = 'l', long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log file name (implies diagnostic mode)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long)]
    pub quiet: bool,

    /// OpenTelemetry OTLP endpoint (e.g., http://localhost:4317)
    /// When otel feature is enabled, this configures the OTLP exporter.
    /// When otel feature is disabled, this argument is accepted but ignored.
    #[arg(long, value_name = "URL", env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// OpenTelemetry service name
    #[arg(long, value_name = "NAME", default_value = "cli-relay")]
    pub otel_service_name: String,
}

#[allow(clippy::derivable_impls)]
impl Default for Cli {
    fn default() -> Self {
        Self {
            tool: None,
            cwd: None,
            timeout: None,
            tools_file: None,
            message: None,
            diagnostic: false,
            log_dir: None,
            log_file: None,
            verbose: 0,
            quiet: false,
            otel_endpoint: None,
            otel_service_name: "cli-relay".to_string(),
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of an environment configuration
    pub fn apply_overrides(&self, config: &mut RelayConfig) {
        if let Some(tool) = &self.tool {
            config.default_tool.clone_from(tool);
        }
        if let Some(cwd) = &self.cwd {
            config.working_dir = Some(cwd.clone());
        }
        if let Some(secs) = self.timeout {
            config.tool_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = &self.tools_file {
            config.tools_file = Some(path.clone());
        }
    }

    /// Check if diagnostic mode is enabled (output to file)
    ///
    /// Returns true if `--diagnostic` is set, or if `--log-dir` or `--log-file` is specified.
    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic || self.log_dir.is_some() || self.log_file.is_some()
    }

    /// Check if OpenTelemetry tracing is enabled
    ///
    /// Returns true if `--otel-endpoint` is specified and the otel feature is enabled.
    #[cfg(feature = "otel")]
    pub fn is_otel_enabled(&self) -> bool {
        self.otel_endpoint.is_some()
    }

    /// Check if OpenTelemetry tracing is enabled (always false without otel feature)
    /// Note: --otel-endpoint argument is still accepted but ignored when feature is disabled
    #[cfg(not(feature = "otel"))]
    pub fn is_otel_enabled(&self) -> bool {
        if self.otel_endpoint.is_some() {
            tracing::warn!("--otel-endpoint specified but otel feature is not enabled, ignoring");
        }
        false
    }

    /// Get the log level based on CLI arguments
    ///
    /// - `--quiet`: ERROR
    /// - default: INFO
    /// - `-v`: DEBUG
    /// - `-vv` or more: TRACE
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }

    /// Get the log file path for diagnostic mode
    ///
    /// Uses the specified log directory and file name, or defaults to:
    /// - Directory: system temp directory
    /// - File: `cli-relay-{timestamp}.log`
    pub fn log_path(&self) -> PathBuf {
        let dir = self
            .log_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let filename = self.log_file.clone().unwrap_or_else(|| {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            format!("cli-relay-{timestamp}.log")
        });

        dir.join(filename)
    }
}
