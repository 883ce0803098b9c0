//! CLI relay
//!
//! Relays chat messages to AI command-line tools (Claude Code, Gemini CLI,
//! OpenCode) and keeps each conversation resumable across the otherwise
//! stateless tool invocations.
//!
//! ## Features
//!
//! - One tool process per message, spawned without a shell
//! - Resume tokens carried between messages for tools that support them
//! - Per-request timeout and on-demand kill of the whole tool process group
//! - At most one request in flight per session
//! - Named sessions, retry of transient spawn faults
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use cli_relay::session::Session;
//! use cli_relay::types::ToolRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ToolRegistry::builtin(Duration::from_secs(300));
//!     let session = Session::new(registry.get_or_error("claude")?, std::env::current_dir()?);
//!
//!     println!("{}", session.send_message("Summarize README.md").await?);
//!     println!("{}", session.send_message("Now shorter").await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! - `DEFAULT_CLI`: Tool id to relay to (default: `claude`)
//! - `AI_CLI_TIMEOUT`: Maximum seconds per request for built-in tools (default: 300)
//! - `RELAY_WORKING_DIR`: Working directory of the tool (default: current directory)
//! - `RELAY_TOOLS_FILE`: Tool definitions file
//! - `RELAY_RETRY_MAX_ATTEMPTS`: Retries of transient faults (default: 2)
//! - `RELAY_RETRY_BASE_DELAY_MS`: Base backoff delay (default: 1000)
//!
//! ## Tool Definitions
//!
//! Tools are loaded from the built-in set, then overlaid with the tools file
//! (`RELAY_TOOLS_FILE`, or `<config dir>/cli-relay/tools.json` when present):
//!
//! ```json
//! {
//!   "tools": {
//!     "claude": {
//!       "command": "/opt/claude/bin/claude",
//!       "extraFlags": ["--output-format", "json"],
//!       "resumeFlag": "--resume",
//!       "jsonOutput": true
//!     }
//!   }
//! }
//! ```

pub mod cli;
pub mod relay;
pub mod session;
pub mod tracing;
pub mod types;

pub use cli::Cli;
pub use relay::{Relay, RetryPolicy, run_relay_with_cli, shutdown_otel};
pub use session::{ProcessLauncher, Session, SessionInfo, SessionManager, SystemLauncher};
pub use types::{RelayConfig, RelayError, Result, ToolDescriptor, ToolRegistry};
