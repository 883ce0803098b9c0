//! Terminal front-end for a relay session
//!
//! Reads user lines, relays them through the active named session, and
//! prints replies.

mod commands;
mod display;
mod retry;
mod runner;

pub use commands::{DEFAULT_HISTORY_COUNT, HELP_TEXT, RelayCommand, SessionCommand};
pub use display::{render_history, render_info, render_session_list};
pub use retry::RetryPolicy;
pub use runner::{DEFAULT_SESSION, Relay, render_reply, run_relay_with_cli, shutdown_otel};
