//! Session management for the relay
//!
//! This module handles:
//! - Building tool command lines
//! - Launching and supervising tool processes
//! - Parsing tool output into replies and resume tokens
//! - Conversation state, statistics and history
//! - Named session lifecycle (create, get, remove)

mod command;
mod launcher;
mod manager;
mod output;
#[allow(clippy::module_inception)]
mod session;
mod state;
mod wrapped_child;

pub use command::{PROMPT_FLAG, build_command};
pub use launcher::{ProcessLauncher, SystemLauncher};
pub use manager::{MAX_SESSION_NAME_LEN, SessionManager, validate_session_name};
pub use output::{ParsedOutput, parse_output, redact_secrets, strip_ansi};
pub use session::{NO_OUTPUT, Session};
pub use state::{
    ConversationState, HistoryEntry, MAX_HISTORY_CONTENT_LENGTH, MAX_HISTORY_ENTRIES, Role,
    SessionInfo, SessionStats, estimate_tokens,
};
pub use wrapped_child::WrappedChild;
