//! Conversation state of a session
//!
//! Holds everything that survives between tool invocations. Only the
//! orchestrator mutates it, and only after a successful run or a reset.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::output::ParsedOutput;

/// Most recent history entries kept per session
pub const MAX_HISTORY_ENTRIES: usize = 50;
/// Characters of each message kept in history
pub const MAX_HISTORY_CONTENT_LENGTH: usize = 500;
/// Characters of the resume token shown in session info
const RESUME_TOKEN_PREFIX_LEN: usize = 16;

/// Rough token estimate (about 4 characters per token)
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn side, truncated for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub tokens: u64,
}

/// Cumulative estimated usage of a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
}

impl SessionStats {
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Mutable record of one logical conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub resume_token: Option<String>,
    pub message_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub stats: SessionStats,
    pub history: VecDeque<HistoryEntry>,
}

impl ConversationState {
    /// Apply a successful turn
    ///
    /// A new token replaces the old one; a turn without a token keeps the
    /// previous one so the conversation stays resumable.
    pub fn record_success(&mut self, message: &str, output: &ParsedOutput, now: DateTime<Utc>) {
        if let Some(token) = &output.resume_token {
            self.resume_token = Some(token.clone());
        }
        self.message_count += 1;
        self.started_at.get_or_insert(now);

        let input_tokens = estimate_tokens(message);
        let output_tokens = estimate_tokens(&output.reply);
        self.stats.total_input_tokens += input_tokens;
        self.stats.total_output_tokens += output_tokens;

        self.push_history(Role::User, message, input_tokens, now);
        self.push_history(Role::Assistant, &output.reply, output_tokens, now);
    }

    /// Forget the conversation; the next message starts a new one
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn push_history(&mut self, role: Role, content: &str, tokens: u64, timestamp: DateTime<Utc>) {
        let content = if content.chars().count() > MAX_HISTORY_CONTENT_LENGTH {
            let mut truncated: String = content.chars().take(MAX_HISTORY_CONTENT_LENGTH).collect();
            truncated.push_str("...");
            truncated
        } else {
            content.to_string()
        };

        self.history.push_back(HistoryEntry {
            role,
            content,
            timestamp,
            tokens,
        });
        while self.history.len() > MAX_HISTORY_ENTRIES {
            self.history.pop_front();
        }
    }
}

/// Read-only snapshot of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub tool_id: String,
    pub tool_name: String,
    pub cwd: PathBuf,
    pub busy: bool,
    /// Pid of the running tool process, while busy
    pub pid: Option<u32>,
    pub message_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub resume_token: Option<String>,
    pub stats: SessionStats,
}

impl SessionInfo {
    /// Shortened resume token for display, e.g. `3f2a9c1e-77b0-4c…`
    pub fn resume_token_prefix(&self) -> Option<String> {
        self.resume_token.as_ref().map(|token| {
            if token.chars().count() > RESUME_TOKEN_PREFIX_LEN {
                let prefix: String = token.chars().take(RESUME_TOKEN_PREFIX_LEN).collect();
                format!("{prefix}…")
            } else {
                token.clone()
            }
        })
    }

    /// Time since the first successful message
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.started_at.map(|started| now - started)
    }

    /// Whether the next message continues an existing conversation
    pub fn is_resumable(&self) -> bool {
        self.resume_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output(reply: &str, token: Option<&str>) -> ParsedOutput {
        ParsedOutput {
            reply: reply.to_string(),
            resume_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_record_success() {
        let mut state = ConversationState::default();
        let first = Utc::now();
        state.record_success("hello", &output("hi there", Some("sess-1")), first);

        assert_eq!(state.resume_token.as_deref(), Some("sess-1"));
        assert_eq!(state.message_count, 1);
        assert_eq!(state.started_at, Some(first));
        assert_eq!(state.stats.total_input_tokens, 2);
        assert_eq!(state.stats.total_output_tokens, 2);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].role, Role::User);
        assert_eq!(state.history[1].content, "hi there");

        // a turn without a token keeps the previous one and the start time
        let later = first + chrono::Duration::seconds(30);
        state.record_success("again", &output("ok", None), later);
        assert_eq!(state.resume_token.as_deref(), Some("sess-1"));
        assert_eq!(state.message_count, 2);
        assert_eq!(state.started_at, Some(first));
    }

    #[test]
    fn test_history_is_capped_and_truncated() {
        let mut state = ConversationState::default();
        let long = "x".repeat(MAX_HISTORY_CONTENT_LENGTH + 10);
        for _ in 0..40 {
            state.record_success(&long, &output("ok", None), Utc::now());
        }

        assert_eq!(state.history.len(), MAX_HISTORY_ENTRIES);
        let user_entry = state.history.iter().find(|e| e.role == Role::User).unwrap();
        assert_eq!(user_entry.content.chars().count(), MAX_HISTORY_CONTENT_LENGTH + 3);
        assert!(user_entry.content.ends_with("..."));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = ConversationState::default();
        state.record_success("hello", &output("hi", Some("sess-1")), Utc::now());
        state.reset();

        assert!(state.resume_token.is_none());
        assert_eq!(state.message_count, 0);
        assert!(state.started_at.is_none());
        assert_eq!(state.stats, SessionStats::default());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_resume_token_prefix() {
        let mut info = SessionInfo {
            tool_id: "claude".into(),
            tool_name: "Claude Code".into(),
            cwd: PathBuf::from("/tmp"),
            busy: false,
            pid: None,
            message_count: 0,
            started_at: None,
            resume_token: None,
            stats: SessionStats::default(),
        };
        assert_eq!(info.resume_token_prefix(), None);
        assert!(!info.is_resumable());

        info.resume_token = Some("short".into());
        assert_eq!(info.resume_token_prefix().as_deref(), Some("short"));

        info.resume_token = Some("3f2a9c1e-77b0-4c2d-9a51-0e6f8d2b7c44".into());
        assert_eq!(info.resume_token_prefix().as_deref(), Some("3f2a9c1e-77b0-4c…"));
        assert!(info.is_resumable());
    }
}
