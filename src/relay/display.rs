//! Plain-text rendering of session details for the front-end

use chrono::{DateTime, Utc};

use crate::session::{HistoryEntry, Role, SessionInfo};

/// Characters of each history entry printed by `/history`
const HISTORY_PREVIEW_CHARS: usize = 100;

fn status(info: &SessionInfo) -> &'static str {
    match (info.busy, info.is_resumable()) {
        (true, _) => "Running",
        (false, true) => "Active",
        (false, false) => "New",
    }
}

/// Render `info` as an aligned block of `label: value` lines
pub fn render_info(info: &SessionInfo, now: DateTime<Utc>) -> String {
    let status = status(info);
    let duration = info
        .elapsed(now)
        .map(|elapsed| {
            let secs = elapsed.num_seconds().max(0);
            format!("{}m {}s", secs / 60, secs % 60)
        })
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        format!("CLI Tool:          {}", info.tool_name),
        format!("Status:            {status}"),
        format!("Messages:          {}", info.message_count),
        format!("Duration:          {duration}"),
        format!("Working Directory: {}", info.cwd.display()),
    ];
    if let Some(pid) = info.pid {
        lines.push(format!("Process:           {pid}"));
    }
    if let Some(prefix) = info.resume_token_prefix() {
        lines.push(format!("Session ID:        {prefix}"));
    }
    if info.stats.total_tokens() > 0 {
        lines.push(format!(
            "Tokens (est.):     {} in / {} out",
            info.stats.total_input_tokens, info.stats.total_output_tokens
        ));
    }
    lines.join("\n")
}

/// Render history entries oldest first, one line each
pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No history yet.".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            let role = match entry.role {
                Role::User => "You",
                Role::Assistant => "AI",
            };
            let mut content: String = entry
                .content
                .chars()
                .take(HISTORY_PREVIEW_CHARS)
                .map(|c| if c == '\n' { ' ' } else { c })
                .collect();
            if entry.content.chars().count() > HISTORY_PREVIEW_CHARS {
                content.push_str("...");
            }
            format!("[{}] {role}: {content}", entry.timestamp.format("%H:%M:%S"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render one line per named session, marking the active one
pub fn render_session_list(sessions: &[(String, SessionInfo)], active: &str) -> String {
    sessions
        .iter()
        .map(|(name, info)| {
            let marker = if name == active { '*' } else { ' ' };
            format!(
                "{marker} {name} - {} | {} | {} msgs",
                info.tool_name,
                status(info),
                info.message_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
