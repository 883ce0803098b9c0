//! Interpretation of captured tool output
//!
//! Structured tools print one JSON record such as
//! `{"result": "...", "session_id": "..."}`; everything else is plain text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::types::ToolDescriptor;

/// Terminal colour and cursor sequences
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:\[[0-9;?]*[A-Za-z]|\][^\x07]*\x07)").expect("valid ANSI regex")
});

/// Credential shapes that must not leak into replies, with their replacements
static SECRET_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bsk-[a-zA-Z0-9_-]{20,}", "[REDACTED_API_KEY]"),
        (r"\bghp_[a-zA-Z0-9]{36,}", "[REDACTED_TOKEN]"),
        (r"\bgho_[a-zA-Z0-9]{36,}", "[REDACTED_TOKEN]"),
        (r"\bgithub_pat_[a-zA-Z0-9_]{22,}", "[REDACTED_TOKEN]"),
        (r"\bxox[bpsa]-[a-zA-Z0-9-]{10,}", "[REDACTED_TOKEN]"),
        (r"\bAIza[a-zA-Z0-9_-]{35}", "[REDACTED_API_KEY]"),
        (r"(?i)Bearer\s+[a-zA-Z0-9._\-/+=]{20,}", "Bearer [REDACTED]"),
        (
            r"(?i)\b(ANTHROPIC_API_KEY|OPENAI_API_KEY|GOOGLE_API_KEY|GEMINI_API_KEY|DISCORD_BOT_TOKEN|API_KEY|SECRET_KEY|ACCESS_TOKEN|AUTH_TOKEN)=\S+",
            "${1}=[REDACTED]",
        ),
        (r#"(?i)[A-Z]:\\Users\\[^\\"\s]+"#, "[REDACTED_PATH]"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid secret regex"), replacement))
    .collect()
});

/// Reply text and resume token extracted from one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub reply: String,
    pub resume_token: Option<String>,
}

impl ParsedOutput {
    fn plain(raw: &str) -> Self {
        Self {
            reply: strip_ansi(raw).trim().to_string(),
            resume_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StructuredRecord {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// Parse a tool's stdout according to its output mode
///
/// A structured tool that prints something other than the expected record
/// (diagnostics, a bare JSON string, a field of the wrong type) is treated as
/// plain text for that turn, with no resume token.
pub fn parse_output(tool: &ToolDescriptor, raw: &str) -> ParsedOutput {
    if !tool.structured_output {
        return ParsedOutput::plain(raw);
    }

    match serde_json::from_str::<StructuredRecord>(raw) {
        Ok(record) => ParsedOutput {
            reply: record.result.unwrap_or_else(|| raw.to_string()),
            resume_token: record.session_id.filter(|id| !id.is_empty()),
        },
        Err(e) => {
            tracing::debug!(tool = %tool.id, error = %e, "Structured output did not decode, using plain text");
            ParsedOutput::plain(raw)
        }
    }
}

/// Remove ANSI escape sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Replace API keys, tokens and similar credentials with markers
pub fn redact_secrets(text: &str) -> String {
    let mut result = text.to_string();
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).into_owned();
    }
    result
}
