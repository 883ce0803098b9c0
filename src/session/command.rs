//! Argument vector construction for one tool invocation

use crate::types::ToolDescriptor;

/// Flag that carries the message to every supported tool
pub const PROMPT_FLAG: &str = "-p";

/// Build the argument vector for sending `message` to `tool`
///
/// The result is `[command, "-p", message, ...extra_flags]`, followed by
/// `[resume_flag, token]` only when the tool can resume and a token is known.
/// The vector is handed to the OS directly, so `message` stays a single
/// argument whatever it contains.
pub fn build_command(tool: &ToolDescriptor, message: &str, resume_token: Option<&str>) -> Vec<String> {
    let mut argv = Vec::with_capacity(5 + tool.extra_flags.len());
    argv.push(tool.command.clone());
    argv.push(PROMPT_FLAG.to_string());
    argv.push(message.to_string());
    argv.extend(tool.extra_flags.iter().cloned());

    if let (Some(flag), Some(token)) = (tool.resume_flag.as_deref(), resume_token) {
        argv.push(flag.to_string());
        argv.push(token.to_string());
    }

    argv
}
