//! Parsing of front-end input lines

use crate::session::MAX_HISTORY_ENTRIES;

/// Help text listing the front-end commands
pub const HELP_TEXT: &str = "\
Type a message to relay it to the active session. Commands:
  /new          start a new conversation (kills a running request)
  /kill         stop the running request, keep the conversation
  /info         show session details
  /history [n]  show the last n messages (default 10)
  /session list | create <name> [tool] | switch <name> | delete <name>
  /help         show this help
  /quit         exit";

/// Entries `/history` shows without a count
pub const DEFAULT_HISTORY_COUNT: usize = 10;

const HISTORY_USAGE: &str = "Usage: /history [count], count between 1 and 50";
const SESSION_USAGE: &str =
    "Usage: /session list | create <name> [tool] | switch <name> | delete <name>";

/// `/session` subcommands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    List,
    /// Create a named session, with the default tool unless one is given
    Create { name: String, tool: Option<String> },
    /// Make a session the target of messages and commands
    Switch(String),
    /// Kill and forget a session
    Delete(String),
}

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    /// Relay the text to the tool
    Ask(String),
    /// Reset the conversation
    New,
    /// Kill the running request
    Kill,
    /// Show session details
    Info,
    /// Show the most recent history entries
    History(usize),
    Session(SessionCommand),
    Help,
    Quit,
    /// A known command with malformed arguments
    Usage(&'static str),
    /// A slash command nobody knows
    Unknown(String),
}

impl RelayCommand {
    /// Parse one input line; blank lines yield `None`
    ///
    /// Command names are case-insensitive; commands without arguments ignore
    /// trailing words. A line starting with `//` is sent as a message with
    /// one slash removed.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(escaped) = line.strip_prefix("//") {
            return Some(Self::Ask(format!("/{escaped}")));
        }

        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Ask(line.to_string()));
        };

        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();
        Some(match name.as_str() {
            "new" | "reset" => Self::New,
            "kill" | "stop" => Self::Kill,
            "info" | "status" => Self::Info,
            "history" => parse_history(&args),
            "session" | "sessions" => parse_session(&args),
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        })
    }
}

fn parse_history(args: &[&str]) -> RelayCommand {
    match args {
        [] => RelayCommand::History(DEFAULT_HISTORY_COUNT),
        [count] => match count.parse::<usize>() {
            Ok(count) if (1..=MAX_HISTORY_ENTRIES).contains(&count) => {
                RelayCommand::History(count)
            }
            _ => RelayCommand::Usage(HISTORY_USAGE),
        },
        _ => RelayCommand::Usage(HISTORY_USAGE),
    }
}

fn parse_session(args: &[&str]) -> RelayCommand {
    let Some((sub, rest)) = args.split_first() else {
        return RelayCommand::Session(SessionCommand::List);
    };
    let command = match (sub.to_ascii_lowercase().as_str(), rest) {
        ("list" | "ls", []) => SessionCommand::List,
        ("create", [name]) => SessionCommand::Create {
            name: (*name).to_string(),
            tool: None,
        },
        ("create", [name, tool]) => SessionCommand::Create {
            name: (*name).to_string(),
            tool: Some(tool.to_ascii_lowercase()),
        },
        ("switch" | "use", [name]) => SessionCommand::Switch((*name).to_string()),
        ("delete" | "end", [name]) => SessionCommand::Delete((*name).to_string()),
        _ => return RelayCommand::Usage(SESSION_USAGE),
    };
    RelayCommand::Session(command)
}
