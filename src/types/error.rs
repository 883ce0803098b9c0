//! Error types for the CLI relay

use std::time::Duration;

use thiserror::Error;

/// Stable error codes reported alongside relay errors
///
/// Front-ends can use these to pick an icon or decide whether to offer a retry
/// without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Tool binary missing from the search path
    NotInstalled = 1,
    /// Tool exceeded its maximum execution duration
    Timeout = 2,
    /// Tool ran but reported failure
    NonZeroExit = 3,
    /// Spawn or IO level failure
    ExecutionFault = 4,
    /// A request is already in flight for the session
    AlreadyBusy = 5,
    /// The in-flight request was killed
    Cancelled = 6,
    /// Session lookup or naming problem
    SessionError = 7,
    /// Configuration error
    ConfigError = 8,
    /// Internal error
    InternalError = 9,
}

impl ErrorCode {
    /// Get the error code value
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Main error type for the relay
#[derive(Debug, Error)]
pub enum RelayError {
    // === Tool process errors ===
    /// Tool binary could not be located
    #[error("`{0}` is not installed or not in PATH.")]
    NotInstalled(String),

    /// Tool exceeded its maximum duration and was killed
    #[error("Request timed out after {}s.", .0.as_secs())]
    Timeout(Duration),

    /// Tool exited with a failure status
    #[error("{message}")]
    NonZeroExit {
        /// Exit code, `None` when the tool was terminated by a signal
        code: Option<i32>,
        /// Redacted stderr (or stdout) text of the tool
        message: String,
    },

    /// Spawning or supervising the tool failed
    #[error("Failed to run `{tool}`: {reason}")]
    Execution {
        tool: String,
        reason: String,
        /// Whether the tool had started before the fault
        spawned: bool,
    },

    /// A request is already running for this session
    #[error("A request is already running for this session.")]
    AlreadyBusy,

    /// The running request was killed
    #[error("Request was cancelled.")]
    Cancelled,

    // === Session errors ===
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already exists
    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),

    /// Session name rejected
    #[error(
        "Invalid session name: '{0}'. Use only letters, numbers, hyphens, underscores (max 32 chars)."
    )]
    InvalidSessionName(String),

    // === Configuration errors ===
    /// Unknown tool id
    #[error("Unknown CLI: '{name}'. Available: {available}")]
    UnknownTool { name: String, available: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // === External errors ===
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the relay
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the error code for this error
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RelayError::NotInstalled(_) => ErrorCode::NotInstalled,
            RelayError::Timeout(_) => ErrorCode::Timeout,
            RelayError::NonZeroExit { .. } => ErrorCode::NonZeroExit,
            RelayError::Execution { .. } => ErrorCode::ExecutionFault,
            RelayError::AlreadyBusy => ErrorCode::AlreadyBusy,
            RelayError::Cancelled => ErrorCode::Cancelled,
            RelayError::SessionNotFound(_) => ErrorCode::SessionError,
            RelayError::SessionAlreadyExists(_) => ErrorCode::SessionError,
            RelayError::InvalidSessionName(_) => ErrorCode::SessionError,
            RelayError::UnknownTool { .. } => ErrorCode::ConfigError,
            RelayError::ConfigError(_) => ErrorCode::ConfigError,
            RelayError::Io(_) => ErrorCode::InternalError,
            RelayError::Json(_) => ErrorCode::ConfigError,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only faults before the tool started qualify. A tool that was already
    /// running may have acted on the message, and a missing binary, a tool
    /// that reported failure, or a timeout will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Execution { spawned: false, .. })
    }

    /// Check if this error is a client error (caused by invalid input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::AlreadyBusy
                | RelayError::SessionNotFound(_)
                | RelayError::SessionAlreadyExists(_)
                | RelayError::InvalidSessionName(_)
                | RelayError::UnknownTool { .. }
        )
    }

    /// Render the error the way front-ends show it to users
    pub fn user_message(&self) -> String {
        format!("[Error] {self}")
    }

    // === Constructor helpers ===

    /// Create a not-installed error
    pub fn not_installed(command: impl Into<String>) -> Self {
        RelayError::NotInstalled(command.into())
    }

    /// Create an execution fault raised while starting the tool
    pub fn execution(tool: impl Into<String>, reason: impl ToString) -> Self {
        RelayError::Execution {
            tool: tool.into(),
            reason: reason.to_string(),
            spawned: false,
        }
    }

    /// Create an execution fault raised while the tool was running
    pub fn execution_after_spawn(tool: impl Into<String>, reason: impl ToString) -> Self {
        RelayError::Execution {
            tool: tool.into(),
            reason: reason.to_string(),
            spawned: true,
        }
    }

    /// Create a session not found error
    pub fn session_not_found(name: impl Into<String>) -> Self {
        RelayError::SessionNotFound(name.into())
    }

    /// Create a configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        RelayError::ConfigError(msg.into())
    }
}
