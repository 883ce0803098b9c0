//! Public types for the CLI relay
//!
//! This module contains the shared types used across the crate.

mod config;
mod error;
mod tool;

pub use config::RelayConfig;
pub use error::{ErrorCode, RelayError, Result};
pub use tool::{DEFAULT_MAX_DURATION, ToolDefinition, ToolDescriptor, ToolRegistry, ToolsFile};
