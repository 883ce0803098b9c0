//! Tool descriptors and the tool registry
//!
//! A tool is described entirely by data: how to invoke it, whether it
//! prints a JSON record, and which flag (if any) resumes a conversation.
//! Onboarding another CLI means adding a descriptor, not new code paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{RelayError, Result};

/// Default maximum execution duration for built-in tools
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(300);

/// Directory under the user config dir holding relay files
const CONFIG_DIR: &str = "cli-relay";
/// Tool definitions file name
const TOOLS_FILE: &str = "tools.json";

/// Static description of one external AI command-line tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Registry key (e.g. `claude`)
    pub id: String,
    /// Human readable name (e.g. `Claude Code`)
    pub name: String,
    /// Executable name or path
    pub command: String,
    /// Flags appended after `-p <message>`
    pub extra_flags: Vec<String>,
    /// Flag that resumes a prior conversation; `None` means every message
    /// starts a fresh context
    pub resume_flag: Option<String>,
    /// Whether stdout is a single JSON record
    pub structured_output: bool,
    /// Hard limit on one invocation
    pub max_duration: Duration,
}

impl ToolDescriptor {
    /// Create a plain-text tool with no extra flags and no resume support
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            command: command.into(),
            extra_flags: Vec::new(),
            resume_flag: None,
            structured_output: false,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_extra_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resume_flag(mut self, flag: impl Into<String>) -> Self {
        self.resume_flag = Some(flag.into());
        self
    }

    pub fn with_structured_output(mut self, structured: bool) -> Self {
        self.structured_output = structured;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Whether conversations with this tool can be resumed
    pub fn supports_resume(&self) -> bool {
        self.resume_flag.is_some()
    }
}

/// On-disk form of a tool definition
///
/// ```json
/// {
///   "tools": {
///     "claude": {
///       "command": "/opt/claude/bin/claude",
///       "name": "Claude Code",
///       "extraFlags": ["--output-format", "json"],
///       "resumeFlag": "--resume",
///       "jsonOutput": true,
///       "maxTimeoutSecs": 600
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub command: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub extra_flags: Vec<String>,
    #[serde(default)]
    pub resume_flag: Option<String>,
    #[serde(default)]
    pub json_output: bool,
    #[serde(default)]
    pub max_timeout_secs: Option<u64>,
}

impl ToolDefinition {
    fn into_descriptor(self, id: &str, default_duration: Duration) -> ToolDescriptor {
        ToolDescriptor {
            id: id.to_string(),
            name: self.name.unwrap_or_else(|| id.to_string()),
            command: self.command,
            extra_flags: self.extra_flags,
            resume_flag: self.resume_flag.filter(|flag| !flag.is_empty()),
            structured_output: self.json_output,
            max_duration: self
                .max_timeout_secs
                .map_or(default_duration, Duration::from_secs),
        }
    }
}

/// Tool definitions file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsFile {
    #[serde(default)]
    pub tools: BTreeMap<String, ToolDefinition>,
}

/// Registry of known tools keyed by id
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<ToolDescriptor>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools, each limited to `max_duration`
    pub fn builtin(max_duration: Duration) -> Self {
        let mut registry = Self::new();
        registry.insert(
            ToolDescriptor::new("claude", "claude")
                .with_name("Claude Code")
                .with_extra_flags(["--output-format", "json", "--dangerously-skip-permissions"])
                .with_resume_flag("--resume")
                .with_structured_output(true)
                .with_max_duration(max_duration),
        );
        registry.insert(
            ToolDescriptor::new("gemini", "gemini")
                .with_name("Gemini CLI")
                .with_extra_flags(["--yolo"])
                .with_max_duration(max_duration),
        );
        registry.insert(
            ToolDescriptor::new("opencode", "opencode")
                .with_name("OpenCode")
                .with_max_duration(max_duration),
        );
        registry
    }

    /// Built-in tools overlaid with the definitions file, if one exists
    ///
    /// An explicit `path` must exist and parse. Without one, the default
    /// `<config dir>/cli-relay/tools.json` is used when present.
    pub fn load(path: Option<&Path>, max_duration: Duration) -> Result<Self> {
        let mut registry = Self::builtin(max_duration);

        match path {
            Some(path) => {
                let file = Self::read_tools_file(path)?;
                registry.merge_file(file, max_duration);
                tracing::debug!(path = %path.display(), "Loaded tool definitions");
            }
            None => {
                if let Some(path) = Self::default_tools_path().filter(|p| p.exists()) {
                    match Self::read_tools_file(&path) {
                        Ok(file) => {
                            registry.merge_file(file, max_duration);
                            tracing::debug!(path = %path.display(), "Loaded tool definitions");
                        }
                        Err(e) => {
                            tracing::warn!("Failed to load tools file {:?}: {}", path, e);
                        }
                    }
                }
            }
        }

        Ok(registry)
    }

    /// Default location of the tool definitions file
    pub fn default_tools_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(CONFIG_DIR).join(TOOLS_FILE))
    }

    fn read_tools_file(path: &Path) -> Result<ToolsFile> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config_error(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Add or replace the tools defined in `file`
    pub fn merge_file(&mut self, file: ToolsFile, default_duration: Duration) {
        for (id, definition) in file.tools {
            let descriptor = definition.into_descriptor(&id, default_duration);
            self.insert(descriptor);
        }
    }

    /// Add or replace a tool
    pub fn insert(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.id.clone(), Arc::new(descriptor));
    }

    /// Look up a tool by id
    pub fn get(&self, id: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools.get(id).cloned()
    }

    /// Look up a tool or return an `UnknownTool` error listing the choices
    pub fn get_or_error(&self, id: &str) -> Result<Arc<ToolDescriptor>> {
        self.get(id).ok_or_else(|| RelayError::UnknownTool {
            name: id.to_string(),
            available: self.ids().join(", "),
        })
    }

    /// All tool ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
