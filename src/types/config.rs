//! Relay configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;

use super::tool::DEFAULT_MAX_DURATION;

/// Default tool id when `DEFAULT_CLI` is not set
pub const DEFAULT_TOOL: &str = "claude";
/// Default number of retries for transient faults
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 2;
/// Default base delay between retries
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Relay configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Tool id to relay to
    /// Environment variable: `DEFAULT_CLI`
    pub default_tool: String,

    /// Maximum duration of one invocation of a built-in tool
    /// Environment variable: `AI_CLI_TIMEOUT` (seconds)
    pub tool_timeout: Duration,

    /// Working directory for sessions
    /// Environment variable: `RELAY_WORKING_DIR`
    pub working_dir: Option<PathBuf>,

    /// Tool definitions file
    /// Environment variable: `RELAY_TOOLS_FILE`
    pub tools_file: Option<PathBuf>,

    /// Retries for transient faults
    /// Environment variable: `RELAY_RETRY_MAX_ATTEMPTS`
    pub retry_max_attempts: u32,

    /// Base delay of the retry backoff
    /// Environment variable: `RELAY_RETRY_BASE_DELAY_MS`
    pub retry_base_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_tool: DEFAULT_TOOL.to_string(),
            tool_timeout: DEFAULT_MAX_DURATION,
            working_dir: None,
            tools_file: None,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Empty values count as unset. Values that fail to parse fall back to
    /// the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let tool_timeout = get("AI_CLI_TIMEOUT")
            .and_then(|v| parse_or_warn::<u64>("AI_CLI_TIMEOUT", &v))
            .map_or(defaults.tool_timeout, Duration::from_secs);

        let retry_max_attempts = get("RELAY_RETRY_MAX_ATTEMPTS")
            .and_then(|v| parse_or_warn::<u32>("RELAY_RETRY_MAX_ATTEMPTS", &v))
            .unwrap_or(defaults.retry_max_attempts);

        let retry_base_delay = get("RELAY_RETRY_BASE_DELAY_MS")
            .and_then(|v| parse_or_warn::<u64>("RELAY_RETRY_BASE_DELAY_MS", &v))
            .map_or(defaults.retry_base_delay, Duration::from_millis);

        Self {
            default_tool: get("DEFAULT_CLI").unwrap_or(defaults.default_tool),
            tool_timeout,
            working_dir: get("RELAY_WORKING_DIR").map(PathBuf::from),
            tools_file: get("RELAY_TOOLS_FILE").map(PathBuf::from),
            retry_max_attempts,
            retry_base_delay,
        }
    }

    /// Working directory for sessions, falling back to the process cwd
    pub fn resolve_working_dir(&self) -> std::io::Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::from_lookup(lookup(&[]));
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.default_tool, "claude");
        assert_eq!(config.tool_timeout, Duration::from_secs(300));
        assert!(config.working_dir.is_none());
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("DEFAULT_CLI", "gemini"),
            ("AI_CLI_TIMEOUT", "45"),
            ("RELAY_WORKING_DIR", "/srv/project"),
            ("RELAY_TOOLS_FILE", "/etc/cli-relay/tools.json"),
            ("RELAY_RETRY_MAX_ATTEMPTS", "0"),
            ("RELAY_RETRY_BASE_DELAY_MS", "250"),
        ]));

        assert_eq!(config.default_tool, "gemini");
        assert_eq!(config.tool_timeout, Duration::from_secs(45));
        assert_eq!(config.working_dir, Some(PathBuf::from("/srv/project")));
        assert_eq!(
            config.tools_file,
            Some(PathBuf::from("/etc/cli-relay/tools.json"))
        );
        assert_eq!(config.retry_max_attempts, 0);
        assert_eq!(config.retry_base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_and_empty_values_fall_back() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("DEFAULT_CLI", "   "),
            ("AI_CLI_TIMEOUT", "five minutes"),
            ("RELAY_RETRY_MAX_ATTEMPTS", "-1"),
        ]));
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_resolve_working_dir() {
        let config = RelayConfig {
            working_dir: Some(PathBuf::from("/tmp")),
            ..Default::default()
        };
        assert_eq!(config.resolve_working_dir().unwrap(), PathBuf::from("/tmp"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: serialized with every other test that touches the environment
        unsafe {
            std::env::set_var("DEFAULT_CLI", "opencode");
            std::env::set_var("AI_CLI_TIMEOUT", "10");
        }
        let config = RelayConfig::from_env();
        unsafe {
            std::env::remove_var("DEFAULT_CLI");
            std::env::remove_var("AI_CLI_TIMEOUT");
        }

        assert_eq!(config.default_tool, "opencode");
        assert_eq!(config.tool_timeout, Duration::from_secs(10));
    }
}
