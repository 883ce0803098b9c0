//! Session manager for tracking named sessions
//!
//! Uses DashMap for concurrent access with entry API to avoid deadlocks.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{RelayError, Result, ToolRegistry};

use super::launcher::{ProcessLauncher, SystemLauncher};
use super::session::Session;

/// Longest accepted session name
pub const MAX_SESSION_NAME_LEN: usize = 32;

/// Check that `name` is 1-32 letters, digits, hyphens or underscores
pub fn validate_session_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_SESSION_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(RelayError::InvalidSessionName(name.to_string()))
    }
}

/// Manager for named sessions
///
/// Provides thread-safe session storage and lookup using DashMap. Every
/// session it creates shares the same tool registry and launcher.
#[derive(Debug)]
pub struct SessionManager {
    registry: ToolRegistry,
    launcher: Arc<dyn ProcessLauncher>,
    /// Active sessions keyed by name
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionManager {
    /// Create a manager whose sessions launch real processes
    pub fn new(registry: ToolRegistry) -> Self {
        Self::with_launcher(registry, Arc::new(SystemLauncher))
    }

    /// Create a manager with a custom spawn primitive
    pub fn with_launcher(registry: ToolRegistry, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            registry,
            launcher,
            sessions: DashMap::new(),
        }
    }

    /// The tools sessions can be created for
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Create a new session and store it
    ///
    /// Fails when the name is invalid or taken, or the tool is unknown.
    pub fn create_session(
        &self,
        name: &str,
        tool_id: &str,
        cwd: impl Into<PathBuf>,
    ) -> Result<Arc<Session>> {
        validate_session_name(name)?;
        let tool = self.registry.get_or_error(tool_id)?;

        // Use entry API to atomically check and insert
        match self.sessions.entry(name.to_string()) {
            dashmap::Entry::Occupied(_) => Err(RelayError::SessionAlreadyExists(name.to_string())),
            dashmap::Entry::Vacant(vacant) => {
                let session = Arc::new(Session::with_launcher(
                    tool,
                    cwd,
                    Arc::clone(&self.launcher),
                ));
                vacant.insert(Arc::clone(&session));
                tracing::info!(session = %name, tool = %tool_id, "Session created");
                Ok(session)
            }
        }
    }

    /// Get an existing session
    pub fn get_session(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.get(name).map(|r| Arc::clone(&r))
    }

    /// Get an existing session or return SessionNotFound error
    pub fn get_session_or_error(&self, name: &str) -> Result<Arc<Session>> {
        self.get_session(name)
            .ok_or_else(|| RelayError::session_not_found(name))
    }

    /// Remove a session, killing its running process first
    pub async fn remove_session(&self, name: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(name)?;
        session.cleanup().await;
        tracing::info!(session = %name, "Session removed");
        Some(session)
    }

    /// Check if a session exists
    pub fn has_session(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// Get the number of sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Get all session names in sorted order
    pub fn session_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Remove every session, cleaning each one up
    ///
    /// Returns how many sessions had a process that needed killing.
    pub async fn cleanup_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        self.sessions.clear();

        let mut killed = 0;
        for session in sessions {
            if session.cleanup().await {
                killed += 1;
            }
        }
        if killed > 0 {
            tracing::info!(killed, "Stopped running tool processes during shutdown");
        }
        killed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn manager() -> SessionManager {
        SessionManager::new(ToolRegistry::builtin(Duration::from_secs(5)))
    }

    #[test]
    fn test_validate_session_name() {
        assert!(validate_session_name("work").is_ok());
        assert!(validate_session_name("my_session-2").is_ok());
        assert!(validate_session_name(&"a".repeat(MAX_SESSION_NAME_LEN)).is_ok());

        assert!(validate_session_name("").is_err());
        assert!(validate_session_name("has space").is_err());
        assert!(validate_session_name("dots.not.ok").is_err());
        assert!(validate_session_name("ünïcode").is_err());
        assert!(matches!(
            validate_session_name(&"a".repeat(MAX_SESSION_NAME_LEN + 1)),
            Err(RelayError::InvalidSessionName(_))
        ));
    }

    #[test]
    fn test_manager_create_session() {
        let manager = manager();

        let session = manager.create_session("work", "claude", "/tmp").unwrap();

        assert_eq!(session.tool().id, "claude");
        assert_eq!(session.cwd(), std::path::Path::new("/tmp"));
        assert_eq!(manager.session_count(), 1);
        assert!(manager.has_session("work"));
    }

    #[test]
    fn test_manager_rejects_bad_input() {
        let manager = manager();

        let err = manager.create_session("bad name", "claude", "/tmp").unwrap_err();
        assert!(matches!(err, RelayError::InvalidSessionName(_)));

        let err = manager.create_session("work", "codex", "/tmp").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown CLI: 'codex'. Available: claude, gemini, opencode"
        );
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_manager_duplicate_session() {
        let manager = manager();
        manager.create_session("work", "claude", "/tmp").unwrap();

        let duplicate = manager.create_session("work", "gemini", "/tmp");
        assert!(matches!(duplicate, Err(RelayError::SessionAlreadyExists(_))));
        assert_eq!(manager.get_session("work").unwrap().tool().id, "claude");
    }

    #[test]
    fn test_manager_get_session_or_error() {
        let manager = manager();
        manager.create_session("work", "claude", "/tmp").unwrap();

        assert!(manager.get_session_or_error("work").is_ok());
        assert!(manager.get_session("missing").is_none());
        assert!(matches!(
            manager.get_session_or_error("missing"),
            Err(RelayError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_manager_session_names_sorted() {
        let manager = manager();
        manager.create_session("zeta", "claude", "/tmp").unwrap();
        manager.create_session("alpha", "gemini", "/tmp").unwrap();

        assert_eq!(manager.session_names(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_manager_remove_session() {
        let manager = manager();
        manager.create_session("work", "claude", "/tmp").unwrap();

        let removed = manager.remove_session("work").await;
        assert!(removed.is_some());
        assert!(!manager.has_session("work"));
        assert!(manager.remove_session("work").await.is_none());
    }

    #[tokio::test]
    async fn test_manager_cleanup_all_idle() {
        let manager = manager();
        manager.create_session("one", "claude", "/tmp").unwrap();
        manager.create_session("two", "gemini", "/tmp").unwrap();

        assert_eq!(manager.cleanup_all().await, 0);
        assert_eq!(manager.session_count(), 0);
    }
}
