use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use crate::error::{OrchestratorError, Result};

/// Running sessions and their cancellation tokens
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id`. Fails if a session with that id is still running.
    pub fn register(&self, session_id: &str) -> Result<CancellationToken> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if sessions.contains_key(session_id) {
            return Err(OrchestratorError::SessionExists(session_id.to_string()));
        }
        let token = CancellationToken::new();
        sessions.insert(session_id.to_string(), token.clone());
        Ok(token)
    }

    /// Signal cancellation. Returns `false` if no such session is running.
    pub fn cancel(&self, session_id: &str) -> bool {
        let sessions = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match sessions.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id);
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(session_id)
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.active_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = SessionRegistry::new();
        registry.register("a").unwrap();
        assert!(matches!(
            registry.register("a"),
            Err(OrchestratorError::SessionExists(_))
        ));

        registry.remove("a");
        assert!(registry.register("a").is_ok());
    }

    #[test]
    fn test_cancel_signals_token() {
        let registry = SessionRegistry::new();
        let token = registry.register("a").unwrap();

        assert!(registry.cancel("a"));
        assert!(token.is_cancelled());
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn test_active_ids_sorted() {
        let registry = SessionRegistry::new();
        registry.register("b").unwrap();
        registry.register("a").unwrap();
        assert_eq!(registry.active_ids(), vec!["a", "b"]);
        assert!(registry.contains("a"));
    }
}
