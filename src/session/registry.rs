use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::conversation::ConversationSession;

/// Shared handle to one client's session. Held only for the span of a request.
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Owns every conversation session, keyed by client id, plus the set of
/// client ids that currently have an open connection.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    live: Mutex<HashSet<String>>,
    max_history: usize,
}

impl SessionRegistry {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            live: Mutex::new(HashSet::new()),
            max_history,
        }
    }

    /// Session for `client_id`, created on first contact.
    ///
    /// Concurrent callers with the same unseen id all receive the same session.
    pub fn get_or_create(&self, client_id: &str) -> SessionHandle {
        if let Some(existing) = self.sessions.read().get(client_id) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(client_id.to_string())
            .or_insert_with(|| {
                debug!(client_id = %client_id, "Creating conversation session");
                Arc::new(Mutex::new(ConversationSession::new(
                    client_id,
                    self.max_history,
                )))
            })
            .clone()
    }

    pub fn get(&self, client_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(client_id).cloned()
    }

    /// Empty a client's history. A client without a session already has none.
    pub fn clear(&self, client_id: &str) {
        if let Some(session) = self.get(client_id) {
            session.lock().clear();
        }
    }

    /// Drop a client's session entirely
    pub fn remove(&self, client_id: &str) -> bool {
        self.sessions.write().remove(client_id).is_some()
    }

    /// Register an open connection. Returns false if the id is already connected.
    pub fn attach(&self, client_id: &str) -> bool {
        self.live.lock().insert(client_id.to_string())
    }

    /// Deregister a connection, dropping its session unless `retain` is set.
    ///
    /// The session is gone before the id becomes attachable again, so a
    /// reconnecting client never picks up a handle that is about to be dropped.
    pub fn detach(&self, client_id: &str, retain: bool) {
        let mut live = self.live.lock();
        if !retain {
            self.remove(client_id);
        }
        live.remove(client_id);
    }

    /// Drop the session only if no connection currently owns the id
    pub fn drop_if_detached(&self, client_id: &str) -> bool {
        let live = self.live.lock();
        if live.contains(client_id) {
            return false;
        }
        self.remove(client_id)
    }

    pub fn is_live(&self, client_id: &str) -> bool {
        self.live.lock().contains(client_id)
    }

    pub fn live_connections(&self) -> usize {
        self.live.lock().len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = SessionRegistry::new(10);
        let a = registry.get_or_create("c1");
        let b = registry.get_or_create("c1");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new(10);
        registry.get_or_create("c1").lock().append(MessageRole::User, "secret");

        assert!(registry.get_or_create("c2").lock().is_empty());
        assert_eq!(registry.get_or_create("c1").lock().len(), 1);
    }

    #[test]
    fn test_concurrent_creation_yields_one_session() {
        let registry = Arc::new(SessionRegistry::new(10));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create("shared"))
            })
            .collect();

        let sessions: Vec<SessionHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_keeps_session_alive() {
        let registry = SessionRegistry::new(10);
        let session = registry.get_or_create("c1");
        session.lock().append(MessageRole::User, "hello");

        registry.clear("c1");
        assert!(session.lock().is_empty());
        assert!(registry.get("c1").is_some());

        // Unknown client: nothing to clear, nothing created
        registry.clear("ghost");
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn test_attach_rejects_duplicate_connection() {
        let registry = SessionRegistry::new(10);
        assert!(registry.attach("c1"));
        assert!(!registry.attach("c1"));
        assert!(registry.is_live("c1"));

        registry.detach("c1", false);
        assert!(!registry.is_live("c1"));
        assert!(registry.attach("c1"));
    }

    #[test]
    fn test_detach_drops_or_retains_session() {
        let registry = SessionRegistry::new(10);

        registry.attach("drop");
        registry.get_or_create("drop");
        registry.detach("drop", false);
        assert!(registry.get("drop").is_none());

        registry.attach("keep");
        registry.get_or_create("keep");
        registry.detach("keep", true);
        assert!(registry.get("keep").is_some());
        assert_eq!(registry.live_connections(), 0);
    }

    #[test]
    fn test_reattach_never_sees_a_dropped_session() {
        let registry = Arc::new(SessionRegistry::new(10));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut turns = 0;
                    while turns < 500 {
                        if !registry.attach("shared") {
                            std::thread::yield_now();
                            continue;
                        }
                        let session = registry.get_or_create("shared");
                        let current = registry.get("shared").expect("session dropped while attached");
                        assert!(Arc::ptr_eq(&session, &current));
                        registry.detach("shared", false);
                        turns += 1;
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert!(registry.is_empty());
        assert_eq!(registry.live_connections(), 0);
    }

    #[test]
    fn test_drop_if_detached_spares_live_sessions() {
        let registry = SessionRegistry::new(10);

        registry.get_or_create("stale");
        assert!(registry.drop_if_detached("stale"));
        assert!(registry.get("stale").is_none());

        registry.attach("live");
        registry.get_or_create("live");
        assert!(!registry.drop_if_detached("live"));
        assert!(registry.get("live").is_some());
    }
}
