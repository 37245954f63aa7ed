//! Session persistence boundary.
//!
//! The engine only needs three operations from a backend: load, save and
//! destroy, keyed by conversation id. [`MemoryStore`] is the in-process
//! reference implementation, useful for tests and single-node bots.
//!
//! # Contract
//!
//! | Method | Not found | Failure |
//! |--------|-----------|---------|
//! | [`get`](SessionStore::get) | empty [`Session`] | I/O errors only |
//! | [`set`](SessionStore::set) | n/a | logged by the caller, never turned into a reply |
//! | [`destroy`](SessionStore::destroy) | no-op | I/O errors only |

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreResult;
use crate::session::Session;

/// A key-value backend for [`Session`]s.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Loads the session for `id`, or an empty one when none is stored.
    async fn get(&self, id: &str) -> StoreResult<Session>;

    /// Persists the session for `id`.
    async fn set(&self, id: &str, session: &Session) -> StoreResult<()>;

    /// Removes any stored state for `id`.
    async fn destroy(&self, id: &str) -> StoreResult<()>;
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Session> {
        Ok(self.sessions.read().get(id).cloned().unwrap_or_default())
    }

    async fn set(&self, id: &str, session: &Session) -> StoreResult<()> {
        self.sessions.write().insert(id.to_string(), session.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> StoreResult<()> {
        self.sessions.write().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_session_is_empty() {
        let store = MemoryStore::new();
        let session = store.get("nobody").await.unwrap();
        assert!(session.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_get_destroy() {
        let store = MemoryStore::new();
        let mut session = Session::new();
        session.set("name", "alice");
        session.wait.wait("_reply_intro");

        store.set("u1", &session).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("u1").await.unwrap(), session);

        store.destroy("u1").await.unwrap();
        assert!(store.get("u1").await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_shared_store_sees_writes() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let writer = Arc::clone(&store);
        tokio_test::block_on(async {
            let mut session = Session::new();
            session.set("lang", "fr");
            tokio_test::assert_ok!(writer.set("u1", &session).await);

            let read = tokio_test::assert_ok!(store.get("u1").await);
            assert_eq!(read.get::<String>("lang").as_deref(), Some("fr"));
        });
    }
}
