//! Migration session store.
//!
//! An explicit key/value interface so the in-memory implementation can be
//! swapped for a persistent one without changing the engine's contract.
//! The in-memory store loses all sessions on process restart by design;
//! completed blob and catalog side effects stay durable, only the
//! bookkeeping (progress, manifest) is volatile.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use pictor_core::{DomainResult, MigrationId, MigrationSession};

/// Session transition closure: mutates the session and reports whether the
/// intended transition applied.
pub type SessionUpdate = Box<dyn FnOnce(&mut MigrationSession) -> bool + Send>;

/// Keyed store of migration sessions, safe for concurrent access from
/// transfer workers and progress-polling callers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: MigrationSession) -> DomainResult<()>;

    async fn get(&self, id: MigrationId) -> DomainResult<Option<MigrationSession>>;

    /// Apply `update` to the session under the store's write guard.
    /// Returns false when the session does not exist or the closure
    /// reported the transition as not applicable.
    async fn update(&self, id: MigrationId, update: SessionUpdate) -> DomainResult<bool>;

    async fn list(&self) -> DomainResult<Vec<MigrationSession>>;

    async fn remove(&self, id: MigrationId) -> DomainResult<bool>;
}

/// In-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<MigrationId, MigrationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: MigrationSession) -> DomainResult<()> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: MigrationId) -> DomainResult<Option<MigrationSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn update(&self, id: MigrationId, update: SessionUpdate) -> DomainResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) => Ok(update(session)),
            None => Ok(false),
        }
    }

    async fn list(&self) -> DomainResult<Vec<MigrationSession>> {
        let mut sessions: Vec<MigrationSession> =
            self.sessions.read().await.values().cloned().collect();
        // Newest first.
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn remove(&self, id: MigrationId) -> DomainResult<bool> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictor_core::{MigrationConfig, MigrationStatus};

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemorySessionStore::new();
        let session = MigrationSession::new(MigrationConfig::default());
        let id = session.id;

        store.put(session).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, MigrationStatus::Created);
    }

    #[tokio::test]
    async fn test_update_missing_session_is_false() {
        let store = InMemorySessionStore::new();
        let applied = store
            .update(uuid::Uuid::new_v4(), Box::new(|_| true))
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let store = InMemorySessionStore::new();
        let session = MigrationSession::new(MigrationConfig::default());
        let id = session.id;
        store.put(session).await.unwrap();

        // A Created session is not pausable.
        let applied = store
            .update(
                id,
                Box::new(|s| {
                    if s.status == MigrationStatus::Running {
                        s.status = MigrationStatus::Paused;
                        true
                    } else {
                        false
                    }
                }),
            )
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            MigrationStatus::Created
        );
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = InMemorySessionStore::new();
        let mut first = MigrationSession::new(MigrationConfig::default());
        let mut second = MigrationSession::new(MigrationConfig::default());
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(60);
        second.created_at = chrono::Utc::now();
        let (first_id, second_id) = (first.id, second.id);

        store.put(first).await.unwrap();
        store.put(second).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, second_id);
        assert_eq!(listed[1].id, first_id);
    }
}
