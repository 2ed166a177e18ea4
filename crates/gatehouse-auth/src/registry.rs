//! Session registry
//!
//! The server-side store of record for "is this identity currently logged
//! in". Tokens are stateless; a session entry here is what keeps them
//! honoured.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::token::ClaimType;

/// Session state held for one logged-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub claim_type: ClaimType,
    pub super_user: bool,
}

/// Session fields supplied by the caller; the registry generates the id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub claim_type: ClaimType,
    pub super_user: bool,
}

/// Registry-level failures. `NotFound` is a normal outcome (never logged
/// in, evicted, or expired); `Backend` is infrastructure trouble and must
/// not be conflated with it.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Session not found")]
    NotFound,

    #[error("Session store backend error: {0}")]
    Backend(String),
}

/// Capability set for session lifecycle management.
///
/// The in-memory implementation below is the only one shipped; the trait
/// is the seam where a shared or persistent backend would plug in.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session under a freshly generated unguessable id and
    /// return that id.
    async fn add(&self, session: NewSession) -> Result<String, RegistryError>;

    /// Fetch a live session. Reading never extends the TTL.
    async fn get(&self, session_id: &str) -> Result<Session, RegistryError>;

    /// Replace the stored value for `session.id`. Writing to an id that
    /// has expired or been evicted re-creates the entry with a fresh TTL
    /// (tolerant upsert).
    async fn update(&self, session: Session) -> Result<(), RegistryError>;

    /// Remove a session. Evicting an id that is already gone is not an
    /// error.
    async fn evict(&self, session_id: &str) -> Result<(), RegistryError>;
}

const SHARD_COUNT: usize = 16;

struct Entry {
    session: Session,
    expires_at: Instant,
}

/// In-memory `SessionStore` over sharded hash maps with a uniform TTL
/// fixed at construction.
pub struct InMemorySessionStore {
    shards: Vec<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards, ttl }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, Entry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Drop expired entries and return how many were removed.
    ///
    /// Reads already treat expired entries as absent; the sweep reclaims
    /// the memory of sessions that are never read again.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        for shard in &self.shards {
            let mut map = shard.write();
            let before = map.len();
            map.retain(|_, entry| entry.expires_at > now);
            purged += before - map.len();
        }
        purged
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .filter(|entry| entry.expires_at > now)
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn add(&self, session: NewSession) -> Result<String, RegistryError> {
        let id = Uuid::new_v4().to_string();
        let entry = Entry {
            session: Session {
                id: id.clone(),
                user_id: session.user_id,
                claim_type: session.claim_type,
                super_user: session.super_user,
            },
            expires_at: Instant::now() + self.ttl,
        };
        self.shard(&id).write().insert(id.clone(), entry);
        Ok(id)
    }

    async fn get(&self, session_id: &str) -> Result<Session, RegistryError> {
        let shard = self.shard(session_id).read();
        match shard.get(session_id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.session.clone()),
            _ => Err(RegistryError::NotFound),
        }
    }

    async fn update(&self, session: Session) -> Result<(), RegistryError> {
        let id = session.id.clone();
        let entry = Entry {
            session,
            expires_at: Instant::now() + self.ttl,
        };
        self.shard(&id).write().insert(id, entry);
        Ok(())
    }

    async fn evict(&self, session_id: &str) -> Result<(), RegistryError> {
        self.shard(session_id).write().remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn new_session(user_id: &str) -> NewSession {
        NewSession {
            user_id: user_id.to_string(),
            claim_type: ClaimType::Internal,
            super_user: false,
        }
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));

        let id = store.add(new_session("user-1")).await.unwrap();
        let session = store.get(&id).await.unwrap();

        assert_eq!(session.id, id);
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.claim_type, ClaimType::Internal);
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));

        assert!(matches!(
            store.get("no-such-session").await,
            Err(RegistryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_evict_is_idempotent() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));

        let id = store.add(new_session("user-1")).await.unwrap();
        store.evict(&id).await.unwrap();
        store.evict(&id).await.unwrap();

        assert!(matches!(store.get(&id).await, Err(RegistryError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_replaces_value() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));

        let id = store.add(new_session("user-1")).await.unwrap();
        let mut session = store.get(&id).await.unwrap();
        session.super_user = true;
        store.update(session).await.unwrap();

        assert!(store.get(&id).await.unwrap().super_user);
    }

    #[tokio::test]
    async fn test_update_missing_id_upserts() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));

        let session = Session {
            id: "evicted-earlier".to_string(),
            user_id: "user-1".to_string(),
            claim_type: ClaimType::Internal,
            super_user: false,
        };
        store.update(session.clone()).await.unwrap();

        assert_eq!(store.get("evicted-earlier").await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_expired_session_is_gone() {
        let store = InMemorySessionStore::new(Duration::from_millis(10));

        let id = store.add(new_session("user-1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(store.get(&id).await, Err(RegistryError::NotFound)));
    }

    #[tokio::test]
    async fn test_purge_expired_reclaims_entries() {
        let store = InMemorySessionStore::new(Duration::from_millis(10));

        for i in 0..8 {
            store.add(new_session(&format!("user-{i}"))).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.purge_expired(), 8);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_adds_produce_distinct_ids() {
        let store = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));

        let mut handles = Vec::new();
        for i in 0..1000 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add(new_session(&format!("user-{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 1000);
        for id in &ids {
            assert!(store.get(id).await.is_ok());
        }
    }
}
