//! Session persistence.
//!
//! The controller never persists itself: the HTTP host loads a snapshot,
//! restores a controller from it, and saves it back at defined checkpoints
//! (after initialize, after each answer, after evaluation).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interview::evaluation::EvaluationReport;
use crate::interview::session::SessionState;

const KEY_PREFIX: &str = "interview:session:";

/// Everything needed to resume a session: the controller state and its final report, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<EvaluationReport>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<SessionSnapshot>, StoreError>;
    async fn save(&self, id: Uuid, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    /// Removes the session. Clearing an unknown id is not an error.
    async fn clear(&self, id: Uuid) -> Result<(), StoreError>;
}

// ─── In-memory ────────────────────────────────────────────────────────────────

/// Process-local store. Sessions are lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionSnapshot>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: Uuid) -> Result<Option<SessionSnapshot>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn save(&self, id: Uuid, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, snapshot.clone());
        Ok(())
    }

    async fn clear(&self, id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
        Ok(())
    }
}

// ─── Redis ────────────────────────────────────────────────────────────────────

/// JSON snapshots under `interview:session:<id>` with a sliding TTL.
pub struct RedisSessionStore {
    client: redis::Client,
    ttl: Duration,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }
}

fn session_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}{id}")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: Uuid) -> Result<Option<SessionSnapshot>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(session_key(id))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, id: Uuid, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(session_key(id))
            .arg(json)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("DEL")
            .arg(session_key(id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
