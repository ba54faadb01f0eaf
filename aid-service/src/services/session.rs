use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client};
use std::time::Duration;
use tokio::time::Instant;

/// Identity key -> current session token, with a per-entry TTL.
///
/// Operations on one key are atomic; the last `set` wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, identity_key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, identity_key: &str, token: &str, ttl: Duration)
        -> Result<(), anyhow::Error>;
    /// Removing an absent key is a no-op.
    async fn delete(&self, identity_key: &str) -> Result<(), anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone)]
struct SessionEntry {
    token: String,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process session store on a sharded concurrent map.
///
/// Deadlines use the tokio clock so paused-time tests can age entries.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, SessionEntry>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, identity_key: &str) -> Result<Option<String>, anyhow::Error> {
        let now = Instant::now();
        match self.entries.get(identity_key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.token.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        // Only evict if nobody renewed the entry in between.
        self.entries
            .remove_if(identity_key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(
        &self,
        identity_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), anyhow::Error> {
        self.entries.insert(
            identity_key.to_string(),
            SessionEntry {
                token: token.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, identity_key: &str) -> Result<(), anyhow::Error> {
        self.entries.remove(identity_key);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// Redis-backed session store; entries expire through `SET ... EX`.
#[derive(Clone)]
pub struct RedisSessionStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn new(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis session store");
        let client = Client::open(url)?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis session store");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    fn key(identity_key: &str) -> String {
        format!("session:{}", identity_key)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, identity_key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(Self::key(identity_key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read session: {}", e))
    }

    async fn set(
        &self,
        identity_key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(identity_key))
            .arg(token)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store session: {}", e))
    }

    async fn delete(&self, identity_key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _removed: i64 = redis::cmd("DEL")
            .arg(Self::key(identity_key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete session: {}", e))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}
