use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{errors::StoreError, models::UserId};

/// Namespace prefix for every session key.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Builds the store key for a session token.
pub fn session_key(token: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{token}")
}

// 1. SessionStore Contract
/// SessionStore
///
/// The key/value contract the session manager needs from its backing store. Each call is
/// a single atomic operation on one key; the store owns the token → identity mapping and
/// its expiration.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Bind `key` to `user_id`, expiring after `ttl`. Overwrites any existing entry.
    async fn set(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<(), StoreError>;

    /// The identity bound to `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<UserId>, StoreError>;

    /// Remaining lifetime of `key`, or `None` if absent. A key with no expiry reports zero.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Reset the expiration of an existing key. Returns false if the key is gone.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// SessionState
///
/// The concrete type used to share the session store across the application state.
pub type SessionState = Arc<dyn SessionStore>;

// 2. The Real Implementation (Redis)
/// RedisSessionStore
///
/// Backed by a multiplexed `ConnectionManager`, which reconnects on its own and is cheap
/// to clone per command.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(user_id)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<UserId>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<UserId> = conn.get(key).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await?;
        // -2: no such key. -1: key without expiry, reported as nothing left.
        match ttl {
            -2 => Ok(None),
            t if t < 0 => Ok(Some(Duration::ZERO)),
            t => Ok(Some(Duration::from_secs(t as u64))),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let updated: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}

// 3. The In-Memory Implementation (Tests and local runs without Redis)
struct SessionEntry {
    user_id: UserId,
    expires_at: Instant,
}

/// InMemorySessionStore
///
/// A `DashMap`-backed store with Redis-like semantics. Expiry is checked lazily on access,
/// and every operation touches a single shard entry, so per-key atomicity matches Redis.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    entries: Arc<DashMap<String, SessionEntry>>,
    /// When true, all operations return a simulated backend failure.
    pub should_fail: bool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of live (unexpired) sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Backend(
                "Mock Session Store Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.entries.insert(
            key.to_string(),
            SessionEntry {
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<UserId>, StoreError> {
        self.check()?;
        let now = Instant::now();
        // remove_if drops the expired entry under the shard lock, like Redis lazy expiry.
        if self.entries.remove_if(key, |_, e| e.expires_at <= now).is_some() {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|e| e.user_id))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.expires_at - now))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check()?;
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut e) if e.expires_at > now => {
                e.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }
}
