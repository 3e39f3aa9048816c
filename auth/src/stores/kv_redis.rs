//! Redis-based TTL store.
//!
//! # Architecture
//!
//! Each entry is one `Redis` string holding the JSON-encoded payload:
//! - **Write**: `SET key value PX ttl_ms` (value and TTL in one command)
//! - **Read**: `GET`
//! - **Consume**: `GETDEL` (atomic get + delete, `Redis` >= 6.2)
//!
//! Expiry is enforced by `Redis` itself, so expired entries are never
//! returned. Keys are used verbatim; callers namespace them
//! (`auth:link:…`, `rate_limit:…`).
//!
//! # Example
//!
//! ```no_run
//! use passlink_auth::providers::KeyValueStore;
//! use passlink_auth::stores::RedisKeyValueStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisKeyValueStore::new("redis://127.0.0.1:6379").await?;
//!
//! store
//!     .put("auth:link:abc", serde_json::json!({"email": "a@x.com"}), chrono::Duration::minutes(15))
//!     .await?;
//!
//! // Exactly one concurrent caller sees the payload
//! let payload = store.get_and_delete("auth:link:abc").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::{KeyValueStore, Lookup};
use chrono::Duration;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json::Value;

/// `Redis`-backed implementation of [`KeyValueStore`].
///
/// # Thread Safety
///
/// This type is `Clone` and can be safely shared across threads.
/// Each clone shares the same `ConnectionManager` (connection pool).
#[derive(Clone)]
pub struct RedisKeyValueStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisKeyValueStore {
    /// Create a new `Redis` store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Connection URL Format
    ///
    /// - TCP: `redis://[:password@]host[:port][/database]`
    /// - TLS: `rediss://[:password@]host[:port][/database]`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `Redis` URL is malformed
    /// - Connection to `Redis` server fails
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::StoreError(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::StoreError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisKeyValueStore initialized successfully");

        Ok(Self { conn_manager })
    }

    /// Build a store on an existing connection manager.
    #[must_use]
    pub const fn from_connection_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn decode(key: &str, bytes: Option<Vec<u8>>) -> Result<Lookup> {
        match bytes {
            Some(bytes) => {
                let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                    tracing::error!(key = %key, error = %e, "Stored entry is not valid JSON");
                    AuthError::SerializationError(e.to_string())
                })?;
                Ok(Lookup::Found(value))
            }
            None => Ok(Lookup::NotFoundOrExpired),
        }
    }
}

impl KeyValueStore for RedisKeyValueStore {
    async fn put(&self, key: &str, payload: Value, ttl: Duration) -> Result<()> {
        let ttl_ms = u64::try_from(ttl.num_milliseconds())
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| AuthError::StoreError(format!("TTL must be positive, got {ttl}")))?;

        let bytes = serde_json::to_vec(&payload)?;

        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .pset_ex(key, bytes, ttl_ms)
            .await
            .map_err(|e| AuthError::StoreError(format!("Failed to store entry: {e}")))?;

        tracing::trace!(key = %key, ttl_ms = ttl_ms, "Stored entry in Redis");

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Lookup> {
        let mut conn = self.conn_manager.clone();
        let bytes: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| AuthError::StoreError(format!("Failed to read entry: {e}")))?;

        Self::decode(key, bytes)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let deleted: i32 = conn
            .del(key)
            .await
            .map_err(|e| AuthError::StoreError(format!("Failed to delete entry: {e}")))?;

        tracing::trace!(key = %key, deleted = deleted, "Deleted entry from Redis");

        Ok(())
    }

    async fn get_and_delete(&self, key: &str) -> Result<Lookup> {
        let mut conn = self.conn_manager.clone();

        // GETDEL is atomic: concurrent consumers get the value at most once
        let bytes: Option<Vec<u8>> = conn
            .get_del(key)
            .await
            .map_err(|e| AuthError::StoreError(format!("Failed to consume entry: {e}")))?;

        Self::decode(key, bytes)
    }
}
