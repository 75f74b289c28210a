//! Key/value store abstraction
//!
//! Handlers talk to the [`Store`] trait rather than to a Redis connection directly.
//! [`RedisStore`] is the production backend; [`MemoryStore`] implements the same
//! semantics in-process for tests and for running without a Redis server.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use crate::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Seconds in one day, for TTL arithmetic
pub const DAY_SECS: u64 = 24 * 60 * 60;

/// The subset of Redis commands used by Yaktoon
#[async_trait]
pub trait Store: Send + Sync {
    // Strings
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    // Keys
    /// Returns true when the key existed
    async fn del(&self, key: &str) -> Result<bool>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Returns false when the key does not exist
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool>;
    /// Glob match over key names (`*` and `?`)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    // Hashes
    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<()>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    /// Empty map when the key does not exist
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    // Sets
    /// Returns true when the member was newly added
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool>;

    // Sorted sets
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    // Lists
    async fn lpush(&self, key: &str, value: &str) -> Result<i64>;
    async fn rpush(&self, key: &str, value: &str) -> Result<i64>;
    /// Inclusive range; negative indexes count from the tail
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;
    /// count > 0 removes from head, count < 0 from tail, 0 removes all
    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<i64>;
    async fn llen(&self, key: &str) -> Result<i64>;
    async fn lindex(&self, key: &str, index: isize) -> Result<Option<String>>;

    // Server
    async fn flushdb(&self) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

impl<'a> dyn Store + 'a {
    /// Read a JSON string value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write a value as JSON without expiry
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }

    /// Write a value as JSON with a TTL
    pub async fn set_json_ex<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_ex(key, &raw, ttl_secs).await
    }

    /// Write every entry of a map into a hash
    pub async fn hset_map(&self, key: &str, map: &HashMap<String, String>) -> Result<()> {
        let fields: Vec<(&str, String)> = map.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        if fields.is_empty() {
            return Ok(());
        }
        self.hset(key, &fields).await
    }

    /// Entire list, head first
    pub async fn lall(&self, key: &str) -> Result<Vec<String>> {
        self.lrange(key, 0, -1).await
    }
}
