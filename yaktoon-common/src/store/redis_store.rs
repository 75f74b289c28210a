//! Redis-backed store

use super::Store;
use crate::Result;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tracing::info;

/// Store backed by a multiplexed, auto-reconnecting Redis connection
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Open a connection manager for `redis_url`
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(redis_url)?;
        let conn = client.get_connection_manager_with_config(config).await?;

        info!("✓ Connected to Redis");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _: () = self.conn().set(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let _: () = self.conn().set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.conn().del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let found: bool = self.conn().exists(key).await?;
        Ok(found)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let applied: bool = self.conn().expire(key, i64::try_from(ttl_secs).unwrap_or(i64::MAX)).await?;
        Ok(applied)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self.conn().keys(pattern).await?;
        Ok(keys)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let _: () = self.conn().hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn().hget(key, field).await?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let map: HashMap<String, String> = self.conn().hgetall(key).await?;
        Ok(map)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let value: i64 = self.conn().hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let added: i64 = self.conn().sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let removed: i64 = self.conn().srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let members: Vec<String> = self.conn().smembers(key).await?;
        Ok(members)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let found: bool = self.conn().sismember(key, member).await?;
        Ok(found)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let _: i64 = self.conn().zadd(key, member, score).await?;
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64> {
        let len: i64 = self.conn().lpush(key, value).await?;
        Ok(len)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<i64> {
        let len: i64 = self.conn().rpush(key, value).await?;
        Ok(len)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let items: Vec<String> = self.conn().lrange(key, start, stop).await?;
        Ok(items)
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<i64> {
        let removed: i64 = self.conn().lrem(key, count, value).await?;
        Ok(removed)
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        let len: i64 = self.conn().llen(key).await?;
        Ok(len)
    }

    async fn lindex(&self, key: &str, index: isize) -> Result<Option<String>> {
        let item: Option<String> = self.conn().lindex(key, index).await?;
        Ok(item)
    }

    async fn flushdb(&self) -> Result<()> {
        let mut conn = self.conn();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
