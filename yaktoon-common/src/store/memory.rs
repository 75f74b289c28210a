//! In-process store with Redis semantics
//!
//! Keys expire lazily on access. Empty collections are removed the way Redis removes
//! them, so `exists` and `keys` agree with a real server.

use super::Store;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
    ZSet(BTreeMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    fn is_empty_collection(&self) -> bool {
        match &self.value {
            Value::Str(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::ZSet(z) => z.is_empty(),
        }
    }
}

fn wrong_type(key: &str) -> Error {
    Error::Store(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// Memory-backed [`Store`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let mut data = self.data.lock().await;
        purge_expired(&mut data);
        data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn purge_expired(data: &mut HashMap<String, Entry>) {
    let now = Instant::now();
    data.retain(|_, entry| !entry.is_expired(now));
}

/// TTLs too large for the clock never expire
fn expiry(ttl_secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(ttl_secs))
}

/// Live entry for `key`, dropping it first if it has expired
fn live<'a>(data: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if data.get(key).map_or(false, |e| e.is_expired(now)) {
        data.remove(key);
    }
    data.get_mut(key)
}

/// Remove `key` when its collection has become empty
fn drop_if_empty(data: &mut HashMap<String, Entry>, key: &str) {
    if data.get(key).map_or(false, Entry::is_empty_collection) {
        data.remove(key);
    }
}

/// Resolve a Redis-style inclusive range into `[start, end)` over `len` items
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, (stop + 1) as usize))
}

/// Glob matching with `*` (any run) and `?` (any single char)
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().await;
        data.insert(key.to_string(), Entry::new(Value::Str(value.to_string())));
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut data = self.data.lock().await;
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: expiry(ttl_secs),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        let existed = live(&mut data, key).is_some();
        data.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        Ok(live(&mut data, key).is_some())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(entry) => {
                entry.expires_at = expiry(ttl_secs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut data = self.data.lock().await;
        purge_expired(&mut data);
        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut data = self.data.lock().await;
        if live(&mut data, key).is_none() {
            data.insert(key.to_string(), Entry::new(Value::Hash(HashMap::new())));
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::Hash(hash), .. }) => {
                for (field, value) in fields {
                    hash.insert(field.to_string(), value.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::Hash(hash), .. }) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::Hash(hash), .. }) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut data = self.data.lock().await;
        if live(&mut data, key).is_none() {
            data.insert(key.to_string(), Entry::new(Value::Hash(HashMap::new())));
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::Hash(hash), .. }) => {
                let current = match hash.get(field) {
                    Some(raw) => raw.parse::<i64>().map_err(|_| {
                        Error::Store("ERR hash value is not an integer".to_string())
                    })?,
                    None => 0,
                };
                let next = current + delta;
                hash.insert(field.to_string(), next.to_string());
                Ok(next)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        if live(&mut data, key).is_none() {
            data.insert(key.to_string(), Entry::new(Value::Set(BTreeSet::new())));
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        let removed = match live(&mut data, key) {
            Some(Entry { value: Value::Set(set), .. }) => set.remove(member),
            Some(_) => return Err(wrong_type(key)),
            None => false,
        };
        drop_if_empty(&mut data, key);
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        }
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut data = self.data.lock().await;
        if live(&mut data, key).is_none() {
            data.insert(key.to_string(), Entry::new(Value::ZSet(BTreeMap::new())));
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::ZSet(zset), .. }) => {
                zset.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64> {
        let mut data = self.data.lock().await;
        if live(&mut data, key).is_none() {
            data.insert(key.to_string(), Entry::new(Value::List(VecDeque::new())));
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => {
                list.push_front(value.to_string());
                Ok(list.len() as i64)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<i64> {
        let mut data = self.data.lock().await;
        if live(&mut data, key).is_none() {
            data.insert(key.to_string(), Entry::new(Value::List(VecDeque::new())));
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => {
                list.push_back(value.to_string());
                Ok(list.len() as i64)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => {
                Ok(match resolve_range(list.len(), start, stop) {
                    Some((from, to)) => list.range(from..to).cloned().collect(),
                    None => Vec::new(),
                })
            }
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<i64> {
        let mut data = self.data.lock().await;
        let removed = match live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => {
                let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() };
                let mut removed = 0usize;
                if count >= 0 {
                    let mut i = 0;
                    while i < list.len() && removed < limit {
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        } else {
                            i += 1;
                        }
                    }
                } else {
                    let mut i = list.len();
                    while i > 0 && removed < limit {
                        i -= 1;
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        }
                    }
                }
                removed as i64
            }
            Some(_) => return Err(wrong_type(key)),
            None => 0,
        };
        drop_if_empty(&mut data, key);
        Ok(removed)
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => Ok(list.len() as i64),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn lindex(&self, key: &str, index: isize) -> Result<Option<String>> {
        let mut data = self.data.lock().await;
        match live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => {
                let len = list.len() as isize;
                let idx = if index < 0 { len + index } else { index };
                if idx < 0 || idx >= len {
                    Ok(None)
                } else {
                    Ok(list.get(idx as usize).cloned())
                }
            }
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn flushdb(&self) -> Result<()> {
        self.data.lock().await.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
