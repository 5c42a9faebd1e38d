//! Key-value backends
//!
//! `Kv` is the narrow surface the rest of the system needs from the shared
//! store: get/set with optional TTL, set-if-absent (the claim primitive),
//! atomic increment, bounded lists, sets, and prefix scans. `RedisKv` is the
//! production backend; `MemoryKv` is an in-process stand-in with the same
//! TTL semantics, used by the test suites.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    /// Set-if-absent with TTL. Returns true iff the key was newly set.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool>;
    async fn incr(&self, key: &str) -> Result<i64>;
    async fn lpush(&self, key: &str, value: &str) -> Result<()>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<()>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    async fn del(&self, key: &str) -> Result<()>;
    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Production backend over a shared Redis connection manager
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(url: &str) -> std::result::Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        // SET key value NX EX ttl; nil reply means the key already existed
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, 1).await?)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.ltrim::<_, ()>(key, start as isize, stop as isize).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start as isize, stop as isize).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl_secs).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }
}

enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.map(|t| Instant::now() < t).unwrap_or(true)
    }
}

/// In-process backend with TTL bookkeeping, for tests and degraded mode
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(map: &mut HashMap<String, Entry>, key: &str) {
        if let Some(entry) = map.get(key) {
            if !entry.live() {
                map.remove(key);
            }
        }
    }

    fn glob_match(pattern: &str, key: &str) -> bool {
        // Supports the '*' wildcard only, which is all the key layout uses
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 1 {
            return pattern == key;
        }
        let mut rest = key;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                match rest.strip_prefix(part) {
                    Some(r) => rest = r,
                    None => return false,
                }
            } else if i == parts.len() - 1 {
                return rest.ends_with(part);
            } else {
                match rest.find(part) {
                    Some(pos) => rest = &rest[pos + part.len()..],
                    None => return false,
                }
            }
        }
        true
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut map = self.entries.lock().unwrap();
        Self::prune(&mut map, key);
        Ok(map.get(key).and_then(|e| match &e.value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.entries.lock().unwrap();
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut map = self.entries.lock().unwrap();
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut map = self.entries.lock().unwrap();
        Self::prune(&mut map, key);
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut map = self.entries.lock().unwrap();
        Self::prune(&mut map, key);
        let current = map
            .get(key)
            .and_then(|e| match &e.value {
                Value::Str(s) => s.parse::<i64>().ok(),
                _ => None,
            })
            .unwrap_or(0);
        let next = current + 1;
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(next.to_string()),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.entries.lock().unwrap();
        Self::prune(&mut map, key);
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        if let Value::List(list) = &mut entry.value {
            list.push_front(value.to_string());
        }
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<()> {
        let mut map = self.entries.lock().unwrap();
        if let Some(Entry {
            value: Value::List(list),
            ..
        }) = map.get_mut(key)
        {
            let len = list.len() as i64;
            let stop = if stop < 0 { len + stop } else { stop };
            let keep = ((stop + 1).clamp(0, len)) as usize;
            let skip = start.clamp(0, len) as usize;
            *list = list
                .iter()
                .skip(skip)
                .take(keep.saturating_sub(skip))
                .cloned()
                .collect();
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut map = self.entries.lock().unwrap();
        Self::prune(&mut map, key);
        if let Some(Entry {
            value: Value::List(list),
            ..
        }) = map.get(key)
        {
            let len = list.len() as i64;
            let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
            if stop < start {
                return Ok(Vec::new());
            }
            Ok(list
                .iter()
                .skip(start.max(0) as usize)
                .take((stop - start + 1) as usize)
                .cloned()
                .collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut map = self.entries.lock().unwrap();
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        if let Value::Set(set) = &mut entry.value {
            set.insert(member.to_string());
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let map = self.entries.lock().unwrap();
        if let Some(Entry {
            value: Value::Set(set),
            ..
        }) = map.get(key)
        {
            Ok(set.iter().cloned().collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut map = self.entries.lock().unwrap();
        map.retain(|_, e| e.live());
        Ok(map
            .keys()
            .filter(|k| Self::glob_match(pattern, k))
            .cloned()
            .collect())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        let mut map = self.entries.lock().unwrap();
        if let Some(entry) = map.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut map = self.entries.lock().unwrap();
        Self::prune(&mut map, key);
        Ok(map.contains_key(key))
    }
}
