//! Registry client
//!
//! Thin asynchronous facade over the key/value store (Redis) that backs
//! almost every endpoint. Exposes exactly the operations the handlers need:
//! `get/set/del/exists/expire/ttl`, set ops `sadd/srem/smembers`, hash op
//! `hgetall`, list op `lrange`, plus a `connected` predicate. Storage engine
//! choices, replication, and persistence are the driver's concern, not the
//! API's.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Backend contract the handlers depend on. A trait at this seam lets tests
/// substitute an in-memory fake instead of a live Redis connection.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn del(&self, key: &str) -> anyhow::Result<()>;
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
    async fn expire(&self, key: &str, seconds: i64) -> anyhow::Result<()>;
    async fn ttl(&self, key: &str) -> anyhow::Result<i64>;
    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()>;
    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()>;
    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>>;
    async fn hgetall(&self, key: &str) -> anyhow::Result<Vec<(String, String)>>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>>;
    async fn connected(&self) -> bool;
    async fn close(&self);
}

/// Redis-backed registry client. Holds a multiplexed [`ConnectionManager`]
/// which reconnects transparently and is cheap to clone, mirroring the way
/// the rest of the process treats its backend handles as shareable.
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
}

impl RedisRegistry {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Registry for RedisRegistry {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn expire(&self, key: &str, seconds: i64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, seconds).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.ttl(key).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn hgetall(&self, key: &str) -> anyhow::Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let map: std::collections::HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map.into_iter().collect())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start, stop).await?)
    }

    async fn connected(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }

    /// The multiplexed connection manager has no explicit teardown call of
    /// its own; it stops reconnecting once every clone is dropped. Nothing
    /// to do here beyond giving shutdown a named step to call.
    async fn close(&self) {}
}

#[cfg(test)]
pub mod fake {
    //! In-memory [`Registry`] used by handler tests. Mirrors Redis
    //! semantics closely enough for this API's purposes: TTLs count down
    //! only when explicitly advanced, sets and hashes are unordered.
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeRegistry {
        strings: Mutex<HashMap<String, String>>,
        sets: Mutex<HashMap<String, HashSet<String>>>,
        hashes: Mutex<HashMap<String, HashMap<String, String>>>,
        lists: Mutex<HashMap<String, Vec<String>>>,
        ttls: Mutex<HashMap<String, i64>>,
        pub online: std::sync::atomic::AtomicBool,
    }

    impl FakeRegistry {
        pub fn new() -> Self {
            let f = Self::default();
            f.online.store(true, std::sync::atomic::Ordering::SeqCst);
            f
        }
    }

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.strings.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.strings
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&self, key: &str) -> anyhow::Result<()> {
            self.strings.lock().unwrap().remove(key);
            self.hashes.lock().unwrap().remove(key);
            self.lists.lock().unwrap().remove(key);
            self.sets.lock().unwrap().remove(key);
            self.ttls.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> anyhow::Result<bool> {
            Ok(self.strings.lock().unwrap().contains_key(key)
                || self.hashes.lock().unwrap().contains_key(key)
                || self.lists.lock().unwrap().contains_key(key))
        }

        async fn expire(&self, key: &str, seconds: i64) -> anyhow::Result<()> {
            self.ttls.lock().unwrap().insert(key.to_string(), seconds);
            Ok(())
        }

        async fn ttl(&self, key: &str) -> anyhow::Result<i64> {
            Ok(*self.ttls.lock().unwrap().get(key).unwrap_or(&-1))
        }

        async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
            self.sets
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string());
            Ok(())
        }

        async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
            if let Some(set) = self.sets.lock().unwrap().get_mut(key) {
                set.remove(member);
            }
            Ok(())
        }

        async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
            Ok(self
                .sets
                .lock()
                .unwrap()
                .get(key)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default())
        }

        async fn hgetall(&self, key: &str) -> anyhow::Result<Vec<(String, String)>> {
            Ok(self
                .hashes
                .lock()
                .unwrap()
                .get(key)
                .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default())
        }

        async fn lrange(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>> {
            let lists = self.lists.lock().unwrap();
            let Some(list) = lists.get(key) else {
                return Ok(Vec::new());
            };
            let len = list.len() as isize;
            let norm = |i: isize| -> isize {
                if i < 0 {
                    (len + i).max(0)
                } else {
                    i.min(len)
                }
            };
            let start = norm(start);
            let stop = (norm(stop) + 1).min(len);
            if start >= stop {
                return Ok(Vec::new());
            }
            Ok(list[start as usize..stop as usize].to_vec())
        }

        async fn connected(&self) -> bool {
            self.online.load(std::sync::atomic::Ordering::SeqCst)
        }

        async fn close(&self) {
            self.online.store(false, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl FakeRegistry {
        pub fn hset(&self, key: &str, field: &str, value: &str) {
            self.hashes
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
        }

        pub fn hdel(&self, key: &str, field: &str) {
            if let Some(h) = self.hashes.lock().unwrap().get_mut(key) {
                h.remove(field);
            }
        }

        pub fn rpush(&self, key: &str, value: &str) {
            self.lists
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
    }

    #[tokio::test]
    async fn get_set_del_roundtrip() {
        let r = FakeRegistry::new();
        assert_eq!(r.get("k").await.unwrap(), None);
        r.set("k", "v").await.unwrap();
        assert_eq!(r.get("k").await.unwrap(), Some("v".to_string()));
        assert!(r.exists("k").await.unwrap());
        r.del("k").await.unwrap();
        assert!(!r.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn set_ops() {
        let r = FakeRegistry::new();
        r.sadd("s", "a").await.unwrap();
        r.sadd("s", "b").await.unwrap();
        let mut members = r.smembers("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
        r.srem("s", "a").await.unwrap();
        assert_eq!(r.smembers("s").await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn lrange_negative_indices() {
        let r = FakeRegistry::new();
        for i in 0..25 {
            r.rpush("l", &i.to_string());
        }
        let tail = r.lrange("l", -21, -1).await.unwrap();
        assert_eq!(tail.len(), 21);
        assert_eq!(tail[0], "4");
        assert_eq!(tail[20], "24");
    }

    #[tokio::test]
    async fn lrange_missing_key_is_empty() {
        let r = FakeRegistry::new();
        assert_eq!(r.lrange("missing", -21, -1).await.unwrap(), Vec::<String>::new());
    }
}
