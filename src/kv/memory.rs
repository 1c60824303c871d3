use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::{KvError, KvStore};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    // member -> score (epoch millis)
    ZSet(HashMap<String, i64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process KV store with per-key TTLs.
///
/// Entries expire lazily on access. Time is tokio time, so paused-clock
/// tests can advance TTLs deterministically.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ttl_deadline(ttl: Duration) -> Option<Instant> {
        Some(Instant::now() + ttl)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        let entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Str(s) => Ok(Some(s.clone())),
                Value::ZSet(_) => Err(KvError::Corrupt(format!("{key} holds a sorted set"))),
            },
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Self::ttl_deadline(ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(|e| !e.is_expired(now)) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Self::ttl_deadline(ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let now = Instant::now();
        Ok(self.entries.lock().get(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<(), KvError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::ZSet(HashMap::new()),
            expires_at: None,
        });

        if entry.is_expired(now) {
            entry.value = Value::ZSet(HashMap::new());
            entry.expires_at = None;
        }

        match &mut entry.value {
            Value::ZSet(members) => {
                members.insert(member.to_string(), score);
                Ok(())
            }
            Value::Str(_) => Err(KvError::Corrupt(format!("{key} holds a string"))),
        }
    }

    async fn zcount(&self, key: &str, min_score: i64) -> Result<u64, KvError> {
        let now = Instant::now();
        let entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::ZSet(members) => {
                    Ok(members.values().filter(|&&s| s >= min_score).count() as u64)
                }
                Value::Str(_) => Err(KvError::Corrupt(format!("{key} holds a string"))),
            },
            _ => Ok(0),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = Self::ttl_deadline(ttl);
            }
        }
        Ok(())
    }
}

/// KV double that fails every operation; backs the degradation tests.
#[derive(Debug, Default)]
pub struct FailingKv;

impl FailingKv {
    fn down<T>() -> Result<T, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl KvStore for FailingKv {
    async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
        Self::down()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), KvError> {
        Self::down()
    }

    async fn set_nx(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool, KvError> {
        Self::down()
    }

    async fn del(&self, _key: &str) -> Result<(), KvError> {
        Self::down()
    }

    async fn exists(&self, _key: &str) -> Result<bool, KvError> {
        Self::down()
    }

    async fn zadd(&self, _key: &str, _member: &str, _score: i64) -> Result<(), KvError> {
        Self::down()
    }

    async fn zcount(&self, _key: &str, _min_score: i64) -> Result<u64, KvError> {
        Self::down()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), KvError> {
        Self::down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let kv = MemoryKv::new();

        kv.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
        assert!(kv.exists("k").await.unwrap());

        kv.del("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(!kv.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let kv = MemoryKv::new();

        kv.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert!(kv.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!kv.exists("k").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_nx_semantics() {
        let kv = MemoryKv::new();

        assert!(kv.set_nx("dup", "1", Duration::from_secs(5)).await.unwrap());
        assert!(!kv.set_nx("dup", "1", Duration::from_secs(5)).await.unwrap());

        // After expiry the key is up for grabs again.
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(kv.set_nx("dup", "1", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_single_winner_under_contention() {
        use std::sync::Arc;

        let kv = Arc::new(MemoryKv::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let kv = kv.clone();
            handles.push(tokio::spawn(async move {
                kv.set_nx("race", "1", Duration::from_secs(60)).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zadd_zcount_and_expire() {
        let kv = MemoryKv::new();

        kv.zadd("vel", "INV-1", 1_000).await.unwrap();
        kv.zadd("vel", "INV-2", 2_000).await.unwrap();
        kv.zadd("vel", "INV-3", 3_000).await.unwrap();

        assert_eq!(kv.zcount("vel", 0).await.unwrap(), 3);
        assert_eq!(kv.zcount("vel", 2_000).await.unwrap(), 2);
        assert_eq!(kv.zcount("vel", 3_001).await.unwrap(), 0);

        // Re-adding a member re-scores rather than duplicating.
        kv.zadd("vel", "INV-1", 4_000).await.unwrap();
        assert_eq!(kv.zcount("vel", 0).await.unwrap(), 3);

        kv.expire("vel", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(kv.zcount("vel", 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zcount_missing_key_is_zero() {
        let kv = MemoryKv::new();
        assert_eq!(kv.zcount("nope", 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_corrupt() {
        let kv = MemoryKv::new();
        kv.set("k", "v", Duration::from_secs(60)).await.unwrap();

        assert!(matches!(kv.zadd("k", "m", 1).await, Err(KvError::Corrupt(_))));
        assert!(matches!(kv.zcount("k", 0).await, Err(KvError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_failing_kv_fails_everything() {
        let kv = FailingKv;

        assert!(kv.get("k").await.is_err());
        assert!(kv.set_nx("k", "v", Duration::from_secs(1)).await.is_err());
        assert!(kv.exists("k").await.is_err());
        assert!(kv.zcount("k", 0).await.is_err());
    }
}
