pub mod memory;

pub use memory::{FailingKv, MemoryKv};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the KV tier.
///
/// Callers decide the policy: fraud rules treat these as "no signal"
/// (fail-open), the token blacklist read treats them as rejection
/// (fail-closed).
#[derive(Error, Debug)]
pub enum KvError {
    #[error("KV store unavailable: {0}")]
    Unavailable(String),

    #[error("KV entry corrupt: {0}")]
    Corrupt(String),
}

/// The KV subset both services consume.
///
/// Single-operation atomicity is the contract the engine relies on:
/// `set_nx` linearizes duplicate detection, `zadd` is an atomic
/// member upsert, TTLs are set on write. Sorted-set scores are epoch
/// milliseconds.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write with TTL; overwrites any existing entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Atomic set-if-absent with TTL. Returns true iff the write happened.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError>;

    async fn del(&self, key: &str) -> Result<(), KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// Add (or re-score) a member of a sorted set.
    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<(), KvError>;

    /// Count members with score >= `min_score`.
    async fn zcount(&self, key: &str, min_score: i64) -> Result<u64, KvError>;

    /// Reset the key's TTL.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;
}
