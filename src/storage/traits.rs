use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::AuditEvent;
use crate::domain::{NewTransaction, NewUser, TokenKind, User, Vendor};

/// Durable store operations consumed by the edge service
/// (users, token records, audit log).
#[async_trait]
pub trait EdgeStorage: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<i64>;

    /// Stamp `last_login_at` and reset the failed-attempt counter.
    async fn record_login_success(&self, username: &str) -> anyhow::Result<()>;

    /// Increment the failed-attempt counter.
    async fn record_login_failure(&self, username: &str) -> anyhow::Result<()>;

    /// Upsert a token record; a token string appears at most once.
    async fn save_token(
        &self,
        username: &str,
        token: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// True iff the (user, token) pair exists and has not expired.
    async fn token_exists(&self, username: &str, token: &str) -> anyhow::Result<bool>;

    async fn delete_token(&self, username: &str, token: &str) -> anyhow::Result<()>;

    /// Append-only; audit rows are never updated or deleted.
    async fn append_audit(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Durable store operations consumed by the scoring service
/// (transactions, IBAN registry).
#[async_trait]
pub trait ScoringStorage: Send + Sync {
    async fn save_transaction(&self, tx: &NewTransaction) -> anyhow::Result<i64>;

    /// Transactions for this IBAN created at or after `since`.
    async fn count_by_iban_since(&self, iban: &str, since: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Transactions for this vendor created at or after `since`.
    async fn count_by_vendor_since(
        &self,
        vendor_id: i64,
        since: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    /// Registry lookup; unknown IBANs are not risky.
    async fn is_risky_iban(&self, iban: &str) -> anyhow::Result<bool>;

    /// Vendor registry row, read-only from the engine's side.
    async fn find_vendor(&self, vendor_id: i64) -> anyhow::Result<Option<Vendor>>;
}
