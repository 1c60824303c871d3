use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audit::AuditEvent;
use crate::domain::{NewTransaction, NewUser, TokenKind, User, Vendor};

use super::traits::{EdgeStorage, ScoringStorage};

#[derive(Debug, Clone)]
struct TokenRow {
    kind: TokenKind,
    expires_at: DateTime<Utc>,
}

/// In-memory storage for tests, implementing both service-side traits.
#[derive(Default)]
pub struct MockStorage {
    users: Mutex<HashMap<String, User>>,
    // (username, token) -> row
    tokens: Mutex<HashMap<(String, String), TokenRow>>,
    transactions: Mutex<Vec<NewTransaction>>,
    risky_ibans: Mutex<HashSet<String>>,
    vendors: Mutex<HashMap<i64, Vendor>>,
    iban_counts: Mutex<HashMap<String, u64>>,
    vendor_counts: Mutex<HashMap<i64, u64>>,
    audits: Mutex<Vec<AuditEvent>>,
    next_user_id: Mutex<i64>,
    fail_tokens: AtomicBool,
    fail_transactions: AtomicBool,
    audits_held: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with an already-computed password hash.
    pub fn add_user(&self, username: &str, password_hash: &str, active: bool, locked: bool) {
        let mut next_id = self.next_user_id.lock();
        *next_id += 1;

        self.users.lock().insert(
            username.to_string(),
            User {
                id: *next_id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: password_hash.to_string(),
                full_name: username.to_string(),
                is_active: active,
                is_locked: locked,
                failed_login_attempts: 0,
                last_login_at: None,
                created_at: Some(Utc::now()),
                updated_at: Some(Utc::now()),
            },
        );
    }

    pub fn deactivate_user(&self, username: &str) {
        if let Some(user) = self.users.lock().get_mut(username) {
            user.is_active = false;
        }
    }

    pub fn failed_attempts(&self, username: &str) -> i32 {
        self.users
            .lock()
            .get(username)
            .map(|u| u.failed_login_attempts)
            .unwrap_or(0)
    }

    pub fn last_login(&self, username: &str) -> Option<DateTime<Utc>> {
        self.users.lock().get(username).and_then(|u| u.last_login_at)
    }

    pub fn set_risky(&self, iban: &str) {
        self.risky_ibans.lock().insert(iban.to_string());
    }

    pub fn add_vendor(&self, vendor: Vendor) {
        self.vendors.lock().insert(vendor.id, vendor);
    }

    pub fn set_iban_count(&self, iban: &str, count: u64) {
        self.iban_counts.lock().insert(iban.to_string(), count);
    }

    pub fn set_vendor_count(&self, vendor_id: i64, count: u64) {
        self.vendor_counts.lock().insert(vendor_id, count);
    }

    /// Make token persistence fail (for issuance-failure tests).
    pub fn fail_tokens(&self, fail: bool) {
        self.fail_tokens.store(fail, Ordering::SeqCst);
    }

    /// Make transaction persistence fail.
    pub fn fail_transactions(&self, fail: bool) {
        self.fail_transactions.store(fail, Ordering::SeqCst);
    }

    /// Stall the audit writer (for backpressure tests).
    pub fn hold_audits(&self, hold: bool) {
        self.audits_held.store(hold, Ordering::SeqCst);
    }

    pub fn token_count(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn recorded_transactions(&self) -> Vec<NewTransaction> {
        self.transactions.lock().clone()
    }

    pub fn recorded_audits(&self) -> Vec<AuditEvent> {
        self.audits.lock().clone()
    }
}

#[async_trait]
impl EdgeStorage for MockStorage {
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().get(username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<i64> {
        let mut next_id = self.next_user_id.lock();
        *next_id += 1;
        let id = *next_id;

        self.users.lock().insert(
            user.username.clone(),
            User {
                id,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                full_name: user.full_name.clone(),
                is_active: true,
                is_locked: false,
                failed_login_attempts: 0,
                last_login_at: None,
                created_at: Some(Utc::now()),
                updated_at: Some(Utc::now()),
            },
        );
        Ok(id)
    }

    async fn record_login_success(&self, username: &str) -> anyhow::Result<()> {
        if let Some(user) = self.users.lock().get_mut(username) {
            user.last_login_at = Some(Utc::now());
            user.failed_login_attempts = 0;
        }
        Ok(())
    }

    async fn record_login_failure(&self, username: &str) -> anyhow::Result<()> {
        if let Some(user) = self.users.lock().get_mut(username) {
            user.failed_login_attempts += 1;
        }
        Ok(())
    }

    async fn save_token(
        &self,
        username: &str,
        token: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if self.fail_tokens.load(Ordering::SeqCst) {
            anyhow::bail!("token store down");
        }

        self.tokens.lock().insert(
            (username.to_string(), token.to_string()),
            TokenRow { kind, expires_at },
        );
        Ok(())
    }

    async fn token_exists(&self, username: &str, token: &str) -> anyhow::Result<bool> {
        if self.fail_tokens.load(Ordering::SeqCst) {
            anyhow::bail!("token store down");
        }

        Ok(self
            .tokens
            .lock()
            .get(&(username.to_string(), token.to_string()))
            .is_some_and(|row| row.expires_at > Utc::now()))
    }

    async fn delete_token(&self, username: &str, token: &str) -> anyhow::Result<()> {
        if self.fail_tokens.load(Ordering::SeqCst) {
            anyhow::bail!("token store down");
        }

        self.tokens
            .lock()
            .remove(&(username.to_string(), token.to_string()));
        Ok(())
    }

    async fn append_audit(&self, event: &AuditEvent) -> anyhow::Result<()> {
        while self.audits_held.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        self.audits.lock().push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl ScoringStorage for MockStorage {
    async fn save_transaction(&self, tx: &NewTransaction) -> anyhow::Result<i64> {
        if self.fail_transactions.load(Ordering::SeqCst) {
            anyhow::bail!("transaction store down");
        }

        let mut transactions = self.transactions.lock();
        transactions.push(tx.clone());
        Ok(transactions.len() as i64)
    }

    async fn count_by_iban_since(&self, iban: &str, _since: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(self.iban_counts.lock().get(iban).copied().unwrap_or(0))
    }

    async fn count_by_vendor_since(
        &self,
        vendor_id: i64,
        _since: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        Ok(self.vendor_counts.lock().get(&vendor_id).copied().unwrap_or(0))
    }

    async fn is_risky_iban(&self, iban: &str) -> anyhow::Result<bool> {
        Ok(self.risky_ibans.lock().contains(iban))
    }

    async fn find_vendor(&self, vendor_id: i64) -> anyhow::Result<Option<Vendor>> {
        Ok(self.vendors.lock().get(&vendor_id).cloned())
    }
}
