use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::audit::AuditEvent;
use crate::domain::{NewTransaction, NewUser, RiskBucket, TokenKind, User, Vendor};

use super::traits::{EdgeStorage, ScoringStorage};

/// PostgreSQL implementation of both storage traits over one pool.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect with a bounded pool; the initial connection doubles as the
    /// startup reachability probe.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            full_name: row.get("full_name"),
            is_active: row.get("is_active"),
            is_locked: row.get("is_locked"),
            failed_login_attempts: row.get("failed_login_attempts"),
            last_login_at: row.get("last_login_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, is_active, is_locked, \
                            failed_login_attempts, last_login_at, created_at, updated_at";

#[async_trait]
impl EdgeStorage for PostgresStorage {
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, is_active, is_locked, failed_login_attempts)
            VALUES ($1, $2, $3, $4, true, false, 0)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn record_login_success(&self, username: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = now(), failed_login_attempts = 0, updated_at = now()
            WHERE username = $1
            "#,
        )
        .bind(username)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_login_failure(&self, username: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1, updated_at = now()
            WHERE username = $1
            "#,
        )
        .bind(username)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_token(
        &self,
        username: &str,
        token: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jwt_tokens (user_id, token, token_type, expires_at, created_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (token) DO UPDATE
            SET expires_at = EXCLUDED.expires_at, token_type = EXCLUDED.token_type
            "#,
        )
        .bind(username)
        .bind(token)
        .bind(kind.to_string())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn token_exists(&self, username: &str, token: &str) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM jwt_tokens
                WHERE user_id = $1 AND token = $2 AND expires_at > now()
            )
            "#,
        )
        .bind(username)
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn delete_token(&self, username: &str, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM jwt_tokens WHERE user_id = $1 AND token = $2")
            .bind(username)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn append_audit(&self, event: &AuditEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (user_id, action, resource_type, resource_id, ip_address, user_agent, details, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            "#,
        )
        .bind(&event.user)
        .bind(event.action)
        .bind(event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScoringStorage for PostgresStorage {
    async fn save_transaction(&self, tx: &NewTransaction) -> anyhow::Result<i64> {
        let risk_factors = serde_json::to_value(&tx.risk_factors)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions
                (transaction_id, iban, amount, vendor_id, invoice_number, fraud_score, decision, risk_factors, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::fraud_decision, $8, now())
            RETURNING id
            "#,
        )
        .bind(tx.transaction_id)
        .bind(&tx.iban)
        .bind(tx.amount)
        .bind(tx.vendor_id)
        .bind(&tx.invoice_number)
        .bind(tx.fraud_score as i32)
        .bind(tx.decision.as_str())
        .bind(risk_factors)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn count_by_iban_since(&self, iban: &str, since: DateTime<Utc>) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE iban = $1 AND created_at >= $2",
        )
        .bind(iban)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn count_by_vendor_since(
        &self,
        vendor_id: i64,
        since: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE vendor_id = $1 AND created_at >= $2",
        )
        .bind(vendor_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn is_risky_iban(&self, iban: &str) -> anyhow::Result<bool> {
        let is_risky: Option<bool> =
            sqlx::query_scalar("SELECT is_risky FROM ibans WHERE iban = $1 LIMIT 1")
                .bind(iban)
                .fetch_optional(&self.pool)
                .await?;

        Ok(is_risky.unwrap_or(false))
    }

    async fn find_vendor(&self, vendor_id: i64) -> anyhow::Result<Option<Vendor>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, iban, risk_bucket, is_active, total_count, flagged_count
            FROM vendors
            WHERE id = $1
            "#,
        )
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let risk_bucket: String = row.get("risk_bucket");
            Vendor {
                id: row.get("id"),
                name: row.get("name"),
                iban: row.get("iban"),
                risk_bucket: RiskBucket::from_str_or_high(&risk_bucket),
                is_active: row.get("is_active"),
                total_count: row.get("total_count"),
                flagged_count: row.get("flagged_count"),
            }
        }))
    }
}
