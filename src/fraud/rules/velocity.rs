use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::kv::KvStore;
use crate::storage::ScoringStorage;

use super::{CheckRequest, FraudRule, RuleOutcome};

pub const POINTS_VELOCITY_ANOMALY: u8 = 15;

pub const VELOCITY_WINDOW_SECS: i64 = 15 * 60;
pub const VELOCITY_THRESHOLD_IBAN: u64 = 5;
pub const VELOCITY_THRESHOLD_VENDOR: u64 = 10;

pub const KEY_PREFIX_IBAN: &str = "fraud:velocity:iban:";
pub const KEY_PREFIX_VENDOR: &str = "fraud:velocity:vendor:";

const MESSAGE: &str = "Unusual transaction velocity detected";

enum CountSource {
    Iban,
    Vendor,
}

/// Flags bursts of transactions per IBAN or per vendor inside a
/// 15-minute sliding window.
///
/// Counts come from the KV sorted sets; on a KV error the rule falls
/// back to the durable transaction counts. The two sources may drift
/// slightly — availability wins over exactness here.
pub struct VelocityRule {
    kv: Arc<dyn KvStore>,
    storage: Arc<dyn ScoringStorage>,
}

impl VelocityRule {
    pub fn new(kv: Arc<dyn KvStore>, storage: Arc<dyn ScoringStorage>) -> Self {
        VelocityRule { kv, storage }
    }

    async fn count_in_window(&self, ctx: &CheckRequest, source: CountSource) -> anyhow::Result<u64> {
        let (key, label) = match source {
            CountSource::Iban => (format!("{KEY_PREFIX_IBAN}{}", ctx.iban), "iban"),
            CountSource::Vendor => (format!("{KEY_PREFIX_VENDOR}{}", ctx.vendor_id), "vendor"),
        };

        let window_start_ms = Utc::now().timestamp_millis() - VELOCITY_WINDOW_SECS * 1000;

        match self.kv.zcount(&key, window_start_ms).await {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(source = label, error = %e, "KV velocity count failed, falling back to database");
                let since = Utc::now() - ChronoDuration::seconds(VELOCITY_WINDOW_SECS);
                match source {
                    CountSource::Iban => self.storage.count_by_iban_since(&ctx.iban, since).await,
                    CountSource::Vendor => {
                        self.storage.count_by_vendor_since(ctx.vendor_id, since).await
                    }
                }
            }
        }
    }
}

#[async_trait]
impl FraudRule for VelocityRule {
    fn name(&self) -> &'static str {
        "velocity_anomaly"
    }

    async fn evaluate(&self, ctx: &CheckRequest) -> anyhow::Result<RuleOutcome> {
        let iban_count = self.count_in_window(ctx, CountSource::Iban).await?;
        if iban_count >= VELOCITY_THRESHOLD_IBAN {
            debug!(count = iban_count, "IBAN velocity threshold exceeded");
            return Ok(RuleOutcome::triggered(POINTS_VELOCITY_ANOMALY, MESSAGE));
        }

        let vendor_count = self.count_in_window(ctx, CountSource::Vendor).await?;
        if vendor_count >= VELOCITY_THRESHOLD_VENDOR {
            debug!(count = vendor_count, "Vendor velocity threshold exceeded");
            return Ok(RuleOutcome::triggered(POINTS_VELOCITY_ANOMALY, MESSAGE));
        }

        Ok(RuleOutcome::no_match())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FailingKv, MemoryKv};
    use crate::storage::MockStorage;
    use rust_decimal::Decimal;

    const IBAN: &str = "BG80BNBG96611020345678";

    fn ctx() -> CheckRequest {
        CheckRequest {
            iban: IBAN.to_string(),
            amount: Decimal::from(100),
            vendor_id: 7,
            invoice_number: "INV-001".to_string(),
        }
    }

    async fn seed_iban_entries(kv: &MemoryKv, n: usize) {
        let now_ms = Utc::now().timestamp_millis();
        for i in 0..n {
            kv.zadd(&format!("{KEY_PREFIX_IBAN}{IBAN}"), &format!("INV-{i}"), now_ms)
                .await
                .unwrap();
        }
    }

    async fn seed_vendor_entries(kv: &MemoryKv, vendor_id: i64, n: usize) {
        let now_ms = Utc::now().timestamp_millis();
        for i in 0..n {
            kv.zadd(
                &format!("{KEY_PREFIX_VENDOR}{vendor_id}"),
                &format!("INV-V{i}"),
                now_ms,
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_window_passes() {
        let rule = VelocityRule::new(Arc::new(MemoryKv::new()), Arc::new(MockStorage::new()));
        assert!(!rule.evaluate(&ctx()).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_iban_threshold_boundary() {
        let kv = Arc::new(MemoryKv::new());
        seed_iban_entries(&kv, 4).await;
        let rule = VelocityRule::new(kv.clone(), Arc::new(MockStorage::new()));
        assert!(!rule.evaluate(&ctx()).await.unwrap().triggered);

        seed_iban_entries(&kv, 5).await;
        let outcome = rule.evaluate(&ctx()).await.unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.points, POINTS_VELOCITY_ANOMALY);
        assert_eq!(outcome.message.as_deref(), Some(MESSAGE));
    }

    #[tokio::test]
    async fn test_vendor_threshold_boundary() {
        let kv = Arc::new(MemoryKv::new());
        seed_vendor_entries(&kv, 7, 9).await;
        let rule = VelocityRule::new(kv.clone(), Arc::new(MockStorage::new()));
        assert!(!rule.evaluate(&ctx()).await.unwrap().triggered);

        seed_vendor_entries(&kv, 7, 10).await;
        assert!(rule.evaluate(&ctx()).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_entries_outside_window_ignored() {
        let kv = Arc::new(MemoryKv::new());
        let stale_ms = Utc::now().timestamp_millis() - (VELOCITY_WINDOW_SECS + 60) * 1000;
        for i in 0..6 {
            kv.zadd(&format!("{KEY_PREFIX_IBAN}{IBAN}"), &format!("OLD-{i}"), stale_ms)
                .await
                .unwrap();
        }

        let rule = VelocityRule::new(kv, Arc::new(MockStorage::new()));
        assert!(!rule.evaluate(&ctx()).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_kv_failure_falls_back_to_database() {
        let storage = Arc::new(MockStorage::new());
        storage.set_iban_count(IBAN, 6);
        let rule = VelocityRule::new(Arc::new(FailingKv), storage);

        assert!(rule.evaluate(&ctx()).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_kv_failure_with_quiet_database_passes() {
        let rule = VelocityRule::new(Arc::new(FailingKv), Arc::new(MockStorage::new()));
        assert!(!rule.evaluate(&ctx()).await.unwrap().triggered);
    }
}
