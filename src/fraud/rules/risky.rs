use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::iban::mask;
use crate::kv::KvStore;
use crate::storage::ScoringStorage;

use super::{CheckRequest, FraudRule, RuleOutcome};

pub const POINTS_RISKY_IBAN: u8 = 40;

const CACHE_KEY_PREFIX: &str = "fraud:risky:iban:";
const CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

const MESSAGE: &str = "IBAN flagged as high-risk in database";

/// Flags IBANs marked risky in the registry, with a 4 h KV cache in
/// front of the durable lookup.
pub struct RiskyIbanRule {
    kv: Arc<dyn KvStore>,
    storage: Arc<dyn ScoringStorage>,
}

impl RiskyIbanRule {
    pub fn new(kv: Arc<dyn KvStore>, storage: Arc<dyn ScoringStorage>) -> Self {
        RiskyIbanRule { kv, storage }
    }

    async fn is_risky(&self, iban: &str) -> anyhow::Result<bool> {
        let key = format!("{CACHE_KEY_PREFIX}{iban}");

        match self.kv.get(&key).await {
            Ok(Some(cached)) => {
                if let Ok(value) = cached.parse::<bool>() {
                    debug!(iban = %mask(iban), "Risky IBAN cache hit");
                    return Ok(value);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Risky IBAN cache read failed"),
        }

        let is_risky = self.storage.is_risky_iban(iban).await?;

        if let Err(e) = self
            .kv
            .set(&key, if is_risky { "true" } else { "false" }, CACHE_TTL)
            .await
        {
            warn!(error = %e, "Risky IBAN cache write failed");
        }

        Ok(is_risky)
    }
}

#[async_trait]
impl FraudRule for RiskyIbanRule {
    fn name(&self) -> &'static str {
        "risky_iban"
    }

    async fn evaluate(&self, ctx: &CheckRequest) -> anyhow::Result<RuleOutcome> {
        if self.is_risky(&ctx.iban).await? {
            warn!(iban = %mask(&ctx.iban), "Risky IBAN detected");
            return Ok(RuleOutcome::triggered(POINTS_RISKY_IBAN, MESSAGE));
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
            vendor_id: 1,
            invoice_number: "INV-001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_clean_iban_passes() {
        let rule = RiskyIbanRule::new(Arc::new(MemoryKv::new()), Arc::new(MockStorage::new()));
        assert!(!rule.evaluate(&ctx()).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_risky_iban_triggers() {
        let storage = Arc::new(MockStorage::new());
        storage.set_risky(IBAN);
        let rule = RiskyIbanRule::new(Arc::new(MemoryKv::new()), storage);

        let outcome = rule.evaluate(&ctx()).await.unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.points, POINTS_RISKY_IBAN);
        assert_eq!(outcome.message.as_deref(), Some(MESSAGE));
    }

    #[tokio::test]
    async fn test_result_is_cached() {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(MockStorage::new());
        storage.set_risky(IBAN);
        let rule = RiskyIbanRule::new(kv.clone(), storage.clone());

        assert!(rule.evaluate(&ctx()).await.unwrap().triggered);
        assert_eq!(
            kv.get(&format!("fraud:risky:iban:{IBAN}")).await.unwrap(),
            Some("true".to_string())
        );

        // Registry flip is invisible until the cache entry expires.
        let fresh = Arc::new(MockStorage::new());
        let cached_rule = RiskyIbanRule::new(kv, fresh);
        assert!(cached_rule.evaluate(&ctx()).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_cache_failure_falls_through_to_registry() {
        let storage = Arc::new(MockStorage::new());
        storage.set_risky(IBAN);
        let rule = RiskyIbanRule::new(Arc::new(FailingKv), storage);

        assert!(rule.evaluate(&ctx()).await.unwrap().triggered);
    }
}
