use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::kv::KvStore;

use super::{CheckRequest, FraudRule, RuleOutcome};

pub const POINTS_DUPLICATE_INVOICE: u8 = 50;

const KEY_PREFIX: &str = "fraud:duplicate:";
const DUPLICATE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const MESSAGE: &str = "Duplicate invoice detected within 24 hours";

/// Detects an invoice number seen within the last 24 hours.
///
/// The KV set-if-absent linearizes the check: exactly one request per
/// window observes "first". A KV failure means the invoice is treated
/// as not a duplicate — never the other way around.
pub struct DuplicateInvoiceRule {
    kv: Arc<dyn KvStore>,
}

impl DuplicateInvoiceRule {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        DuplicateInvoiceRule { kv }
    }
}

#[async_trait]
impl FraudRule for DuplicateInvoiceRule {
    fn name(&self) -> &'static str {
        "duplicate_invoice"
    }

    async fn evaluate(&self, ctx: &CheckRequest) -> anyhow::Result<RuleOutcome> {
        let key = format!("{KEY_PREFIX}{}", ctx.invoice_number);

        match self.kv.set_nx(&key, "1", DUPLICATE_WINDOW).await {
            Ok(true) => Ok(RuleOutcome::no_match()),
            Ok(false) => {
                warn!(invoice = %ctx.invoice_number, "Duplicate invoice detected");
                Ok(RuleOutcome::triggered(POINTS_DUPLICATE_INVOICE, MESSAGE))
            }
            Err(e) => {
                warn!(error = %e, "KV error during duplicate check, allowing invoice");
                Ok(RuleOutcome::no_match())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FailingKv, MemoryKv};
    use rust_decimal::Decimal;

    fn ctx(invoice: &str) -> CheckRequest {
        CheckRequest {
            iban: "BG80BNBG96611020345678".to_string(),
            amount: Decimal::from(100),
            vendor_id: 1,
            invoice_number: invoice.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_sighting_is_clean() {
        let rule = DuplicateInvoiceRule::new(Arc::new(MemoryKv::new()));
        let outcome = rule.evaluate(&ctx("INV-001")).await.unwrap();
        assert!(!outcome.triggered);
    }

    #[tokio::test]
    async fn test_second_sighting_triggers() {
        let rule = DuplicateInvoiceRule::new(Arc::new(MemoryKv::new()));

        assert!(!rule.evaluate(&ctx("INV-DUPLICATE")).await.unwrap().triggered);

        let outcome = rule.evaluate(&ctx("INV-DUPLICATE")).await.unwrap();
        assert!(outcome.triggered);
        assert_eq!(outcome.points, POINTS_DUPLICATE_INVOICE);
        assert_eq!(outcome.message.as_deref(), Some(MESSAGE));
    }

    #[tokio::test]
    async fn test_distinct_invoices_do_not_collide() {
        let rule = DuplicateInvoiceRule::new(Arc::new(MemoryKv::new()));

        assert!(!rule.evaluate(&ctx("INV-001")).await.unwrap().triggered);
        assert!(!rule.evaluate(&ctx("INV-002")).await.unwrap().triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_resets_detection() {
        let rule = DuplicateInvoiceRule::new(Arc::new(MemoryKv::new()));

        assert!(!rule.evaluate(&ctx("INV-001")).await.unwrap().triggered);
        tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;
        assert!(!rule.evaluate(&ctx("INV-001")).await.unwrap().triggered);
    }

    #[tokio::test]
    async fn test_kv_failure_is_not_a_duplicate() {
        let rule = DuplicateInvoiceRule::new(Arc::new(FailingKv));
        let outcome = rule.evaluate(&ctx("INV-001")).await.unwrap();
        assert!(!outcome.triggered);
    }

    #[tokio::test]
    async fn test_only_one_concurrent_caller_sees_first() {
        let kv = Arc::new(MemoryKv::new());
        let rule = Arc::new(DuplicateInvoiceRule::new(kv));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let rule = rule.clone();
            handles.push(tokio::spawn(async move {
                rule.evaluate(&ctx("INV-RACE")).await.unwrap().triggered
            }));
        }

        let mut first_sightings = 0;
        for handle in handles {
            if !handle.await.unwrap() {
                first_sightings += 1;
            }
        }
        assert_eq!(first_sightings, 1);
    }
}
