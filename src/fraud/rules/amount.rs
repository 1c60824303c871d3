use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{CheckRequest, FraudRule, RuleOutcome};

pub const POINTS_AMOUNT_MANIPULATION: u8 = 30;

// Amounts just under a round threshold are a classic manipulation
// pattern: the window [T-50, T+1] is inclusive on both ends.
const SUSPICIOUS_THRESHOLDS: [i64; 7] = [999, 1_999, 4_999, 9_999, 14_999, 19_999, 49_999];
const THRESHOLD_MARGIN_BELOW: i64 = 50;
const THRESHOLD_MARGIN_ABOVE: i64 = 1;

const MESSAGE: &str = "Amount suspiciously close to common threshold";

/// Flags amounts within the margin of a common approval threshold.
#[derive(Debug, Default)]
pub struct AmountManipulationRule;

impl AmountManipulationRule {
    pub fn new() -> Self {
        AmountManipulationRule
    }

    fn is_suspicious(amount: Decimal) -> bool {
        SUSPICIOUS_THRESHOLDS.iter().any(|&t| {
            let threshold = Decimal::from(t);
            let lower = threshold - Decimal::from(THRESHOLD_MARGIN_BELOW);
            let upper = threshold + Decimal::from(THRESHOLD_MARGIN_ABOVE);
            amount >= lower && amount <= upper
        })
    }
}

#[async_trait]
impl FraudRule for AmountManipulationRule {
    fn name(&self) -> &'static str {
        "amount_manipulation"
    }

    async fn evaluate(&self, ctx: &CheckRequest) -> anyhow::Result<RuleOutcome> {
        if Self::is_suspicious(ctx.amount) {
            return Ok(RuleOutcome::triggered(POINTS_AMOUNT_MANIPULATION, MESSAGE));
        }
        Ok(RuleOutcome::no_match())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn evaluate(amount: &str) -> RuleOutcome {
        let ctx = CheckRequest {
            iban: "BG80BNBG96611020345678".to_string(),
            amount: dec(amount),
            vendor_id: 1,
            invoice_number: "INV-001".to_string(),
        };
        AmountManipulationRule::new().evaluate(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_window_boundaries_around_4999() {
        // [4949, 5000] inclusive.
        assert!(!evaluate("4948").await.triggered);
        assert!(evaluate("4949").await.triggered);
        assert!(evaluate("4999").await.triggered);
        assert!(evaluate("5000").await.triggered);
        assert!(!evaluate("5000.01").await.triggered);
    }

    #[tokio::test]
    async fn test_fractional_amounts_inside_window() {
        assert!(evaluate("4990.00").await.triggered);
        assert!(evaluate("4948.99").await.triggered);
        assert!(!evaluate("4948.98").await.triggered);
    }

    #[tokio::test]
    async fn test_lowest_threshold() {
        assert!(evaluate("949").await.triggered);
        assert!(!evaluate("948.99").await.triggered);
        assert!(evaluate("1000").await.triggered);
        assert!(!evaluate("1000.01").await.triggered);
    }

    #[tokio::test]
    async fn test_all_thresholds_trigger() {
        for t in ["999", "1999", "4999", "9999", "14999", "19999", "49999"] {
            let outcome = evaluate(t).await;
            assert!(outcome.triggered, "threshold {t}");
            assert_eq!(outcome.points, POINTS_AMOUNT_MANIPULATION);
            assert_eq!(outcome.message.as_deref(), Some(MESSAGE));
        }
    }

    #[tokio::test]
    async fn test_ordinary_amount_passes() {
        assert!(!evaluate("1500.00").await.triggered);
        assert!(!evaluate("0.01").await.triggered);
        assert!(!evaluate("100000").await.triggered);
    }
}
