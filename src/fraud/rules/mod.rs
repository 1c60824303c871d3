pub mod amount;
pub mod duplicate;
pub mod iban;
pub mod risky;
pub mod velocity;

pub use amount::AmountManipulationRule;
pub use duplicate::DuplicateInvoiceRule;
pub use iban::IbanFormatRule;
pub use risky::RiskyIbanRule;
pub use velocity::VelocityRule;

use async_trait::async_trait;
use rust_decimal::Decimal;

/// A single fraud check evaluated against one request.
///
/// Rules run concurrently under the engine's deadline; an `Err` (or a
/// missed deadline) contributes nothing to the score. Rules must not
/// mutate velocity state — markers are written after the join.
#[async_trait]
pub trait FraudRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, ctx: &CheckRequest) -> anyhow::Result<RuleOutcome>;
}

/// Request fields visible to the rules.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub iban: String,
    pub amount: Decimal,
    pub vendor_id: i64,
    pub invoice_number: String,
}

/// Outcome of one rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub triggered: bool,
    pub points: u8,
    pub message: Option<String>,
}

impl RuleOutcome {
    /// The rule found nothing (or was skipped on infrastructure error).
    pub fn no_match() -> Self {
        RuleOutcome {
            triggered: false,
            points: 0,
            message: None,
        }
    }

    pub fn triggered(points: u8, message: impl Into<String>) -> Self {
        RuleOutcome {
            triggered: true,
            points,
            message: Some(message.into()),
        }
    }
}
