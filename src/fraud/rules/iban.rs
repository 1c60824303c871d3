use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::iban::{mask, IbanValidator};

use super::{CheckRequest, FraudRule, RuleOutcome};

pub const POINTS_INVALID_IBAN: u8 = 50;

/// Flags syntactically or checksum-invalid IBANs.
pub struct IbanFormatRule {
    validator: Arc<IbanValidator>,
}

impl IbanFormatRule {
    pub fn new(validator: Arc<IbanValidator>) -> Self {
        IbanFormatRule { validator }
    }
}

#[async_trait]
impl FraudRule for IbanFormatRule {
    fn name(&self) -> &'static str {
        "invalid_iban"
    }

    async fn evaluate(&self, ctx: &CheckRequest) -> anyhow::Result<RuleOutcome> {
        let result = self.validator.validate(&ctx.iban).await;

        if !result.valid {
            let reason = result.reason.unwrap_or_else(|| "unknown".to_string());
            warn!(iban = %mask(&ctx.iban), reason = %reason, "Invalid IBAN detected");
            return Ok(RuleOutcome::triggered(
                POINTS_INVALID_IBAN,
                format!("Invalid IBAN: {reason}"),
            ));
        }

        Ok(RuleOutcome::no_match())
    }
}
