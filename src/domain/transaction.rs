use rust_decimal::Decimal;
use uuid::Uuid;

use super::Decision;

/// Scored transaction, as persisted by the scoring service.
///
/// Immutable once written; the risk factor list is stored in rule order.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Opaque correlation id for this check.
    pub transaction_id: Uuid,
    pub iban: String,
    pub amount: Decimal,
    pub vendor_id: Option<i64>,
    pub invoice_number: String,
    pub fraud_score: u8,
    pub decision: Decision,
    pub risk_factors: Vec<String>,
}
