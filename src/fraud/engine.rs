use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Decision, NewTransaction, RiskBucket, Vendor};
use crate::iban::IbanValidator;
use crate::kv::KvStore;
use crate::storage::ScoringStorage;

use super::rules::velocity::{KEY_PREFIX_IBAN, KEY_PREFIX_VENDOR, VELOCITY_WINDOW_SECS};
use super::rules::{
    AmountManipulationRule, CheckRequest, DuplicateInvoiceRule, FraudRule, IbanFormatRule,
    RiskyIbanRule, RuleOutcome, VelocityRule,
};

/// Default wall-clock budget for the rule fan-out join.
pub const DEFAULT_RULE_BUDGET: Duration = Duration::from_millis(150);

const MAX_SCORE: u32 = 100;

/// Aggregated result of one fraud check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub decision: Decision,
    pub score: u8,
    pub risk_factors: Vec<String>,
}

/// The five-rule parallel fraud scoring engine.
///
/// Rules fan out onto the runtime and join under a hard deadline; a
/// rule that has not reported by then contributes nothing. Velocity
/// markers and the transaction record are written after the join, so
/// late rule tasks never mutate shared state.
pub struct FraudEngine {
    rules: Vec<Arc<dyn FraudRule>>,
    kv: Arc<dyn KvStore>,
    storage: Arc<dyn ScoringStorage>,
    rule_budget: Duration,
}

impl FraudEngine {
    /// Wire the canonical rule set. Risk factors are reported in this
    /// order regardless of completion order.
    pub fn new(
        kv: Arc<dyn KvStore>,
        storage: Arc<dyn ScoringStorage>,
        rule_budget: Duration,
    ) -> Self {
        let validator = Arc::new(IbanValidator::new(kv.clone()));

        let rules: Vec<Arc<dyn FraudRule>> = vec![
            Arc::new(DuplicateInvoiceRule::new(kv.clone())),
            Arc::new(IbanFormatRule::new(validator)),
            Arc::new(RiskyIbanRule::new(kv.clone(), storage.clone())),
            Arc::new(AmountManipulationRule::new()),
            Arc::new(VelocityRule::new(kv.clone(), storage.clone())),
        ];

        Self::with_rules(rules, kv, storage, rule_budget)
    }

    /// Engine over an explicit rule list (tests inject stalling or
    /// failing rules here).
    pub fn with_rules(
        rules: Vec<Arc<dyn FraudRule>>,
        kv: Arc<dyn KvStore>,
        storage: Arc<dyn ScoringStorage>,
        rule_budget: Duration,
    ) -> Self {
        FraudEngine {
            rules,
            kv,
            storage,
            rule_budget,
        }
    }

    /// Score one request. Always returns a decision; persistence and
    /// velocity bookkeeping are best-effort.
    pub async fn check(&self, request: CheckRequest) -> CheckOutcome {
        let started = Instant::now();
        info!(invoice = %request.invoice_number, "Starting fraud check");

        let request = Arc::new(request);
        let outcomes = self.run_rules(&request).await;

        let score = outcomes
            .iter()
            .filter(|o| o.triggered)
            .map(|o| u32::from(o.points))
            .sum::<u32>()
            .min(MAX_SCORE) as u8;

        let risk_factors: Vec<String> = outcomes
            .into_iter()
            .filter(|o| o.triggered)
            .filter_map(|o| o.message)
            .collect();

        let decision = Decision::from_score(score);

        self.record_velocity(&request).await;
        self.persist(&request, score, decision, &risk_factors).await;

        let vendor = self.vendor_context(request.vendor_id).await;

        info!(
            invoice = %request.invoice_number,
            decision = %decision,
            score,
            vendor_risk = vendor
                .as_ref()
                .map(|v| v.risk_bucket.as_str())
                .unwrap_or("UNKNOWN"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fraud check completed"
        );

        CheckOutcome {
            decision,
            score,
            risk_factors,
        }
    }

    /// Fan the rules out and join against a shared deadline. Tasks that
    /// miss it keep running detached; their results are discarded.
    async fn run_rules(&self, request: &Arc<CheckRequest>) -> Vec<RuleOutcome> {
        let deadline = Instant::now() + self.rule_budget;

        let handles: Vec<_> = self
            .rules
            .iter()
            .map(|rule| {
                let rule = rule.clone();
                let request = request.clone();
                tokio::spawn(async move { rule.evaluate(&request).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (rule, handle) in self.rules.iter().zip(handles) {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(Ok(outcome))) => outcome,
                Ok(Ok(Err(e))) => {
                    warn!(rule = rule.name(), error = %e, "Rule evaluation failed, scoring 0");
                    RuleOutcome::no_match()
                }
                Ok(Err(e)) => {
                    error!(rule = rule.name(), error = %e, "Rule task aborted, scoring 0");
                    RuleOutcome::no_match()
                }
                Err(_) => {
                    warn!(
                        rule = rule.name(),
                        budget_ms = self.rule_budget.as_millis() as u64,
                        "Rule missed deadline, scoring 0"
                    );
                    RuleOutcome::no_match()
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Best-effort vendor registry read. The registry never moves the
    /// score — rule points are fixed — but inactive and high-risk
    /// vendors are surfaced for the review queue.
    async fn vendor_context(&self, vendor_id: i64) -> Option<Vendor> {
        let vendor = match self.storage.find_vendor(vendor_id).await {
            Ok(Some(vendor)) => vendor,
            Ok(None) => {
                warn!(vendor_id, "Vendor not present in registry");
                return None;
            }
            Err(e) => {
                warn!(vendor_id, error = %e, "Vendor registry lookup failed");
                return None;
            }
        };

        if !vendor.is_active {
            warn!(vendor_id, vendor = %vendor.name, "Transaction references an inactive vendor");
        }
        if vendor.risk_bucket == RiskBucket::High {
            warn!(
                vendor_id,
                vendor = %vendor.name,
                flagged = vendor.flagged_count,
                total = vendor.total_count,
                "Transaction references a high-risk vendor"
            );
        }

        Some(vendor)
    }

    async fn record_velocity(&self, request: &CheckRequest) {
        let now_ms = Utc::now().timestamp_millis();
        let window = Duration::from_secs(VELOCITY_WINDOW_SECS as u64);

        let iban_key = format!("{KEY_PREFIX_IBAN}{}", request.iban);
        let vendor_key = format!("{KEY_PREFIX_VENDOR}{}", request.vendor_id);

        for key in [iban_key, vendor_key] {
            if let Err(e) = self.kv.zadd(&key, &request.invoice_number, now_ms).await {
                error!(error = %e, "Failed to record transaction velocity");
                continue;
            }
            if let Err(e) = self.kv.expire(&key, window).await {
                error!(error = %e, "Failed to refresh velocity window TTL");
            }
        }
    }

    async fn persist(
        &self,
        request: &CheckRequest,
        score: u8,
        decision: Decision,
        risk_factors: &[String],
    ) {
        let record = NewTransaction {
            transaction_id: Uuid::new_v4(),
            iban: request.iban.clone(),
            amount: request.amount,
            vendor_id: Some(request.vendor_id),
            invoice_number: request.invoice_number.clone(),
            fraud_score: score,
            decision,
            risk_factors: risk_factors.to_vec(),
        };

        if let Err(e) = self.storage.save_transaction(&record).await {
            error!(
                invoice = %request.invoice_number,
                error = %e,
                "Failed to persist transaction, fraud check still completed"
            );
        }
    }
}
