pub mod engine;
pub mod rules;

pub use engine::{CheckOutcome, FraudEngine, DEFAULT_RULE_BUDGET};
pub use rules::{CheckRequest, FraudRule, RuleOutcome};
