use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper score bound (inclusive) for an ALLOW decision.
pub const ALLOW_THRESHOLD: u8 = 30;

/// Upper score bound (inclusive) for a REVIEW decision.
pub const REVIEW_THRESHOLD: u8 = 70;

/// Tiered fraud decision.
///
/// The decision is a pure function of the aggregated score:
/// ALLOW for 0..=30, REVIEW for 31..=70, BLOCK for 71..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Review,
    Block,
}

impl Decision {
    /// Derive the decision from an aggregated fraud score.
    pub fn from_score(score: u8) -> Self {
        if score <= ALLOW_THRESHOLD {
            Decision::Allow
        } else if score <= REVIEW_THRESHOLD {
            Decision::Review
        } else {
            Decision::Block
        }
    }

    /// Returns true if this decision allows the payment.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Review => "REVIEW",
            Decision::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_boundaries() {
        assert_eq!(Decision::from_score(0), Decision::Allow);
        assert_eq!(Decision::from_score(30), Decision::Allow);
        assert_eq!(Decision::from_score(31), Decision::Review);
        assert_eq!(Decision::from_score(70), Decision::Review);
        assert_eq!(Decision::from_score(71), Decision::Block);
        assert_eq!(Decision::from_score(100), Decision::Block);
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_string(&Decision::Block).unwrap();
        assert_eq!(json, "\"BLOCK\"");

        let parsed: Decision = serde_json::from_str("\"REVIEW\"").unwrap();
        assert_eq!(parsed, Decision::Review);
    }

    #[test]
    fn test_display() {
        assert_eq!(Decision::Allow.to_string(), "ALLOW");
        assert_eq!(Decision::Review.to_string(), "REVIEW");
        assert_eq!(Decision::Block.to_string(), "BLOCK");
    }
}
