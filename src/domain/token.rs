use serde::{Deserialize, Serialize};
use std::fmt;

/// Token kind carried in the `type` claim and the durable token store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Claim value, as embedded in the signed payload.
    pub fn as_claim(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    pub fn from_claim(s: &str) -> Option<Self> {
        match s {
            "access" => Some(TokenKind::Access),
            "refresh" => Some(TokenKind::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    // Uppercase form, used by the durable token store.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("ACCESS"),
            TokenKind::Refresh => f.write_str("REFRESH"),
        }
    }
}

/// JWT claim set.
///
/// `iat`/`exp` are epoch seconds; `sub` is the login name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Remaining lifetime in milliseconds at `now` (epoch millis); never negative.
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.exp * 1000 - now_ms).max(0)
    }

    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_claim(&self.token_type)
    }
}
