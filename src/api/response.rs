use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::LoginTokens;
use crate::domain::Decision;
use crate::fraud::CheckOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in milliseconds.
    pub expires_in: u64,
}

impl From<LoginTokens> for LoginResponse {
    fn from(tokens: LoginTokens) -> Self {
        LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckResponse {
    pub decision: Decision,
    pub fraud_score: u8,
    pub risk_factors: Vec<String>,
}

impl From<CheckOutcome> for FraudCheckResponse {
    fn from(outcome: CheckOutcome) -> Self {
        FraudCheckResponse {
            decision: outcome.decision,
            fraud_score: outcome.score,
            risk_factors: outcome.risk_factors,
        }
    }
}

/// Uniform error body for 4xx/5xx responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn of(status: StatusCode, message: impl Into<String>) -> Self {
        ErrorResponse {
            status: status.as_u16(),
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 400 body carrying one message per invalid field.
#[derive(Debug, Serialize)]
pub struct FieldErrorResponse {
    pub status: u16,
    pub errors: BTreeMap<&'static str, String>,
    pub timestamp: DateTime<Utc>,
}

impl FieldErrorResponse {
    pub fn new(errors: BTreeMap<&'static str, String>) -> Self {
        FieldErrorResponse {
            status: StatusCode::BAD_REQUEST.as_u16(),
            errors,
            timestamp: Utc::now(),
        }
    }
}

/// Status/message pair used by logout and error bodies that predate
/// the uniform shape.
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ActuatorHealth {
    pub status: &'static str,
}

impl ActuatorHealth {
    pub fn up() -> Self {
        ActuatorHealth { status: "UP" }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub message: &'static str,
}

impl ServiceHealth {
    pub fn ok() -> Self {
        ServiceHealth {
            status: "ok",
            message: "Fraud detection service operational",
        }
    }
}
