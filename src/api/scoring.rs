use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fraud::FraudEngine;

use super::request::FraudCheckRequest;
use super::response::{ActuatorHealth, FieldErrorResponse, FraudCheckResponse, ServiceHealth};

const API_KEY_HEADER: &str = "X-API-KEY";

/// Shared state of the scoring service.
pub struct ScoringState {
    pub engine: Arc<FraudEngine>,
    pub api_key: String,
}

/// Router for the scoring service: everything except the actuator
/// health probe sits behind the pre-shared key.
pub fn scoring_router(state: Arc<ScoringState>) -> Router {
    let guarded = Router::new()
        .route("/api/v1/invoices/validate", post(validate_invoice))
        .route("/api/v1/invoices/health", get(service_health))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state);

    Router::new()
        .route("/actuator/health", get(actuator_health))
        .merge(guarded)
}

async fn require_api_key(
    State(state): State<Arc<ScoringState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if provided.is_empty() {
        warn!(path = %request.uri().path(), "Missing API key");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Missing X-API-KEY header"})),
        )
            .into_response();
    }

    if provided != state.api_key {
        warn!(path = %request.uri().path(), "Invalid API key");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid X-API-KEY"})),
        )
            .into_response();
    }

    debug!(path = %request.uri().path(), "API key accepted");
    next.run(request).await
}

async fn validate_invoice(
    State(state): State<Arc<ScoringState>>,
    Json(request): Json<FraudCheckRequest>,
) -> Response {
    let check = match request.validate() {
        Ok(check) => check,
        Err(errors) => {
            return (StatusCode::BAD_REQUEST, Json(FieldErrorResponse::new(errors)))
                .into_response();
        }
    };

    let outcome = state.engine.check(check).await;
    (StatusCode::OK, Json(FraudCheckResponse::from(outcome))).into_response()
}

async fn actuator_health() -> impl IntoResponse {
    Json(ActuatorHealth::up())
}

async fn service_health() -> impl IntoResponse {
    Json(ServiceHealth::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fraud::DEFAULT_RULE_BUDGET;
    use crate::kv::MemoryKv;
    use crate::storage::MockStorage;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    const API_KEY: &str = "test-api-key";

    fn app() -> Router {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(MockStorage::new());
        let engine = Arc::new(FraudEngine::new(kv, storage, DEFAULT_RULE_BUDGET));

        scoring_router(Arc::new(ScoringState {
            engine,
            api_key: API_KEY.to_string(),
        }))
    }

    fn validate_request(api_key: Option<&str>, body: &str) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri("/api/v1/invoices/validate")
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("X-API-KEY", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const CLEAN_BODY: &str = r#"{"iban":"BG80BNBG96611020345678","amount":"1500.00","vendorId":1,"invoiceNumber":"INV-001"}"#;

    #[tokio::test]
    async fn test_missing_api_key_is_unauthorized() {
        let response = app()
            .oneshot(validate_request(None, CLEAN_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Missing X-API-KEY header");
    }

    #[tokio::test]
    async fn test_wrong_api_key_is_unauthorized() {
        let response = app()
            .oneshot(validate_request(Some("wrong"), CLEAN_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid X-API-KEY");
    }

    #[tokio::test]
    async fn test_clean_invoice_allows() {
        let response = app()
            .oneshot(validate_request(Some(API_KEY), CLEAN_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["decision"], "ALLOW");
        assert_eq!(json["fraudScore"], 0);
        assert_eq!(json["riskFactors"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_invalid_body_returns_field_errors() {
        let response = app()
            .oneshot(validate_request(Some(API_KEY), r#"{"amount":"-1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], 400);
        assert_eq!(json["errors"]["amount"], "Amount must be positive");
        assert_eq!(json["errors"]["iban"], "IBAN cannot be null or empty");
    }

    #[tokio::test]
    async fn test_actuator_health_is_open() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/actuator/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "UP");
    }

    #[tokio::test]
    async fn test_service_health_requires_api_key() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/v1/invoices/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
