use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditLog, ClientInfo};
use crate::auth::AuthService;
use crate::error::AuthError;

use super::client::ScoringClient;
use super::request::{FraudCheckRequest, LoginRequest, RefreshRequest};
use super::response::{
    ActuatorHealth, ErrorResponse, FieldErrorResponse, LoginResponse, ServiceHealth, StatusMessage,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Shared state of the edge service.
pub struct EdgeState {
    pub auth: AuthService,
    pub scoring: ScoringClient,
    pub audit: AuditLog,
}

pub fn edge_router(state: Arc<EdgeState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/v1/invoices/validate", post(validate_invoice))
        .route("/actuator/health", get(actuator_health))
        .route("/api/v1/invoices/health", get(service_health))
        .with_state(state)
}

/// Client IP preferring the first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the peer address.
pub fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let ip_address = forwarded
        .or(real_ip)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string();

    ClientInfo {
        ip_address,
        user_agent,
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|t| !t.is_empty())
}

fn auth_error(err: AuthError) -> Response {
    let status = if err.is_unauthorized() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ErrorResponse::of(status, err.to_string()))).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::of(StatusCode::BAD_REQUEST, message)),
    )
        .into_response()
}

async fn login(
    State(state): State<Arc<EdgeState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let client = client_info(&headers, peer.map(|p| p.0));

    if request.username.trim().is_empty() {
        return bad_request("Username is required");
    }
    if request.password.trim().is_empty() {
        return bad_request("Password is required");
    }

    info!(user = %request.username, ip = %client.ip_address, "Login request received");

    match state
        .auth
        .login(&request.username, &request.password, &client)
        .await
    {
        Ok(tokens) => (StatusCode::OK, Json(LoginResponse::from(tokens))).into_response(),
        Err(err) => auth_error(err),
    }
}

async fn logout(
    State(state): State<Arc<EdgeState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let client = client_info(&headers, peer.map(|p| p.0));

    let Some(token) = bearer_token(&headers) else {
        warn!(ip = %client.ip_address, "Logout request without token");
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusMessage {
                status: "error",
                message: "Authorization header is required",
            }),
        )
            .into_response();
    };

    match state.auth.logout(token, &client).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusMessage {
                status: "success",
                message: "Logged out successfully",
            }),
        )
            .into_response(),
        Err(err) => auth_error(err),
    }
}

async fn refresh(
    State(state): State<Arc<EdgeState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<RefreshRequest>,
) -> Response {
    let client = client_info(&headers, peer.map(|p| p.0));

    if request.refresh_token.trim().is_empty() {
        return bad_request("Refresh token is required");
    }

    info!(ip = %client.ip_address, "Token refresh request received");

    match state.auth.refresh(&request.refresh_token, &client).await {
        Ok(tokens) => (StatusCode::OK, Json(LoginResponse::from(tokens))).into_response(),
        Err(err) => auth_error(err),
    }
}

async fn validate_invoice(
    State(state): State<Arc<EdgeState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<FraudCheckRequest>,
) -> Response {
    let client = client_info(&headers, peer.map(|p| p.0));

    let Some(token) = bearer_token(&headers) else {
        return auth_error(AuthError::TokenInvalid);
    };

    let claims = match state.auth.tokens().validate(token).await {
        Ok(claims) => claims,
        Err(err) => return auth_error(err),
    };
    let username = claims.sub;

    let check = match request.validate() {
        Ok(check) => check,
        Err(errors) => {
            return (StatusCode::BAD_REQUEST, Json(FieldErrorResponse::new(errors)))
                .into_response();
        }
    };

    info!(
        user = %username,
        invoice = %check.invoice_number,
        amount = %check.amount,
        "Invoice validation request"
    );

    state.audit.emit(AuditEvent::invoice_validation(
        username.clone(),
        check.invoice_number.clone(),
        &client,
        json!({
            "iban": check.iban,
            "amount": check.amount.to_string(),
            "vendorId": check.vendor_id,
        }),
    ));

    match state.scoring.validate_invoice(&request).await {
        Ok(response) => {
            info!(
                user = %username,
                invoice = %check.invoice_number,
                decision = %response.decision,
                score = response.fraud_score,
                "Invoice validation completed"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Upstream scoring call failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::of(
                    StatusCode::BAD_GATEWAY,
                    "Scoring service unavailable",
                )),
            )
                .into_response()
        }
    }
}

async fn actuator_health() -> impl IntoResponse {
    Json(ActuatorHealth::up())
}

async fn service_health() -> impl IntoResponse {
    Json(ServiceHealth::ok())
}
