use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditLog, ClientInfo};
use crate::domain::TokenKind;
use crate::error::AuthError;
use crate::storage::EdgeStorage;

use super::password::verify_password;
use super::tokens::TokenService;

/// Tokens handed back by login and refresh.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_ms: u64,
}

/// Login, logout, and refresh flows over the token service.
///
/// Every outcome — success or failure — emits an audit event carrying
/// the client's IP and user agent.
pub struct AuthService {
    tokens: Arc<TokenService>,
    storage: Arc<dyn EdgeStorage>,
    audit: AuditLog,
}

impl AuthService {
    pub fn new(tokens: Arc<TokenService>, storage: Arc<dyn EdgeStorage>, audit: AuditLog) -> Self {
        AuthService {
            tokens,
            storage,
            audit,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginTokens, AuthError> {
        let user = self
            .storage
            .find_user_by_username(username)
            .await
            .map_err(|e| {
                warn!(error = %e, "User lookup failed during login");
                AuthError::Unavailable
            })?;

        let Some(user) = user else {
            self.audit.emit(AuditEvent::auth_anonymous(
                "LOGIN_FAILED",
                client,
                json!({"username": username, "reason": "user_not_found"}),
            ));
            warn!(user = username, "Login failed, user not found");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            self.audit.emit(AuditEvent::auth(
                username,
                "LOGIN_FAILED",
                client,
                json!({"username": username, "reason": "account_inactive"}),
            ));
            warn!(user = username, "Login failed, account inactive");
            return Err(AuthError::AccountInactive);
        }

        if user.is_locked {
            self.audit.emit(AuditEvent::auth(
                username,
                "LOGIN_FAILED",
                client,
                json!({"username": username, "reason": "account_locked"}),
            ));
            warn!(user = username, "Login failed, account locked");
            return Err(AuthError::AccountLocked);
        }

        if !verify_password(password, &user.password_hash) {
            if let Err(e) = self.storage.record_login_failure(username).await {
                warn!(error = %e, "Failed to record login failure");
            }

            self.audit.emit(AuditEvent::auth(
                username,
                "LOGIN_FAILED",
                client,
                json!({
                    "username": username,
                    "reason": "invalid_password",
                    "failed_attempts": user.failed_login_attempts + 1,
                }),
            ));
            warn!(user = username, "Login failed, invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.tokens.issue(username, TokenKind::Access).await?;
        let refresh_token = self.tokens.issue(username, TokenKind::Refresh).await?;

        if let Err(e) = self.storage.record_login_success(username).await {
            warn!(error = %e, "Failed to update last login");
        }

        self.audit.emit(AuditEvent::auth(
            username,
            "LOGIN",
            client,
            json!({"method": "password", "success": true}),
        ));
        info!(user = username, "User logged in");

        Ok(LoginTokens {
            access_token,
            refresh_token,
            expires_in_ms: self.tokens.access_ttl().as_millis() as u64,
        })
    }

    pub async fn logout(&self, token: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let Some(username) = self.tokens.extract_subject(token) else {
            warn!("Logout failed, invalid token");
            return Err(AuthError::TokenInvalid);
        };

        self.tokens.revoke(token).await?;

        self.audit.emit(AuditEvent::auth(
            username.clone(),
            "LOGOUT",
            client,
            json!({"method": "token_invalidation"}),
        ));
        info!(user = %username, "User logged out");

        Ok(())
    }

    /// The refresh token is reused, not rotated: callers get a new
    /// access token alongside the refresh token they presented.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<LoginTokens, AuthError> {
        let claims = self.tokens.validate(refresh_token).await?;

        if claims.kind() != Some(TokenKind::Refresh) {
            warn!(user = %claims.sub, "Refresh attempted with a non-refresh token");
            return Err(AuthError::TokenInvalid);
        }

        let user = self
            .storage
            .find_user_by_username(&claims.sub)
            .await
            .map_err(|e| {
                warn!(error = %e, "User lookup failed during refresh");
                AuthError::Unavailable
            })?;

        if !user.as_ref().is_some_and(|u| u.is_active) {
            warn!(user = %claims.sub, "Refresh failed, user missing or inactive");
            return Err(AuthError::UserNoLongerValid);
        }

        let access_token = self.tokens.issue(&claims.sub, TokenKind::Access).await?;

        self.audit.emit(AuditEvent::auth(
            claims.sub.clone(),
            "REFRESH_TOKEN",
            client,
            json!({"method": "refresh_token"}),
        ));
        info!(user = %claims.sub, "Token refreshed");

        Ok(LoginTokens {
            access_token,
            refresh_token: refresh_token.to_string(),
            expires_in_ms: self.tokens.access_ttl().as_millis() as u64,
        })
    }
}
