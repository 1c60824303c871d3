use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{Claims, TokenKind};
use crate::error::AuthError;
use crate::kv::KvStore;
use crate::storage::EdgeStorage;

use super::jwt::{JwtCodec, JwtError};

const KV_TOKEN_PREFIX: &str = "jwt:token:";
const KV_BLACKLIST_PREFIX: &str = "jwt:blacklist:";

/// Stateful token service with dual storage.
///
/// The KV tier gives the sub-millisecond validation path, the durable
/// store survives restarts, and the blacklist overlay revokes instantly
/// without purging either. Auth decisions are fail-closed: when the
/// blacklist cannot be read, the token is rejected.
pub struct TokenService {
    codec: JwtCodec,
    kv: Arc<dyn KvStore>,
    storage: Arc<dyn EdgeStorage>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        codec: JwtCodec,
        kv: Arc<dyn KvStore>,
        storage: Arc<dyn EdgeStorage>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        TokenService {
            codec,
            kv,
            storage,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign a token and record it in both tiers. The durable write is
    /// the one that matters: its failure fails the issuance. The KV
    /// write is a cache warm-up; validation repopulates it on miss.
    pub async fn issue(&self, username: &str, kind: TokenKind) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let now = Utc::now();
        let expires_at = now + chrono::Duration::milliseconds(ttl.as_millis() as i64);

        let claims = Claims {
            sub: username.to_string(),
            user_id: username.to_string(),
            token_type: kind.as_claim().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = self.codec.encode(&claims);

        if let Err(e) = self
            .kv
            .set(&format!("{KV_TOKEN_PREFIX}{token}"), username, ttl)
            .await
        {
            warn!(error = %e, "KV write failed during token issuance");
        }

        if let Err(e) = self
            .storage
            .save_token(username, &token, kind, expires_at)
            .await
        {
            warn!(user = username, error = %e, "Durable token write failed, refusing issuance");
            return Err(AuthError::Unavailable);
        }

        debug!(user = username, kind = %kind, expires_at = %expires_at, "Issued token");
        Ok(token)
    }

    /// Layered validation: blacklist, then signature/expiry, then the
    /// KV fast path, then the durable store (repopulating the KV).
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        match self.kv.exists(&format!("{KV_BLACKLIST_PREFIX}{token}")).await {
            Ok(true) => {
                debug!("Token is blacklisted");
                return Err(AuthError::TokenRevoked);
            }
            Ok(false) => {}
            Err(e) => {
                // Cannot prove the token was not revoked.
                warn!(error = %e, "Blacklist read failed, rejecting token");
                return Err(AuthError::TokenInvalid);
            }
        }

        let claims = self.codec.decode(token).map_err(|e| match e {
            JwtError::Expired => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })?;

        let token_key = format!("{KV_TOKEN_PREFIX}{token}");
        match self.kv.get(&token_key).await {
            Ok(Some(_)) => {
                debug!("Token validated from KV cache");
                return Ok(claims);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "KV token read failed, consulting durable store"),
        }

        let exists = self
            .storage
            .token_exists(&claims.sub, token)
            .await
            .map_err(|e| {
                warn!(error = %e, "Durable token lookup failed, rejecting token");
                AuthError::TokenInvalid
            })?;

        if !exists {
            debug!("Token not found in KV or durable store");
            return Err(AuthError::TokenInvalid);
        }

        let remaining_ms = claims.remaining_ms(Utc::now().timestamp_millis());
        if remaining_ms > 0 {
            if let Err(e) = self
                .kv
                .set(
                    &token_key,
                    &claims.sub,
                    Duration::from_millis(remaining_ms as u64),
                )
                .await
            {
                warn!(error = %e, "KV repopulation failed after durable hit");
            }
        }

        debug!("Token validated from durable store (KV miss)");
        Ok(claims)
    }

    /// Revoke a token. The blacklist write is authoritative: its
    /// failure fails the revocation. The two deletes are best-effort.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = self
            .codec
            .decode_unverified_expiry(token)
            .map_err(|_| AuthError::TokenInvalid)?;

        let remaining_ms = claims.remaining_ms(Utc::now().timestamp_millis());
        if remaining_ms > 0 {
            self.kv
                .set(
                    &format!("{KV_BLACKLIST_PREFIX}{token}"),
                    "true",
                    Duration::from_millis(remaining_ms as u64),
                )
                .await
                .map_err(|e| {
                    warn!(error = %e, "Blacklist write failed, revocation aborted");
                    AuthError::Unavailable
                })?;
            debug!(remaining_ms, "Token blacklisted for remaining lifetime");
        }

        if let Err(e) = self.kv.del(&format!("{KV_TOKEN_PREFIX}{token}")).await {
            warn!(error = %e, "KV token delete failed during revocation");
        }
        if let Err(e) = self.storage.delete_token(&claims.sub, token).await {
            warn!(error = %e, "Durable token delete failed during revocation");
        }

        debug!(user = %claims.sub, "Token revoked");
        Ok(())
    }

    /// Recover the subject without semantic validation (signature is
    /// still checked; expiry is not).
    pub fn extract_subject(&self, token: &str) -> Option<String> {
        self.codec
            .decode_unverified_expiry(token)
            .map(|claims| claims.sub)
            .ok()
    }

}
