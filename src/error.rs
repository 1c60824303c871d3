use thiserror::Error;

/// Authentication failures surfaced to clients.
///
/// Every variant maps to 401 except `Unavailable`, which signals a durable
/// store outage on a critical path (503). Infrastructure degradation on
/// non-critical paths is logged and never surfaced.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Account is locked")]
    AccountLocked,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("User account is no longer valid")]
    UserNoLongerValid,

    #[error("Authentication temporarily unavailable")]
    Unavailable,
}

impl AuthError {
    /// True when the failure is a client-side credential/token problem.
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, AuthError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_client_safe() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
        assert_eq!(AuthError::AccountLocked.to_string(), "Account is locked");
        assert_eq!(
            AuthError::Unavailable.to_string(),
            "Authentication temporarily unavailable"
        );
    }

    #[test]
    fn test_unavailable_is_not_unauthorized() {
        assert!(AuthError::TokenRevoked.is_unauthorized());
        assert!(!AuthError::Unavailable.is_unauthorized());
    }
}
