use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::Claims;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// HMAC-SHA256 needs at least 256 bits of key material.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("signing secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakKey,

    #[error("malformed token")]
    Malformed,

    #[error("signature verification failed")]
    BadSignature,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Compact-JWT codec, HS256 only.
///
/// The declared algorithm must match the configured one — a token
/// announcing anything else is rejected before signature verification
/// (downgrade guard). Expiry is strict: no clock skew tolerance.
#[derive(Debug)]
pub struct JwtCodec {
    secret: Vec<u8>,
}

impl JwtCodec {
    pub fn new(secret: &[u8]) -> Result<Self, JwtError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(JwtError::WeakKey);
        }
        Ok(JwtCodec {
            secret: secret.to_vec(),
        })
    }

    pub fn encode(&self, claims: &Claims) -> String {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };

        // Serializing these structs cannot fail.
        let header_json = serde_json::to_vec(&header).expect("header serialization");
        let claims_json = serde_json::to_vec(claims).expect("claims serialization");

        let mut token = String::new();
        token.push_str(&URL_SAFE_NO_PAD.encode(header_json));
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(claims_json));

        let signature = self.sign(token.as_bytes());
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));

        token
    }

    /// Full validation: structure, algorithm, signature, strict expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.decode_unverified_expiry(token)?;

        if Utc::now().timestamp() >= claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }

    /// Structure, algorithm, and signature checks without the expiry
    /// claim — used to recover the subject and residual TTL during
    /// revocation and logging.
    pub fn decode_unverified_expiry(&self, token: &str) -> Result<Claims, JwtError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(JwtError::Malformed),
            };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| JwtError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_json).map_err(|_| JwtError::Malformed)?;

        if header.alg != ALGORITHM {
            return Err(JwtError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| JwtError::Malformed)?;

        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("key length validated");
        mac.update(&token.as_bytes()[..signing_input_len]);
        mac.verify_slice(&signature)
            .map_err(|_| JwtError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| JwtError::Malformed)?;
        serde_json::from_slice(&claims_json).map_err(|_| JwtError::Malformed)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("key length validated");
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}
