//! Password hashing, signed session tokens, and the auth middleware.
//!
//! Tokens are JWT-shaped (`header.claims.signature`) and HMAC-SHA256 signed
//! with the configured secret. Seven-day expiry, as the original deployment
//! used.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::ApiError;
use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_TTL_DAYS: i64 = 7;

/// Authenticated caller identity, inserted as a request extension by the
/// middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Check a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for the user, valid for seven days.
    pub fn sign(&self, user_id: &str, username: &str) -> String {
        let now = Utc::now();
        let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("static header"));
        let claims =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims are serializable"));
        let signing_input = format!("{header}.{claims}");
        let signature = URL_SAFE_NO_PAD.encode(self.mac(signing_input.as_bytes()));
        format!("{signing_input}.{signature}")
    }

    /// Verify signature and expiry, returning the embedded session.
    pub fn verify(&self, token: &str) -> Result<SessionInfo, ApiError> {
        let mut parts = token.splitn(3, '.');
        let (Some(header), Some(claims), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ApiError::Unauthorized("Malformed token".into()));
        };

        let signing_input = format!("{header}.{claims}");
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ApiError::Unauthorized("Malformed token".into()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key size");
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ApiError::Unauthorized("Invalid token signature".into()))?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(claims)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| ApiError::Unauthorized("Malformed token claims".into()))?;

        if claims.exp < Utc::now().timestamp() {
            return Err(ApiError::Unauthorized("Token expired".into()));
        }

        Ok(SessionInfo {
            user_id: claims.sub,
            username: claims.username,
        })
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Require a valid bearer token and expose the session to handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    let session = state.tokens.verify(token)?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("operator123").unwrap();
        assert!(verify_password("operator123", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_token_roundtrip() {
        let signer = TokenSigner::new(b"test-secret".to_vec());
        let token = signer.sign("user-1", "operator");

        let session = signer.verify(&token).unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.username, "operator");
    }

    #[test]
    fn test_token_rejects_tampering() {
        let signer = TokenSigner::new(b"test-secret".to_vec());
        let token = signer.sign("user-1", "operator");

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(signer.verify(&tampered).is_err());

        let other_signer = TokenSigner::new(b"other-secret".to_vec());
        assert!(other_signer.verify(&token).is_err());
    }

    #[test]
    fn test_token_rejects_garbage() {
        let signer = TokenSigner::new(b"test-secret".to_vec());
        assert!(signer.verify("not-a-token").is_err());
        assert!(signer.verify("a.b.c").is_err());
        assert!(signer.verify("").is_err());
    }
}
