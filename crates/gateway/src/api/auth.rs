//! Authentication — credential exchange and session tokens.
//!
//! `POST /v1/auth/google` verifies an externally-issued Google ID token
//! and exchanges it for a signed session token.  Every protected route
//! then carries `Authorization: Bearer <session token>`; the
//! [`require_session`] middleware verifies it and attaches the claims
//! to the request.
//!
//! Tokens are `base64url(claims_json) . hex(hmac_sha256(secret, payload))`.
//! Stateless on purpose: nothing to store or revoke server-side, expiry
//! is in the signed claims.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use sous_domain::error::{Error, Result};
use sous_providers::VerifiedIdentity;

use crate::api::api_error;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const B64: base64::engine::general_purpose::GeneralPurpose =
    base64::engine::general_purpose::URL_SAFE_NO_PAD;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session tokens
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The authenticated user attached to protected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Stable user ID (the identity provider's subject).
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// Issues and verifies HMAC-signed session tokens.
pub struct SessionKeyring {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionKeyring {
    pub fn new(secret: Vec<u8>, ttl_hours: u32) -> Self {
        Self {
            secret,
            ttl: Duration::hours(ttl_hours as i64),
        }
    }

    pub fn issue(&self, identity: &VerifiedIdentity) -> Result<String> {
        let claims = SessionClaims {
            sub: identity.subject.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        let payload = B64.encode(serde_json::to_vec(&claims)?);
        let sig = self.sign(payload.as_bytes())?;
        Ok(format!("{payload}.{}", hex::encode(sig)))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let (payload, sig_hex) = token
            .split_once('.')
            .ok_or_else(|| Error::Auth("malformed session token".into()))?;

        let expected = self.sign(payload.as_bytes())?;
        let provided =
            hex::decode(sig_hex).map_err(|_| Error::Auth("malformed signature".into()))?;
        if !bool::from(provided.as_slice().ct_eq(&expected)) {
            return Err(Error::Auth("invalid session signature".into()));
        }

        let raw = B64
            .decode(payload)
            .map_err(|_| Error::Auth("malformed token payload".into()))?;
        let claims: SessionClaims =
            serde_json::from_slice(&raw).map_err(|_| Error::Auth("malformed claims".into()))?;

        if claims.exp < Utc::now().timestamp() {
            return Err(Error::Auth("session expired".into()));
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| Error::Auth("invalid session secret".into()))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Middleware
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Axum middleware enforcing a valid session token on protected
/// routes.  Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    match state.sessions.verify(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => api_error(
            axum::http::StatusCode::UNAUTHORIZED,
            format!("unauthorized: {e}"),
        ),
    }
}

/// Middleware for admin routes, layered after [`require_session`].
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let is_admin = req
        .extensions()
        .get::<SessionClaims>()
        .map(|c| state.ledger.is_admin(&c.sub))
        .unwrap_or(false);

    if !is_admin {
        return api_error(axum::http::StatusCode::FORBIDDEN, "admin access required");
    }
    next.run(req).await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/auth/google
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// The Google-issued ID token from the client-side sign-in flow.
    pub credential: String,
}

pub async fn login(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<LoginRequest>,
) -> Response {
    let identity = match state.verifier.verify(&body.credential).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "credential verification failed");
            return api_error(
                axum::http::StatusCode::UNAUTHORIZED,
                "credential verification failed",
            );
        }
    };

    match state.sessions.issue(&identity) {
        Ok(token) => axum::Json(serde_json::json!({
            "token": token,
            "user": {
                "id": identity.subject,
                "email": identity.email,
                "name": identity.name,
                "picture": identity.picture,
            },
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "session issue failed");
            api_error(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "could not create session",
            )
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/auth/me
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn me(
    State(state): State<AppState>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
) -> Response {
    axum::Json(serde_json::json!({
        "id": claims.sub,
        "email": claims.email,
        "name": claims.name,
        "is_admin": state.ledger.is_admin(&claims.sub),
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity {
            subject: "user-1".into(),
            email: Some("u@example.com".into()),
            name: Some("U".into()),
            picture: None,
        }
    }

    #[test]
    fn issue_verify_round_trip() {
        let keyring = SessionKeyring::new(b"secret".to_vec(), 24);
        let token = keyring.issue(&identity()).unwrap();
        let claims = keyring.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("u@example.com"));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keyring = SessionKeyring::new(b"secret".to_vec(), 24);
        let token = keyring.issue(&identity()).unwrap();
        let (payload, sig) = token.split_once('.').unwrap();

        let mut forged = B64.decode(payload).unwrap();
        forged[10] ^= 1;
        let forged_token = format!("{}.{sig}", B64.encode(forged));
        assert!(keyring.verify(&forged_token).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = SessionKeyring::new(b"secret-a".to_vec(), 24)
            .issue(&identity())
            .unwrap();
        assert!(SessionKeyring::new(b"secret-b".to_vec(), 24).verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keyring = SessionKeyring::new(b"secret".to_vec(), 0);
        let mut claims = SessionClaims {
            sub: "u".into(),
            email: None,
            name: None,
            exp: Utc::now().timestamp() - 60,
        };
        // Build an otherwise-valid token with a past expiry.
        let payload = B64.encode(serde_json::to_vec(&claims).unwrap());
        let sig = keyring.sign(payload.as_bytes()).unwrap();
        let token = format!("{payload}.{}", hex::encode(sig));
        assert!(keyring.verify(&token).is_err());

        claims.exp = Utc::now().timestamp() + 60;
        let payload = B64.encode(serde_json::to_vec(&claims).unwrap());
        let sig = keyring.sign(payload.as_bytes()).unwrap();
        let token = format!("{payload}.{}", hex::encode(sig));
        assert!(keyring.verify(&token).is_ok());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let keyring = SessionKeyring::new(b"secret".to_vec(), 24);
        assert!(keyring.verify("").is_err());
        assert!(keyring.verify("no-dot-here").is_err());
        assert!(keyring.verify("payload.nothex!").is_err());
    }
}
