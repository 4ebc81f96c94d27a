//! Google ID-token verification via the tokeninfo endpoint.
//!
//! The credential is posted to Google's `tokeninfo` endpoint, which
//! validates the signature server-side.  We then check issuer,
//! audience, and expiry before trusting the claims.

use std::time::Duration;

use serde::Deserialize;

use sous_domain::error::{Error, Result};

use crate::traits::{IdentityVerifier, VerifiedIdentity};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const VALID_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Claims returned by the tokeninfo endpoint.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    /// Unix timestamp as a decimal string.
    exp: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

pub struct GoogleVerifier {
    http: reqwest::Client,
    /// Expected `aud` claim.  `None` skips the check (dev mode).
    client_id: Option<String>,
}

impl GoogleVerifier {
    pub fn new(client_id: Option<String>) -> Result<Self> {
        if client_id.is_none() {
            tracing::warn!("no google_client_id configured — audience check disabled");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, client_id })
    }

    fn validate(&self, info: TokenInfo) -> Result<VerifiedIdentity> {
        if !VALID_ISSUERS.contains(&info.iss.as_str()) {
            return Err(Error::Auth(format!("unexpected issuer: {}", info.iss)));
        }

        if let Some(expected) = &self.client_id {
            if &info.aud != expected {
                return Err(Error::Auth("credential audience mismatch".into()));
            }
        }

        let exp: i64 = info
            .exp
            .parse()
            .map_err(|_| Error::Auth("malformed expiry claim".into()))?;
        if exp <= chrono_now_unix() {
            return Err(Error::Auth("credential expired".into()));
        }

        Ok(VerifiedIdentity {
            subject: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }
}

fn chrono_now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity> {
        let resp = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| Error::Http(format!("tokeninfo request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Auth(format!(
                "credential rejected (HTTP {})",
                resp.status()
            )));
        }

        let info: TokenInfo = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed tokeninfo response: {e}")))?;

        self.validate(info)
    }
}
