use serde::{Deserialize, Serialize};

/// Session token configuration.
///
/// Login exchanges a Google ID credential for a session token signed
/// with HMAC-SHA256.  The signing secret is read once at startup from
/// `secret_env`; if the env var is unset the server mints a random
/// per-process secret (sessions then die with the process).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    /// Expected OAuth audience (client ID) of incoming credentials.
    /// When `None`, the audience check is skipped (dev mode).
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default = "d_ttl_hours")]
    pub session_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: d_secret_env(),
            google_client_id: None,
            session_ttl_hours: 24,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_secret_env() -> String {
    "SOUS_SESSION_SECRET".into()
}
fn d_ttl_hours() -> u64 {
    24
}
