use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// GCP project for the Firestore backend.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Env var holding the OAuth access token used for Firestore REST
    /// calls.
    #[serde(default = "d_token_env")]
    pub access_token_env: String,
    /// Readiness poll at bootstrap: attempts × interval.  When the
    /// durable backend never becomes ready, the process falls back to
    /// the in-memory store for its whole lifetime.
    #[serde(default = "d_attempts")]
    pub readiness_attempts: u32,
    #[serde(default = "d_interval_ms")]
    pub readiness_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            project_id: None,
            access_token_env: d_token_env(),
            readiness_attempts: 3,
            readiness_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Firestore,
    #[default]
    Memory,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_token_env() -> String {
    "FIRESTORE_ACCESS_TOKEN".into()
}
fn d_attempts() -> u32 {
    3
}
fn d_interval_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_lowercase() {
        let cfg: StorageConfig = toml::from_str(
            r#"
            backend = "firestore"
            project_id = "demo"
        "#,
        )
        .unwrap();
        assert_eq!(cfg.backend, StorageBackend::Firestore);
        assert_eq!(cfg.project_id.as_deref(), Some("demo"));
    }
}
