use serde::{Deserialize, Serialize};

/// Quota ledger seed configuration.
///
/// The daily limits themselves are process-wide constants; this only
/// carries the users exempt from them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LimitsConfig {
    /// User IDs seeded into the admin set at startup.  Admins bypass the
    /// daily limits and may use the admin endpoints.
    #[serde(default)]
    pub admins: Vec<String>,
}
