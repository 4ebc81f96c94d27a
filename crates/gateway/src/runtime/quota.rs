//! Per-user daily request quota enforcement.
//!
//! [`QuotaLedger`] counts requests per user per calendar day (JST) and
//! checks them against fixed process-wide limits, with a stricter
//! sub-quota for image generation.  Counters live behind a
//! [`LedgerBackend`]: the durable implementation uses transactional
//! read-modify-write in the document store, the in-memory one is a
//! single-process fallback.  When the durable backend errors on a
//! check the ledger fails OPEN and admits the request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};

use sous_domain::error::Result;
use sous_storage::DocumentStore;

/// Requests of any kind per user per day.
pub const DAILY_TOTAL_LIMIT: u32 = 10;
/// Image-generating requests per user per day.
pub const DAILY_IMAGE_LIMIT: u32 = 3;

const COLLECTION: &str = "quotas";
const JST_OFFSET_SECS: i32 = 9 * 3600;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counters for one user on one day.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayUsage {
    pub total: u32,
    pub image: u32,
}

/// Quota left for a user today.  Floored at zero.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuotaRemaining {
    pub total_remaining: u32,
    pub image_remaining: u32,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: QuotaRemaining,
}

/// Full usage snapshot for one user.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub user_id: String,
    pub date: String,
    pub total_used: u32,
    pub total_limit: u32,
    pub total_remaining: u32,
    pub image_used: u32,
    pub image_limit: u32,
    pub image_remaining: u32,
    pub is_admin: bool,
    pub next_reset: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Day keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn jst_offset() -> FixedOffset {
    // 9h east of UTC is always a valid offset.
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// Today's calendar date in JST, as `YYYY-MM-DD`.
pub fn jst_day_key(now: DateTime<Utc>) -> String {
    now.with_timezone(&jst_offset()).format("%Y-%m-%d").to_string()
}

/// The next JST midnight, in UTC.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&jst_offset());
    let tomorrow = local.date_naive() + Duration::days(1);
    match tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(jst_offset()).single())
    {
        Some(midnight) => midnight.with_timezone(&Utc),
        // Unreachable for a fixed offset, but don't panic on a clock edge.
        None => now + Duration::days(1),
    }
}

fn record_id(user: &str, day: &str) -> String {
    format!("{user}_{day}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LedgerBackend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counter storage for the ledger.  Keys are `{user}_{day}`.
#[async_trait::async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn usage(&self, user: &str, day: &str) -> Result<DayUsage>;
    /// Atomic increment of the counters for one user-day.
    async fn add(&self, user: &str, day: &str, wants_image: bool) -> Result<()>;
    /// Zero the counters.  Returns false when no record existed.
    async fn reset(&self, user: &str, day: &str) -> Result<bool>;
    /// Usage of every user with a record for the given day.
    async fn usage_for_day(&self, day: &str) -> Result<Vec<(String, DayUsage)>>;
    fn tag(&self) -> &'static str;
}

// ── Durable backend ──────────────────────────────────────────────────

/// Counters in the document store, incremented inside a transaction so
/// two concurrent requests for the same user-day cannot lose an update.
pub struct DurableBackend {
    store: Arc<dyn DocumentStore>,
}

impl DurableBackend {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

fn usage_from_doc(doc: &Value) -> DayUsage {
    DayUsage {
        total: doc.get("total_count").and_then(Value::as_u64).unwrap_or(0) as u32,
        image: doc.get("image_count").and_then(Value::as_u64).unwrap_or(0) as u32,
    }
}

fn usage_doc(user: &str, day: &str, usage: DayUsage) -> Value {
    json!({
        "user_id": user,
        "date": day,
        "total_count": usage.total,
        "image_count": usage.image,
    })
}

#[async_trait::async_trait]
impl LedgerBackend for DurableBackend {
    async fn usage(&self, user: &str, day: &str) -> Result<DayUsage> {
        let doc = self.store.get(COLLECTION, &record_id(user, day)).await?;
        Ok(doc.as_ref().map(usage_from_doc).unwrap_or_default())
    }

    async fn add(&self, user: &str, day: &str, wants_image: bool) -> Result<()> {
        let user = user.to_owned();
        let day = day.to_owned();
        let id = record_id(&user, &day);
        self.store
            .transactional_update(
                COLLECTION,
                &id,
                Box::new(move |current| {
                    let mut usage = current.as_ref().map(usage_from_doc).unwrap_or_default();
                    usage.total += 1;
                    if wants_image {
                        usage.image += 1;
                    }
                    usage_doc(&user, &day, usage)
                }),
            )
            .await?;
        Ok(())
    }

    async fn reset(&self, user: &str, day: &str) -> Result<bool> {
        let id = record_id(user, day);
        let existed = self.store.get(COLLECTION, &id).await?.is_some();
        // A reset writes a fresh zero record rather than deleting.
        self.store
            .set(COLLECTION, &id, usage_doc(user, day, DayUsage::default()))
            .await?;
        Ok(existed)
    }

    async fn usage_for_day(&self, day: &str) -> Result<Vec<(String, DayUsage)>> {
        let docs = self.store.list(COLLECTION).await?;
        Ok(docs
            .iter()
            .filter(|doc| doc.get("date").and_then(Value::as_str) == Some(day))
            .filter_map(|doc| {
                let user = doc.get("user_id").and_then(Value::as_str)?;
                Some((user.to_owned(), usage_from_doc(doc)))
            })
            .collect())
    }

    fn tag(&self) -> &'static str {
        "durable"
    }
}

// ── In-memory backend ────────────────────────────────────────────────

/// Single-process fallback.  Correct only within one process; not a
/// substitute for the durable backend under multi-process deployment.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, DayUsage>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LedgerBackend for MemoryBackend {
    async fn usage(&self, user: &str, day: &str) -> Result<DayUsage> {
        Ok(self
            .records
            .read()
            .get(&record_id(user, day))
            .copied()
            .unwrap_or_default())
    }

    async fn add(&self, user: &str, day: &str, wants_image: bool) -> Result<()> {
        let mut records = self.records.write();
        let usage = records.entry(record_id(user, day)).or_default();
        usage.total += 1;
        if wants_image {
            usage.image += 1;
        }
        Ok(())
    }

    async fn reset(&self, user: &str, day: &str) -> Result<bool> {
        let mut records = self.records.write();
        let id = record_id(user, day);
        let existed = records.contains_key(&id);
        records.insert(id, DayUsage::default());
        Ok(existed)
    }

    async fn usage_for_day(&self, day: &str) -> Result<Vec<(String, DayUsage)>> {
        let suffix = format!("_{day}");
        Ok(self
            .records
            .read()
            .iter()
            .filter_map(|(key, usage)| {
                key.strip_suffix(&suffix).map(|user| (user.to_owned(), *usage))
            })
            .collect())
    }

    fn tag(&self) -> &'static str {
        "memory"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QuotaLedger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct QuotaLedger {
    backend: Arc<dyn LedgerBackend>,
    admins: RwLock<HashSet<String>>,
}

impl QuotaLedger {
    pub fn new(backend: Arc<dyn LedgerBackend>, admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            backend,
            admins: RwLock::new(admins.into_iter().collect()),
        }
    }

    /// Which backend is live, for health reporting.
    pub fn backend_tag(&self) -> &'static str {
        self.backend.tag()
    }

    fn full_remaining() -> QuotaRemaining {
        QuotaRemaining {
            total_remaining: DAILY_TOTAL_LIMIT,
            image_remaining: DAILY_IMAGE_LIMIT,
        }
    }

    /// Admission check.  Admins always pass; a backend read failure
    /// admits the request (fail open).
    pub async fn check(&self, user: &str, wants_image: bool) -> QuotaDecision {
        if self.is_admin(user) {
            return QuotaDecision {
                allowed: true,
                remaining: Self::full_remaining(),
            };
        }

        let day = jst_day_key(Utc::now());
        let usage = match self.backend.usage(user, &day).await {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(user, error = %e, "quota check failed, failing open");
                return QuotaDecision {
                    allowed: true,
                    remaining: Self::full_remaining(),
                };
            }
        };

        let remaining = QuotaRemaining {
            total_remaining: DAILY_TOTAL_LIMIT.saturating_sub(usage.total),
            image_remaining: DAILY_IMAGE_LIMIT.saturating_sub(usage.image),
        };
        let allowed = usage.total < DAILY_TOTAL_LIMIT
            && (!wants_image || usage.image < DAILY_IMAGE_LIMIT);

        QuotaDecision { allowed, remaining }
    }

    /// Record one completed request.  Best-effort; failures are logged.
    pub async fn increment(&self, user: &str, wants_image: bool) {
        if self.is_admin(user) {
            return;
        }
        let day = jst_day_key(Utc::now());
        if let Err(e) = self.backend.add(user, &day, wants_image).await {
            tracing::error!(user, error = %e, "quota increment failed");
        }
    }

    /// Usage snapshot for one user.
    pub async fn status(&self, user: &str) -> QuotaStatus {
        let now = Utc::now();
        let day = jst_day_key(now);
        let usage = match self.backend.usage(user, &day).await {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(user, error = %e, "quota status read failed");
                DayUsage::default()
            }
        };
        self.status_from(user, &day, usage, now)
    }

    fn status_from(&self, user: &str, day: &str, usage: DayUsage, now: DateTime<Utc>) -> QuotaStatus {
        QuotaStatus {
            user_id: user.to_owned(),
            date: day.to_owned(),
            total_used: usage.total,
            total_limit: DAILY_TOTAL_LIMIT,
            total_remaining: DAILY_TOTAL_LIMIT.saturating_sub(usage.total),
            image_used: usage.image,
            image_limit: DAILY_IMAGE_LIMIT,
            image_remaining: DAILY_IMAGE_LIMIT.saturating_sub(usage.image),
            is_admin: self.is_admin(user),
            next_reset: next_reset(now),
        }
    }

    /// Zero one user's counters for today.  Returns false when the user
    /// had no record.
    pub async fn reset(&self, user: &str) -> Result<bool> {
        let day = jst_day_key(Utc::now());
        self.backend.reset(user, &day).await
    }

    /// Zero every user's counters for today.  Returns how many records
    /// were reset.
    pub async fn reset_all(&self) -> Result<usize> {
        let day = jst_day_key(Utc::now());
        let users = self.backend.usage_for_day(&day).await?;
        let mut count = 0;
        for (user, _) in users {
            if self.backend.reset(&user, &day).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Today's usage for every active user, heaviest first.
    pub async fn all_stats(&self) -> Result<Vec<QuotaStatus>> {
        let now = Utc::now();
        let day = jst_day_key(now);
        let mut stats: Vec<QuotaStatus> = self
            .backend
            .usage_for_day(&day)
            .await?
            .into_iter()
            .map(|(user, usage)| self.status_from(&user, &day, usage, now))
            .collect();
        stats.sort_by(|a, b| b.total_used.cmp(&a.total_used).then(a.user_id.cmp(&b.user_id)));
        Ok(stats)
    }

    // ── Admin roster ─────────────────────────────────────────────────

    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.read().contains(user)
    }

    pub fn add_admin(&self, user: &str) -> bool {
        self.admins.write().insert(user.to_owned())
    }

    pub fn remove_admin(&self, user: &str) -> bool {
        self.admins.write().remove(user)
    }

    pub fn admins(&self) -> Vec<String> {
        let mut list: Vec<String> = self.admins.read().iter().cloned().collect();
        list.sort();
        list
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
