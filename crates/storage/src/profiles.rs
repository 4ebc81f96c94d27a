//! Profile store.
//!
//! Profiles are created lazily on first access and versioned on every
//! write.  Feedback and cooking sessions land in subcollections, with a
//! capped recent-history mirror kept on the profile document itself so
//! one read is enough for the common path.  Storage failures degrade to
//! defaults and logs; they never take a turn down.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use sous_domain::profile::{
    CookingSession, PreferenceSummary, ProfilePatch, RecipeFeedback, UserProfile,
};

use crate::document::DocumentStore;

const COLLECTION: &str = "profiles";

/// Entries kept in the on-profile recent history mirrors.
const RECENT_CAP: usize = 10;

pub struct ProfileStore {
    store: Arc<dyn DocumentStore>,
}

/// Aggregated cooking history for one user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CookingStats {
    pub total_sessions: usize,
    pub successful_sessions: usize,
    /// 0.0 when no sessions exist.
    pub success_rate: f64,
    pub total_feedback: usize,
    /// `None` when no feedback exists.
    pub average_rating: Option<f64>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn feedback_collection(user_id: &str) -> String {
        format!("{COLLECTION}/{user_id}/feedback")
    }

    fn sessions_collection(user_id: &str) -> String {
        format!("{COLLECTION}/{user_id}/sessions")
    }

    /// Fetch the profile, creating and persisting a fresh one if
    /// absent.  On storage failure an unpersisted default is returned.
    pub async fn get_or_create(&self, user_id: &str) -> UserProfile {
        match self.store.get(COLLECTION, user_id).await {
            Ok(Some(doc)) => match serde_json::from_value(doc) {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "stored profile is malformed, resetting");
                    UserProfile::new(user_id)
                }
            },
            Ok(None) => {
                let profile = UserProfile::new(user_id);
                self.persist(&profile).await;
                profile
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "profile read failed, using defaults");
                UserProfile::new(user_id)
            }
        }
    }

    /// Apply an explicit update (last-writer-wins per field), bumping
    /// the version.  Returns the updated profile, or `None` when the
    /// write failed.
    pub async fn update<F>(&self, user_id: &str, apply: F) -> Option<UserProfile>
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut profile = self.get_or_create(user_id).await;
        apply(&mut profile);
        profile.version += 1;
        profile.updated_at = Utc::now();

        match self.try_persist(&profile).await {
            Ok(()) => Some(profile),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "profile update failed");
                None
            }
        }
    }

    /// Merge an extracted patch by set union (lists) and overwrite
    /// (scalars).  Returns `false` when nothing was written.
    pub async fn merge_patch(&self, user_id: &str, patch: &ProfilePatch) -> bool {
        if patch.is_empty() {
            return false;
        }

        self.update(user_id, |profile| {
            union_into(&mut profile.dietary_restrictions, &patch.dietary_restrictions);
            union_into(&mut profile.allergies, &patch.allergies);
            union_into(&mut profile.dislikes, &patch.dislikes);
            union_into(&mut profile.favorite_ingredients, &patch.favorite_ingredients);
            union_into(&mut profile.preferred_cuisines, &patch.preferred_cuisines);
            union_into(&mut profile.health_goals, &patch.health_goals);
            union_into(&mut profile.kitchen_equipment, &patch.kitchen_equipment);

            if patch.skill_level.is_some() {
                profile.skill_level = patch.skill_level;
            }
            if patch.available_cooking_time.is_some() {
                profile.available_cooking_time = patch.available_cooking_time;
            }
            if patch.family_size.is_some() {
                profile.family_size = patch.family_size;
            }
            if patch.spice_tolerance.is_some() {
                profile.spice_tolerance = patch.spice_tolerance;
            }
            if patch.sweetness_preference.is_some() {
                profile.sweetness_preference = patch.sweetness_preference;
            }
        })
        .await
        .is_some()
    }

    /// Record recipe feedback: a subcollection document plus the capped
    /// recent mirror on the profile.
    pub async fn record_feedback(&self, user_id: &str, feedback: RecipeFeedback) -> bool {
        let doc = match serde_json::to_value(&feedback) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self
            .store
            .set(&Self::feedback_collection(user_id), &id, doc)
            .await
        {
            tracing::warn!(user_id, error = %e, "feedback write failed");
            return false;
        }

        self.update(user_id, |profile| {
            profile.recent_feedback.insert(0, feedback);
            profile.recent_feedback.truncate(RECENT_CAP);
        })
        .await
        .is_some()
    }

    /// Record a cooking session, mirroring the most recent entries.
    pub async fn record_session(&self, user_id: &str, session: CookingSession) -> bool {
        let doc = match serde_json::to_value(&session) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self
            .store
            .set(&Self::sessions_collection(user_id), &id, doc)
            .await
        {
            tracing::warn!(user_id, error = %e, "session write failed");
            return false;
        }

        self.update(user_id, |profile| {
            profile.recent_sessions.insert(0, session);
            profile.recent_sessions.truncate(RECENT_CAP);
        })
        .await
        .is_some()
    }

    /// The projection handed to the recipe synthesizer.
    pub async fn summary(&self, user_id: &str) -> PreferenceSummary {
        self.get_or_create(user_id).await.preference_summary()
    }

    /// Aggregate history from the subcollections.
    pub async fn stats(&self, user_id: &str) -> CookingStats {
        let sessions = self
            .store
            .list(&Self::sessions_collection(user_id))
            .await
            .unwrap_or_default();
        let feedback = self
            .store
            .list(&Self::feedback_collection(user_id))
            .await
            .unwrap_or_default();

        let total_sessions = sessions.len();
        let successful_sessions = sessions
            .iter()
            .filter(|s| s["success"].as_bool().unwrap_or(false))
            .count();
        let success_rate = if total_sessions == 0 {
            0.0
        } else {
            successful_sessions as f64 / total_sessions as f64
        };

        let ratings: Vec<f64> = feedback
            .iter()
            .filter_map(|f| f["rating"].as_f64())
            .collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        CookingStats {
            total_sessions,
            successful_sessions,
            success_rate,
            total_feedback: feedback.len(),
            average_rating,
        }
    }

    async fn persist(&self, profile: &UserProfile) {
        if let Err(e) = self.try_persist(profile).await {
            tracing::warn!(user_id = %profile.user_id, error = %e, "profile write failed");
        }
    }

    async fn try_persist(&self, profile: &UserProfile) -> sous_domain::error::Result<()> {
        let doc: Value = serde_json::to_value(profile)?;
        self.store.set(COLLECTION, &profile.user_id, doc).await
    }
}

/// Append the elements of `src` that `dst` does not already contain.
fn union_into<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use sous_domain::profile::{Allergy, Cuisine, SkillLevel};

    fn store() -> ProfileStore {
        ProfileStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn get_or_create_persists_a_fresh_profile() {
        let profiles = store();
        let p = profiles.get_or_create("u1").await;
        assert_eq!(p.version, 0);

        // Second read comes from storage, not a new default.
        let again = profiles.get_or_create("u1").await;
        assert_eq!(again.created_at, p.created_at);
    }

    #[tokio::test]
    async fn merge_patch_unions_lists_and_bumps_version() {
        let profiles = store();
        let patch = ProfilePatch {
            allergies: vec![Allergy::Nuts, Allergy::Soy],
            preferred_cuisines: vec![Cuisine::Thai],
            skill_level: Some(SkillLevel::Beginner),
            confidence: 0.9,
            ..Default::default()
        };
        assert!(profiles.merge_patch("u1", &patch).await);

        // Overlapping merge adds only the new element.
        let patch2 = ProfilePatch {
            allergies: vec![Allergy::Soy, Allergy::Fish],
            confidence: 0.9,
            ..Default::default()
        };
        assert!(profiles.merge_patch("u1", &patch2).await);

        let p = profiles.get_or_create("u1").await;
        assert_eq!(p.allergies, vec![Allergy::Nuts, Allergy::Soy, Allergy::Fish]);
        assert_eq!(p.preferred_cuisines, vec![Cuisine::Thai]);
        assert_eq!(p.skill_level, Some(SkillLevel::Beginner));
        assert_eq!(p.version, 2);
    }

    #[tokio::test]
    async fn empty_patch_writes_nothing() {
        let profiles = store();
        assert!(!profiles.merge_patch("u1", &ProfilePatch::default()).await);
    }

    #[tokio::test]
    async fn recent_feedback_is_capped() {
        let profiles = store();
        for i in 0..12 {
            let fb = RecipeFeedback {
                recipe_name: format!("recipe-{i}"),
                rating: 4,
                comments: None,
                recorded_at: Utc::now(),
            };
            assert!(profiles.record_feedback("u1", fb).await);
        }
        let p = profiles.get_or_create("u1").await;
        assert_eq!(p.recent_feedback.len(), RECENT_CAP);
        // Newest first.
        assert_eq!(p.recent_feedback[0].recipe_name, "recipe-11");

        // Full history lives in the subcollection.
        let stats = profiles.stats("u1").await;
        assert_eq!(stats.total_feedback, 12);
    }

    #[tokio::test]
    async fn stats_aggregate_sessions() {
        let profiles = store();
        for success in [true, true, false] {
            let s = CookingSession {
                recipe_name: "カレー".into(),
                cooked_at: Utc::now(),
                duration_minutes: Some(40),
                success,
                notes: None,
            };
            assert!(profiles.record_session("u1", s).await);
        }
        let stats = profiles.stats("u1").await;
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.successful_sessions, 2);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.average_rating, None);
    }

    #[tokio::test]
    async fn stats_empty_user_is_all_zero() {
        let profiles = store();
        let stats = profiles.stats("nobody").await;
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_rating, None);
    }
}
