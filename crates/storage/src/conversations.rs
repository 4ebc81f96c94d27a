//! Per-user conversation log.
//!
//! Append-only message history used by the client to restore a chat on
//! reconnect.  Messages may carry the structured payloads produced
//! during a turn (recipe text, nutrition estimate, step images).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use sous_domain::nutrition::NutritionEstimate;

use crate::document::DocumentStore;

fn collection(user_id: &str) -> String {
    format!("conversations/{user_id}/messages")
}

/// One logged chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionEstimate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ConversationMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: role.to_owned(),
            content: content.to_owned(),
            timestamp: Utc::now(),
            recipe: None,
            nutrition: None,
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationStats {
    pub message_count: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub first_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
}

pub struct ConversationStore {
    store: Arc<dyn DocumentStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append one message.  Returns `false` (and logs) on failure.
    pub async fn append(&self, user_id: &str, message: &ConversationMessage) -> bool {
        let doc: Value = match serde_json::to_value(message) {
            Ok(v) => v,
            Err(_) => return false,
        };
        match self.store.set(&collection(user_id), &message.id, doc).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "conversation append failed");
                false
            }
        }
    }

    /// List messages oldest-first, keeping at most `limit` of the most
    /// recent ones.
    pub async fn list(&self, user_id: &str, limit: usize) -> Vec<ConversationMessage> {
        let docs = match self.store.list(&collection(user_id)).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "conversation list failed");
                return Vec::new();
            }
        };

        let mut messages: Vec<ConversationMessage> = docs
            .into_iter()
            .filter_map(|d| serde_json::from_value(d).ok())
            .collect();
        messages.sort_by_key(|m| m.timestamp);

        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        messages
    }

    /// Delete the whole history.  Returns the number of messages removed.
    pub async fn clear(&self, user_id: &str) -> usize {
        let messages = self.list(user_id, usize::MAX).await;
        let mut removed = 0;
        for m in &messages {
            if self.store.delete(&collection(user_id), &m.id).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    pub async fn stats(&self, user_id: &str) -> ConversationStats {
        let messages = self.list(user_id, usize::MAX).await;
        let user_messages = messages.iter().filter(|m| m.role == "user").count();
        ConversationStats {
            message_count: messages.len(),
            user_messages,
            assistant_messages: messages.len() - user_messages,
            first_message_at: messages.first().map(|m| m.timestamp),
            last_message_at: messages.last().map(|m| m.timestamp),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
