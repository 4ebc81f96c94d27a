//! Turn event stream types.
//!
//! A recipe turn is delivered to the client as an ordered stream of
//! [`TurnEvent`]s over SSE, one JSON object per event, discriminated by
//! the `type` field.  Every stream ends with exactly one terminal event
//! (`complete` or `error`).

use serde::Serialize;
use std::pin::Pin;

use crate::intent::{IntentKind, ResponseType};
use crate::nutrition::NutritionEstimate;

/// A boxed async stream.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during a single conversational turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// A stage transition (e.g. "analyzing_intent", "generating_recipe").
    #[serde(rename = "status")]
    Status { stage: String },

    /// The classified intent for the message.
    #[serde(rename = "intent")]
    Intent {
        intent: IntentKind,
        confidence: f64,
        response_type: ResponseType,
    },

    /// The conversational reply shown while the pipeline runs.
    #[serde(rename = "chat_response")]
    ChatResponse { message: String },

    /// The full generated recipe (Markdown, numbered steps).
    #[serde(rename = "recipe")]
    Recipe { recipe: String },

    /// The validated nutrition estimate for the recipe.
    #[serde(rename = "nutrition")]
    Nutrition { nutrition: NutritionEstimate },

    /// Image generation started for one step.
    #[serde(rename = "generating_image")]
    GeneratingImage { step_index: usize, step_text: String },

    /// A step illustration finished (data URL).
    #[serde(rename = "image")]
    Image { step_index: usize, url: String },

    /// A step illustration failed; the rest of the turn continues.
    #[serde(rename = "image_error")]
    ImageError { step_index: usize, message: String },

    /// Terminal: the turn failed.  `message` is user-safe; `detail`
    /// carries the diagnostic.
    #[serde(rename = "error")]
    Error { message: String, detail: String },

    /// Terminal: the turn finished.
    #[serde(rename = "complete")]
    Complete,
}

impl TurnEvent {
    /// The SSE event name for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnEvent::Status { .. } => "status",
            TurnEvent::Intent { .. } => "intent",
            TurnEvent::ChatResponse { .. } => "chat_response",
            TurnEvent::Recipe { .. } => "recipe",
            TurnEvent::Nutrition { .. } => "nutrition",
            TurnEvent::GeneratingImage { .. } => "generating_image",
            TurnEvent::Image { .. } => "image",
            TurnEvent::ImageError { .. } => "image_error",
            TurnEvent::Error { .. } => "error",
            TurnEvent::Complete => "complete",
        }
    }

    /// `true` for the two events that end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Error { .. } | TurnEvent::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(TurnEvent::Complete).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "complete" }));

        let json = serde_json::to_value(TurnEvent::Status {
            stage: "analyzing_intent".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["stage"], "analyzing_intent");
    }

    #[test]
    fn terminal_events() {
        assert!(TurnEvent::Complete.is_terminal());
        assert!(TurnEvent::Error {
            message: "x".into(),
            detail: "y".into()
        }
        .is_terminal());
        assert!(!TurnEvent::Recipe { recipe: "r".into() }.is_terminal());
    }
}
