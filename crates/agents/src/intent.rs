//! Intent classification.
//!
//! One model call with a strict JSON instruction, guarded at every
//! step: the reply is scraped for its first balanced JSON object, the
//! intent tag is validated against the closed enum, and any failure —
//! transport, parse, or schema — drops to the deterministic keyword
//! fallback.  Classification itself can therefore never fail a turn.

use std::sync::Arc;

use serde::Deserialize;

use sous_domain::intent::{ExtractedData, IntentKind, IntentResult};
use sous_providers::extract::first_json_object;
use sous_providers::TextModel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fallback vocabularies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Confidence assigned to every fallback classification.
const FALLBACK_CONFIDENCE: f64 = 0.7;

/// Words that signal the user wants to photograph their ingredients.
const IMAGE_WORDS: &[&str] = &["冷蔵庫", "写真", "画像", "撮っ", "撮り", "カメラ"];

/// Common ingredients recognised without a model.
const INGREDIENT_WORDS: &[&str] = &[
    "鶏肉", "豚肉", "牛肉", "ひき肉", "卵", "玉ねぎ", "じゃがいも", "にんじん",
    "キャベツ", "トマト", "なす", "ピーマン", "きのこ", "豆腐", "ネギ", "大根",
];

/// Dish names recognised without a model.
const DISH_WORDS: &[&str] = &[
    "カレー", "ラーメン", "チャーハン", "親子丼", "ハンバーグ", "唐揚げ",
    "味噌汁", "パスタ", "オムライス", "肉じゃが", "餃子", "グラタン",
];

/// Phrasings that mark the message as an actual request, as opposed to
/// a passing mention of food.  Ingredient and dish hits only count when
/// one of these is present.
const REQUEST_MARKERS: &[&str] = &[
    "作りたい", "作って", "作れる", "作り方", "食べたい", "レシピ",
    "ください", "下さい", "教えて", "なにか", "何か", "たい",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model reply shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    intent: String,
    #[serde(default = "d_half")]
    confidence: f64,
    #[serde(default)]
    ingredients: Vec<String>,
    #[serde(default)]
    dish_name: Option<String>,
    #[serde(default)]
    cooking_method: Option<String>,
    #[serde(default)]
    dietary_needs: Option<String>,
    #[serde(default)]
    time_constraint: Option<String>,
    #[serde(default)]
    difficulty_level: Option<String>,
    #[serde(default)]
    context_info: Option<String>,
    #[serde(default)]
    reasoning: String,
}

fn d_half() -> f64 {
    0.5
}

/// Models sometimes emit `""` where the schema says `null`.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct IntentClassifier {
    model: Arc<dyn TextModel>,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Classify one message.  `has_image` short-circuits to
    /// `ImageRequest` at full confidence without a model call.
    pub async fn classify(&self, message: &str, has_image: bool) -> IntentResult {
        if has_image {
            return IntentResult::new(IntentKind::ImageRequest, 1.0, ExtractedData::default());
        }

        match self.model.generate(&classification_prompt(message)).await {
            Ok(reply) => match parse_reply(&reply) {
                Some(result) => result,
                None => {
                    tracing::warn!(
                        model = self.model.model_id(),
                        "unparseable classification reply, using keyword fallback"
                    );
                    fallback_classify(message)
                }
            },
            Err(e) => {
                tracing::warn!(
                    model = self.model.model_id(),
                    error = %e,
                    "classification call failed, using keyword fallback"
                );
                fallback_classify(message)
            }
        }
    }

    /// The canned conversational reply for an intent, shown while the
    /// rest of the pipeline runs.
    pub fn canned_response(intent: IntentKind, extracted: &ExtractedData) -> String {
        match intent {
            IntentKind::ImageRequest => {
                "冷蔵庫やお手元の食材の写真を送ってください。中身を見てレシピを考えます!".into()
            }
            IntentKind::TextIngredients => {
                let list = extracted.ingredients.join("、");
                if list.is_empty() {
                    "その食材でレシピを考えますね。少々お待ちください!".into()
                } else {
                    format!("{list}を使ったレシピを考えますね。少々お待ちください!")
                }
            }
            IntentKind::RecipeRequest => {
                let mut msg = match &extracted.dish_name {
                    Some(dish) => format!("{dish}のレシピを用意しますね。少々お待ちください!"),
                    None => "そのお料理のレシピを用意しますね。少々お待ちください!".to_owned(),
                };
                if let Some(method) = &extracted.cooking_method {
                    msg.push_str(&format!("\n{method}で調理する方向で考えます。"));
                }
                if let Some(time) = &extracted.time_constraint {
                    msg.push_str(&format!("\n{time}を考慮します。"));
                }
                msg
            }
            IntentKind::NutritionAdvice => match &extracted.dietary_needs {
                Some(needs) => {
                    format!("{needs}について考慮したアドバイスをしますね。詳しく教えてください。")
                }
                None => "栄養についてのご相談ですね。詳しく教えてください。".into(),
            },
            IntentKind::CookingAdvice => {
                "料理のコツについてですね。できる限りお答えします!".into()
            }
            IntentKind::CasualChat => "こんにちは!今日は何を作りましょうか?".into(),
            IntentKind::Clarification => {
                "すみません、もう少し詳しく教えていただけますか?食材やお料理名があると助かります。".into()
            }
        }
    }
}

fn classification_prompt(message: &str) -> String {
    format!(
        "あなたは料理アシスタントの意図分類器です。\
         次のユーザーメッセージを以下の7カテゴリのどれか1つに分類してください。\n\n\
         - image_request: 冷蔵庫や食材の写真を撮って送りたい\n\
         - text_ingredients: 食材をテキストで挙げてレシピを求めている\n\
         - recipe_request: 料理名を挙げてそのレシピを求めている\n\
         - nutrition_advice: 栄養や食事バランスの相談\n\
         - cooking_advice: 調理のコツや代用品などの相談\n\
         - casual_chat: 雑談\n\
         - clarification: 曖昧で聞き返しが必要\n\n\
         あわせてメッセージから読み取れる情報を抜き出してください。\
         cooking_methodは調理法（炒める、煮る等）、dietary_needsは食事や栄養の要望、\
         time_constraintは時間の制約、difficulty_levelは難易度の希望、\
         context_infoはその他の文脈です。該当がなければnullにしてください。\n\n\
         次のJSONだけを出力してください:\n\
         {{\"intent\": \"...\", \"confidence\": 0.0, \"ingredients\": [], \"dish_name\": null, \
         \"cooking_method\": null, \"dietary_needs\": null, \"time_constraint\": null, \
         \"difficulty_level\": null, \"context_info\": null, \"reasoning\": \"...\"}}\n\n\
         メッセージ: {message}"
    )
}

/// Parse a model reply into a classification.  Returns `None` when no
/// balanced JSON object can be recovered; unknown intent tags degrade
/// to `Clarification` rather than `None`.
pub fn parse_reply(reply: &str) -> Option<IntentResult> {
    let json = first_json_object(reply)?;
    let raw: RawClassification = serde_json::from_str(json).ok()?;

    let intent = IntentKind::from_tag(&raw.intent).unwrap_or(IntentKind::Clarification);
    let extracted = ExtractedData {
        ingredients: raw.ingredients,
        dish_name: non_blank(raw.dish_name),
        cooking_method: non_blank(raw.cooking_method),
        dietary_needs: non_blank(raw.dietary_needs),
        time_constraint: non_blank(raw.time_constraint),
        difficulty_level: non_blank(raw.difficulty_level),
        context_info: non_blank(raw.context_info),
    };
    let mut result = IntentResult::new(intent, raw.confidence, extracted);
    result.reasoning = raw.reasoning;
    Some(result)
}

/// Deterministic keyword classifier.  Pure and total: every input maps
/// to some intent, with confidence fixed at 0.7.
pub fn fallback_classify(message: &str) -> IntentResult {
    if IMAGE_WORDS.iter().any(|w| message.contains(w)) {
        return IntentResult::new(
            IntentKind::ImageRequest,
            FALLBACK_CONFIDENCE,
            ExtractedData::default(),
        );
    }

    let is_request = REQUEST_MARKERS.iter().any(|m| message.contains(m));

    if is_request {
        let ingredients: Vec<String> = INGREDIENT_WORDS
            .iter()
            .filter(|w| message.contains(*w))
            .map(|w| (*w).to_owned())
            .collect();
        if !ingredients.is_empty() {
            return IntentResult::new(
                IntentKind::TextIngredients,
                FALLBACK_CONFIDENCE,
                ExtractedData {
                    ingredients,
                    ..Default::default()
                },
            );
        }

        if let Some(dish) = DISH_WORDS.iter().find(|w| message.contains(*w)) {
            return IntentResult::new(
                IntentKind::RecipeRequest,
                FALLBACK_CONFIDENCE,
                ExtractedData {
                    dish_name: Some((*dish).to_owned()),
                    ..Default::default()
                },
            );
        }
    }

    IntentResult::new(
        IntentKind::CasualChat,
        FALLBACK_CONFIDENCE,
        ExtractedData::default(),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use sous_domain::error::{Error, Result};
    use sous_domain::intent::ResponseType;

    struct CannedModel(Result<String>);

    #[async_trait::async_trait]
    impl TextModel for CannedModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(Error::Http("down".into())),
            }
        }
        fn model_id(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn has_image_short_circuits_at_full_confidence() {
        // The model would misclassify; it must never be consulted.
        let classifier = IntentClassifier::new(Arc::new(CannedModel(Ok(
            r#"{"intent": "casual_chat", "confidence": 0.2}"#.into(),
        ))));
        let r = classifier.classify("これ見て", true).await;
        assert_eq!(r.intent, IntentKind::ImageRequest);
        assert_eq!(r.confidence, 1.0);
        assert!(r.extracted.ingredients.is_empty());
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_keywords() {
        let classifier =
            IntentClassifier::new(Arc::new(CannedModel(Err(Error::Http("down".into())))));
        let r = classifier.classify("鶏肉でなにか作りたい", false).await;
        assert_eq!(r.intent, IntentKind::TextIngredients);
        assert_eq!(r.confidence, 0.7);
        assert_eq!(r.extracted.ingredients, vec!["鶏肉".to_string()]);
        assert_eq!(r.response_type, ResponseType::GenerateRecipe);
    }

    #[tokio::test]
    async fn garbage_reply_falls_back_to_keywords() {
        let classifier =
            IntentClassifier::new(Arc::new(CannedModel(Ok("no json here".into()))));
        let r = classifier.classify("カレーのレシピ教えて", false).await;
        assert_eq!(r.intent, IntentKind::RecipeRequest);
        assert_eq!(r.extracted.dish_name.as_deref(), Some("カレー"));
    }

    #[test]
    fn parse_reply_validates_the_intent_tag() {
        let r = parse_reply(r#"{"intent": "recipe_request", "confidence": 0.95, "dish_name": "カレー"}"#)
            .unwrap();
        assert_eq!(r.intent, IntentKind::RecipeRequest);
        assert_eq!(r.extracted.dish_name.as_deref(), Some("カレー"));

        // Unknown tags degrade to clarification instead of failing.
        let r = parse_reply(r#"{"intent": "world_domination", "confidence": 0.9}"#).unwrap();
        assert_eq!(r.intent, IntentKind::Clarification);
    }

    #[test]
    fn parse_reply_clamps_confidence() {
        let r = parse_reply(r#"{"intent": "casual_chat", "confidence": 3.5}"#).unwrap();
        assert_eq!(r.confidence, 1.0);
        let r = parse_reply(r#"{"intent": "casual_chat", "confidence": -1.0}"#).unwrap();
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn parse_reply_handles_fenced_json() {
        let reply = "分類結果です:\n```json\n{\"intent\": \"casual_chat\", \"confidence\": 0.8}\n```";
        assert_eq!(parse_reply(reply).unwrap().intent, IntentKind::CasualChat);
    }

    #[test]
    fn fallback_is_total() {
        // Never panics, always yields an intent, including empty input.
        for msg in ["", "こんにちは", "asdf qwer", "🍳🍳🍳"] {
            let r = fallback_classify(msg);
            assert_eq!(r.intent, IntentKind::CasualChat);
            assert_eq!(r.confidence, 0.7);
        }
    }

    #[test]
    fn fallback_image_vocabulary_wins() {
        let r = fallback_classify("冷蔵庫の中身で何か作れる?");
        assert_eq!(r.intent, IntentKind::ImageRequest);
    }

    #[test]
    fn fallback_ingredient_requires_request_marker() {
        // Passing mention of an ingredient is small talk.
        let r = fallback_classify("昨日スーパーで鶏肉が安かったよ");
        assert_eq!(r.intent, IntentKind::CasualChat);

        // The same ingredient with desire phrasing is a request.
        let r = fallback_classify("鶏肉でなにか作りたい");
        assert_eq!(r.intent, IntentKind::TextIngredients);
        assert_eq!(r.extracted.ingredients, vec!["鶏肉".to_string()]);
    }

    #[test]
    fn fallback_dish_requires_request_marker() {
        let r = fallback_classify("昨日はカレーだった");
        assert_eq!(r.intent, IntentKind::CasualChat);

        let r = fallback_classify("カレーが食べたい");
        assert_eq!(r.intent, IntentKind::RecipeRequest);
        assert_eq!(r.extracted.dish_name.as_deref(), Some("カレー"));
    }

    #[test]
    fn fallback_ingredient_outranks_dish() {
        // A message naming both an ingredient and a dish goes down the
        // ingredient path.
        let r = fallback_classify("豚肉でカレーを作りたい");
        assert_eq!(r.intent, IntentKind::TextIngredients);
    }

    #[test]
    fn canned_responses_mention_extracted_data() {
        let extracted = ExtractedData {
            ingredients: vec!["鶏肉".into(), "ネギ".into()],
            ..Default::default()
        };
        let msg = IntentClassifier::canned_response(IntentKind::TextIngredients, &extracted);
        assert!(msg.contains("鶏肉"));

        let extracted = ExtractedData {
            dish_name: Some("親子丼".into()),
            ..Default::default()
        };
        let msg = IntentClassifier::canned_response(IntentKind::RecipeRequest, &extracted);
        assert!(msg.contains("親子丼"));
    }

    #[test]
    fn canned_responses_echo_method_time_and_diet() {
        let extracted = ExtractedData {
            dish_name: Some("カレー".into()),
            cooking_method: Some("煮込み".into()),
            time_constraint: Some("30分以内".into()),
            ..Default::default()
        };
        let msg = IntentClassifier::canned_response(IntentKind::RecipeRequest, &extracted);
        assert!(msg.contains("煮込みで調理する方向"));
        assert!(msg.contains("30分以内を考慮"));

        let extracted = ExtractedData {
            dietary_needs: Some("減塩".into()),
            ..Default::default()
        };
        let msg = IntentClassifier::canned_response(IntentKind::NutritionAdvice, &extracted);
        assert!(msg.contains("減塩について考慮"));
    }

    #[test]
    fn parse_reply_carries_the_full_extraction() {
        let r = parse_reply(
            r#"{"intent": "recipe_request", "confidence": 0.9, "dish_name": "カレー",
                "cooking_method": "煮込む", "dietary_needs": "減塩",
                "time_constraint": "30分以内", "difficulty_level": "簡単",
                "context_info": "平日の夕食", "reasoning": "料理名を挙げている"}"#,
        )
        .unwrap();
        assert_eq!(r.extracted.cooking_method.as_deref(), Some("煮込む"));
        assert_eq!(r.extracted.dietary_needs.as_deref(), Some("減塩"));
        assert_eq!(r.extracted.time_constraint.as_deref(), Some("30分以内"));
        assert_eq!(r.extracted.difficulty_level.as_deref(), Some("簡単"));
        assert_eq!(r.extracted.context_info.as_deref(), Some("平日の夕食"));
        assert_eq!(r.reasoning, "料理名を挙げている");

        // A blank string is as good as absent.
        let r = parse_reply(r#"{"intent": "casual_chat", "confidence": 0.8, "cooking_method": "  "}"#)
            .unwrap();
        assert!(r.extracted.cooking_method.is_none());
    }
}
