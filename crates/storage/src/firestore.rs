//! Firestore REST [`DocumentStore`].
//!
//! Talks to the Firestore v1 REST API directly.  JSON documents are
//! translated to and from Firestore's typed-value wire format, and
//! `transactional_update` uses `beginTransaction` / `commit` so the
//! read-modify-write is serialized against concurrent writers.

use std::time::Duration;

use serde_json::{json, Map, Value};

use sous_domain::config::StorageConfig;
use sous_domain::error::{Error, Result};

use crate::document::{DocumentStore, UpdateFn};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

pub struct FirestoreStore {
    http: reqwest::Client,
    /// `projects/{p}/databases/(default)/documents`
    root: String,
    access_token_env: String,
}

impl FirestoreStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let project_id = config
            .project_id
            .as_deref()
            .ok_or_else(|| Error::Config("storage.project_id is required for firestore".into()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            root: format!("projects/{project_id}/databases/(default)/documents"),
            access_token_env: config.access_token_env.clone(),
        })
    }

    /// Tokens rotate, so the env var is read per request rather than
    /// cached at startup.
    fn token(&self) -> Result<String> {
        std::env::var(&self.access_token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Storage(format!("env var {} is unset", self.access_token_env)))
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!("{FIRESTORE_BASE}/{}/{collection}/{id}", self.root)
    }

    fn doc_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.root)
    }

    async fn check(&self, resp: reqwest::Response, context: &str) -> Result<Value> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Storage(format!("{context}: HTTP {status}: {body}")));
        }
        resp.json()
            .await
            .map_err(|e| Error::Storage(format!("{context}: malformed response: {e}")))
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let resp = self
            .http
            .get(self.doc_url(collection, id))
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("get: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = self.check(resp, "get").await?;
        Ok(Some(document_to_json(&doc)))
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let resp = self
            .http
            .patch(self.doc_url(collection, id))
            .bearer_auth(self.token()?)
            .json(&json!({ "fields": json_to_fields(&doc) }))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("set: {e}")))?;
        self.check(resp, "set").await.map(|_| ())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let paths: Vec<String> = patch
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();

        let mut url = format!("{}?", self.doc_url(collection, id));
        for p in &paths {
            url.push_str(&format!("updateMask.fieldPaths={p}&"));
        }

        let resp = self
            .http
            .patch(&url)
            .bearer_auth(self.token()?)
            .json(&json!({ "fields": json_to_fields(&patch) }))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("merge: {e}")))?;
        self.check(resp, "merge").await.map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.doc_url(collection, id))
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("delete: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(Error::Storage(format!("delete: HTTP {}", resp.status())));
        }
        Ok(())
    }

    async fn transactional_update(
        &self,
        collection: &str,
        id: &str,
        update: UpdateFn,
    ) -> Result<Value> {
        let token = self.token()?;

        // 1. Open a transaction.
        let resp = self
            .http
            .post(format!("{FIRESTORE_BASE}/{}:beginTransaction", self.root))
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("beginTransaction: {e}")))?;
        let begin = self.check(resp, "beginTransaction").await?;
        let transaction = begin["transaction"]
            .as_str()
            .ok_or_else(|| Error::Storage("beginTransaction: no transaction id".into()))?
            .to_owned();

        // 2. Read the document inside the transaction.
        let resp = self
            .http
            .get(self.doc_url(collection, id))
            .bearer_auth(&token)
            .query(&[("transaction", transaction.as_str())])
            .send()
            .await
            .map_err(|e| Error::Storage(format!("transactional get: {e}")))?;

        let current = if resp.status() == reqwest::StatusCode::NOT_FOUND {
            None
        } else {
            Some(document_to_json(&self.check(resp, "transactional get").await?))
        };

        // 3. Transform and commit.
        let next = update(current);
        let resp = self
            .http
            .post(format!("{FIRESTORE_BASE}/{}:commit", self.root))
            .bearer_auth(&token)
            .json(&json!({
                "transaction": transaction,
                "writes": [{
                    "update": {
                        "name": self.doc_name(collection, id),
                        "fields": json_to_fields(&next),
                    }
                }]
            }))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("commit: {e}")))?;
        self.check(resp, "commit").await?;

        Ok(next)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let resp = self
            .http
            .get(format!("{FIRESTORE_BASE}/{}/{collection}", self.root))
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("list: {e}")))?;
        let body = self.check(resp, "list").await?;

        Ok(body["documents"]
            .as_array()
            .map(|docs| docs.iter().map(document_to_json).collect())
            .unwrap_or_default())
    }

    async fn is_ready(&self) -> bool {
        let token = match self.token() {
            Ok(t) => t,
            Err(_) => return false,
        };
        self.http
            .get(format!("{FIRESTORE_BASE}/{}/__health__/probe", self.root))
            .bearer_auth(token)
            .send()
            .await
            // 404 means the service answered; only transport or auth
            // failures count as not ready.
            .map(|r| r.status().is_success() || r.status() == reqwest::StatusCode::NOT_FOUND)
            .unwrap_or(false)
    }

    fn backend(&self) -> &'static str {
        "firestore"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Value mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Translate a JSON object into Firestore's `fields` map.
pub fn json_to_fields(doc: &Value) -> Value {
    let mut fields = Map::new();
    if let Some(obj) = doc.as_object() {
        for (k, v) in obj {
            fields.insert(k.clone(), json_to_value(v));
        }
    }
    Value::Object(fields)
}

fn json_to_value(v: &Value) -> Value {
    match v {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Firestore integers are decimal strings on the wire.
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(json_to_value).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({ "mapValue": { "fields": json_to_fields(v) } }),
    }
}

/// Translate a Firestore document back into a plain JSON object.
pub fn document_to_json(doc: &Value) -> Value {
    fields_to_json(doc.get("fields").unwrap_or(&Value::Null))
}

fn fields_to_json(fields: &Value) -> Value {
    let mut out = Map::new();
    if let Some(obj) = fields.as_object() {
        for (k, v) in obj {
            out.insert(k.clone(), value_to_json(v));
        }
    }
    Value::Object(out)
}

fn value_to_json(v: &Value) -> Value {
    if v.get("nullValue").is_some() {
        return Value::Null;
    }
    if let Some(b) = v.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if let Some(i) = v.get("integerValue") {
        // Accepts both string and numeric encodings.
        let parsed = i
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| i.as_i64());
        if let Some(n) = parsed {
            return json!(n);
        }
    }
    if let Some(d) = v.get("doubleValue").and_then(Value::as_f64) {
        return json!(d);
    }
    if let Some(s) = v.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_owned());
    }
    if let Some(ts) = v.get("timestampValue").and_then(Value::as_str) {
        return Value::String(ts.to_owned());
    }
    if let Some(arr) = v.pointer("/arrayValue/values").and_then(Value::as_array) {
        return Value::Array(arr.iter().map(value_to_json).collect());
    }
    if v.pointer("/arrayValue").is_some() {
        return Value::Array(Vec::new());
    }
    if let Some(fields) = v.pointer("/mapValue/fields") {
        return fields_to_json(fields);
    }
    if v.pointer("/mapValue").is_some() {
        return Value::Object(Map::new());
    }
    Value::Null
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        let doc = json!({
            "s": "hello",
            "i": 42,
            "f": 1.5,
            "b": true,
            "n": null,
        });
        let wire = json!({ "fields": json_to_fields(&doc) });
        assert_eq!(document_to_json(&wire), doc);
    }

    #[test]
    fn integers_use_string_encoding_on_the_wire() {
        let fields = json_to_fields(&json!({ "n": 7 }));
        assert_eq!(fields["n"]["integerValue"], "7");
    }

    #[test]
    fn nested_arrays_and_maps_round_trip() {
        let doc = json!({
            "tags": ["a", "b"],
            "nested": { "x": [1, 2], "y": { "z": "deep" } },
            "empty": [],
        });
        let wire = json!({ "fields": json_to_fields(&doc) });
        assert_eq!(document_to_json(&wire), doc);
    }

    #[test]
    fn timestamp_values_become_strings() {
        let wire = json!({
            "fields": { "at": { "timestampValue": "2025-06-01T00:00:00Z" } }
        });
        assert_eq!(document_to_json(&wire)["at"], "2025-06-01T00:00:00Z");
    }

    #[test]
    fn empty_document_maps_to_empty_object() {
        assert_eq!(document_to_json(&json!({})), json!({}));
    }
}
