use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const MAX_SNIPPETS: usize = 10;
pub const MAX_LABEL_LEN: usize = 100;
pub const MAX_TEXT_LEN: usize = 5000;
pub const SCHEMA_VERSION: &str = "1.3.0";
pub const UNTITLED_LABEL: &str = "Untitled Snippet";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub label: String,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Snippet {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            id: generate_id(),
            label: label.into(),
            text: text.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Pre-validation record shape. Anything object-like from storage parses into
/// this; the validator is the only place a `RawSnippet` becomes a `Snippet`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSnippet {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub label: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub text: Option<String>,
    // First-generation records stored the creation time under "created".
    #[serde(alias = "created", deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub updated_at: Option<String>,
}

// Legacy records carry numeric ids and timestamps; coerce scalars, drop the rest.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }))
}

pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{millis:x}-{}", &suffix[..8])
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_snippet_gets_id_and_timestamps() {
        let snippet = Snippet::new("Greeting", "Hello there");
        assert!(!snippet.id.is_empty());
        assert_eq!(snippet.created_at, snippet.updated_at);
        assert!(snippet.created_at.ends_with('Z'));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn snippet_serializes_camel_case() {
        let snippet = Snippet::new("Greeting", "Hello there");
        let value = serde_json::to_value(&snippet).expect("serialize");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn raw_snippet_accepts_legacy_created_field() {
        let raw: RawSnippet = serde_json::from_value(json!({
            "id": "abc",
            "label": "Old",
            "text": "body",
            "created": "2023-01-01T00:00:00Z"
        }))
        .expect("parse");
        assert_eq!(raw.created_at.as_deref(), Some("2023-01-01T00:00:00Z"));
        assert!(raw.updated_at.is_none());
    }

    #[test]
    fn raw_snippet_coerces_numeric_fields() {
        let raw: RawSnippet = serde_json::from_value(json!({
            "id": 1717171717,
            "label": "Numeric",
            "text": "body"
        }))
        .expect("parse");
        assert_eq!(raw.id.as_deref(), Some("1717171717"));
    }

    #[test]
    fn raw_snippet_drops_non_scalar_fields() {
        let raw: RawSnippet = serde_json::from_value(json!({
            "label": { "nested": true },
            "text": "body"
        }))
        .expect("parse");
        assert!(raw.label.is_none());
        assert_eq!(raw.text.as_deref(), Some("body"));
    }
}
