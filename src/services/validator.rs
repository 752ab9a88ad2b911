use std::collections::HashSet;

use serde_json::Value;

use crate::model::{generate_id, now_iso, RawSnippet, Snippet, UNTITLED_LABEL};
use crate::utils::hash::sha256_hex;

/// Content fingerprint used for deduplication. Two records with different ids
/// but the same normalized label and text are the same snippet.
pub fn fingerprint(label: &str, text: &str) -> String {
    sha256_hex(&format!(
        "{}:{}",
        label.trim().to_lowercase(),
        text.trim().to_lowercase()
    ))
}

/// Turns an arbitrary JSON payload into candidate records: arrays flatten,
/// a bare object becomes a one-element sequence, everything else is empty.
pub fn coerce_candidates(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        value @ Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

/// Repairs and deduplicates loosely-typed candidate records. Non-objects are
/// dropped, missing fields are back-filled, entries with empty text are
/// discarded, and later records with an already-seen fingerprint lose to the
/// first occurrence. Pure and idempotent.
pub fn clean(candidates: Vec<Value>) -> Vec<Snippet> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for candidate in candidates {
        if !candidate.is_object() {
            continue;
        }
        let raw: RawSnippet = match serde_json::from_value(candidate) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        let snippet = repair(raw);
        if snippet.text.trim().is_empty() {
            continue;
        }
        if seen.insert(fingerprint(&snippet.label, &snippet.text)) {
            unique.push(snippet);
        }
    }

    unique
}

fn repair(raw: RawSnippet) -> Snippet {
    Snippet {
        id: raw
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_id),
        label: raw
            .label
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| UNTITLED_LABEL.to_string()),
        text: raw.text.unwrap_or_default(),
        created_at: raw
            .created_at
            .filter(|stamp| !stamp.is_empty())
            .unwrap_or_else(now_iso),
        updated_at: raw
            .updated_at
            .filter(|stamp| !stamp.is_empty())
            .unwrap_or_else(now_iso),
    }
}
