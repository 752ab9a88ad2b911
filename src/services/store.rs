use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::model::{now_iso, Snippet, MAX_LABEL_LEN, MAX_SNIPPETS, MAX_TEXT_LEN};
use crate::services::validator;
use crate::storage::{self, StorageError, PRIMARY_KEY};
use crate::ExtensionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Label,
    Text,
    Collection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("label is required")]
    LabelRequired,
    #[error("label must be 100 characters or less")]
    LabelTooLong,
    #[error("a snippet with this label already exists")]
    DuplicateLabel,
    #[error("prompt text is required")]
    TextRequired,
    #[error("text must be 5000 characters or less")]
    TextTooLong,
    #[error("maximum of 10 snippets allowed")]
    CollectionFull,
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            Self::LabelRequired | Self::LabelTooLong | Self::DuplicateLabel => Field::Label,
            Self::TextRequired | Self::TextTooLong => Field::Text,
            Self::CollectionFull => Field::Collection,
        }
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to encode snippets: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("both storage backends rejected the write (sync: {sync}, local: {local})")]
    AllBackendsFailed {
        sync: StorageError,
        local: StorageError,
    },
}

/// Authoritative in-memory snippet collection for the hosting process. Every
/// mutation re-persists the full collection to both backends; there is no
/// cross-process locking, so concurrent writers race with last-write-wins.
pub struct SnippetStore {
    ctx: ExtensionContext,
    snippets: Vec<Snippet>,
}

impl SnippetStore {
    pub fn new(ctx: ExtensionContext) -> Self {
        Self {
            ctx,
            snippets: Vec::new(),
        }
    }

    /// Reads the primary key from the synced backend. Read failures and
    /// unreadable payloads fold to an empty collection; legacy locations are
    /// the scanner's concern, not this path's.
    pub async fn load(ctx: ExtensionContext) -> Self {
        let snippets = match storage::read_key(ctx.sync.as_ref(), PRIMARY_KEY).await {
            Ok(Some(Value::Array(items))) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<Snippet>(item) {
                    Ok(snippet) => Some(snippet),
                    Err(err) => {
                        warn!("skipping unreadable stored snippet: {err}");
                        None
                    }
                })
                .collect(),
            Ok(_) => Vec::new(),
            Err(err) => {
                warn!("failed to load snippets from sync backend: {err}");
                Vec::new()
            }
        };

        Self { ctx, snippets }
    }

    #[cfg(test)]
    pub fn with_snippets(ctx: ExtensionContext, snippets: Vec<Snippet>) -> Self {
        Self { ctx, snippets }
    }

    pub fn context(&self) -> &ExtensionContext {
        &self.ctx
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn into_snippets(self) -> Vec<Snippet> {
        self.snippets
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Creates a snippet and persists the collection. If both backends reject
    /// the write the in-memory addition is discarded, so a failed create
    /// leaves the collection exactly as it was.
    pub async fn create(&mut self, label: &str, text: &str) -> AppResult<Snippet> {
        validate_snippet_input(&self.snippets, label, text, None)?;
        if self.snippets.len() >= MAX_SNIPPETS {
            return Err(ValidationError::CollectionFull.into());
        }

        let snippet = Snippet::new(label.trim(), text.trim());
        self.snippets.push(snippet.clone());

        if let Err(err) = self.save().await {
            self.snippets.pop();
            return Err(err.into());
        }
        Ok(snippet)
    }

    /// Edits a snippet in place. Unlike creates, a total save failure leaves
    /// the edit applied in memory; storage catches up on the next save.
    pub async fn update(&mut self, id: &str, label: &str, text: &str) -> AppResult<Snippet> {
        let index = self
            .snippets
            .iter()
            .position(|snippet| snippet.id == id)
            .ok_or(AppError::NotFound)?;
        validate_snippet_input(&self.snippets, label, text, Some(id))?;

        let snippet = &mut self.snippets[index];
        snippet.label = label.trim().to_string();
        snippet.text = text.trim().to_string();
        snippet.updated_at = now_iso();
        let updated = snippet.clone();

        self.save().await?;
        Ok(updated)
    }

    pub async fn delete(&mut self, id: &str) -> AppResult<Snippet> {
        let index = self
            .snippets
            .iter()
            .position(|snippet| snippet.id == id)
            .ok_or(AppError::NotFound)?;
        let removed = self.snippets.remove(index);
        self.save().await?;
        Ok(removed)
    }

    /// Moves a snippet to a new position. Position is the only thing that
    /// changes; ids and timestamps stay put.
    pub async fn reorder(&mut self, id: &str, to_index: usize) -> AppResult<()> {
        let from = self
            .snippets
            .iter()
            .position(|snippet| snippet.id == id)
            .ok_or(AppError::NotFound)?;
        let snippet = self.snippets.remove(from);
        let to_index = to_index.min(self.snippets.len());
        self.snippets.insert(to_index, snippet);
        self.save().await?;
        Ok(())
    }

    /// Appends recovered snippets and persists. Recovery commits are not
    /// subject to the collection cap.
    pub async fn append_recovered(&mut self, recovered: Vec<Snippet>) -> AppResult<usize> {
        if recovered.is_empty() {
            return Ok(0);
        }
        let added = recovered.len();
        self.snippets.extend(recovered);
        self.save().await?;
        Ok(added)
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snippets)
    }

    /// Imports a JSON array (or a single bare object) of snippet-shaped
    /// records. Everything goes through the validator first; records already
    /// present by content fingerprint are skipped, and the batch is clamped
    /// to remaining capacity. A total save failure discards the whole batch.
    pub async fn import_json(&mut self, payload: &str) -> AppResult<usize> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|err| AppError::Internal(format!("import payload is not valid JSON: {err}")))?;
        let cleaned = validator::clean(validator::coerce_candidates(value));

        let existing: HashSet<String> = self
            .snippets
            .iter()
            .map(|snippet| validator::fingerprint(&snippet.label, &snippet.text))
            .collect();
        let fresh: Vec<Snippet> = cleaned
            .into_iter()
            .filter(|snippet| {
                !existing.contains(&validator::fingerprint(&snippet.label, &snippet.text))
            })
            .collect();

        let capacity = MAX_SNIPPETS.saturating_sub(self.snippets.len());
        if fresh.len() > capacity {
            warn!(
                "import truncated: {} new snippets but only room for {capacity}",
                fresh.len()
            );
        }
        let batch: Vec<Snippet> = fresh.into_iter().take(capacity).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let before = self.snippets.len();
        let added = batch.len();
        self.snippets.extend(batch);
        if let Err(err) = self.save().await {
            self.snippets.truncate(before);
            return Err(err.into());
        }
        Ok(added)
    }

    /// Persists the full collection to both backends as independent,
    /// concurrent writes. One backend succeeding is enough; only a total
    /// failure surfaces as an error.
    pub async fn save(&self) -> Result<(), SaveError> {
        let value = serde_json::to_value(&self.snippets)?;
        let entries = HashMap::from([(PRIMARY_KEY.to_string(), value)]);

        let (sync_result, local_result) = tokio::join!(
            self.ctx.sync.set(entries.clone()),
            self.ctx.local.set(entries),
        );

        if let Err(err) = &sync_result {
            warn!("sync backend write failed: {err}");
        }
        if let Err(err) = &local_result {
            warn!("local backend write failed: {err}");
        }

        match (sync_result, local_result) {
            (Err(sync), Err(local)) => Err(SaveError::AllBackendsFailed { sync, local }),
            _ => Ok(()),
        }
    }
}

pub fn validate_snippet_input(
    existing: &[Snippet],
    label: &str,
    text: &str,
    editing_id: Option<&str>,
) -> Result<(), ValidationError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(ValidationError::LabelRequired);
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::LabelTooLong);
    }
    let lowered = label.to_lowercase();
    if existing.iter().any(|snippet| {
        snippet.label.to_lowercase() == lowered && editing_id != Some(snippet.id.as_str())
    }) {
        return Err(ValidationError::DuplicateLabel);
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::TextRequired);
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TextTooLong);
    }

    Ok(())
}
