use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analytics::Analytics;
use crate::error::AppResult;
use crate::model::Snippet;
use crate::services::migration::{MigrationManager, MigrationOutcome};
use crate::services::store::SnippetStore;
use crate::storage::{self, StorageError, PRIMARY_KEY};
use crate::ExtensionContext;

/// Starter snippets for new installations.
pub const DEFAULT_SNIPPETS: [(&str, &str); 3] = [
    (
        "Ask me Questions",
        "Before you start the task, review all inputs and ask me any questions you need \
         to improve the chances of successfully producing the output I am looking for. \
         Number all the questions and if possible, make them yes or no answers so I can \
         quickly, easily and clearly answer the questions.",
    ),
    (
        "Improve Output",
        "This output is good but I know you can do better. Review the last prompt and \
         compare it to your output, then 10X the output based on the requirements from \
         the prompt.",
    ),
    (
        "Dictation Organizer",
        "Below is a dictated note I made. Please review the dictation and work to \
         organize it into a form you feel matches the intended outcome of the author. \
         Feel free to ask up to 5 questions before creating the first draft output.",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
}

/// Requests the insertion and UI layers send to the background process.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    GetSnapprompts,
}

/// Runs once per browser session. Owns first-run seeding and triggers the
/// shared migration check at install, update and startup.
pub struct BackgroundProcess {
    ctx: ExtensionContext,
    migrations: MigrationManager,
    analytics: Arc<Analytics>,
}

impl BackgroundProcess {
    pub fn new(ctx: ExtensionContext, analytics: Arc<Analytics>) -> Self {
        Self {
            ctx,
            migrations: MigrationManager::new(),
            analytics,
        }
    }

    pub async fn handle_installed(&self, reason: InstallReason) -> MigrationOutcome {
        if reason == InstallReason::Install {
            match seed_default_snippets(&self.ctx).await {
                Ok(0) => {}
                Ok(count) => {
                    info!("seeded {count} starter snippets");
                    self.analytics
                        .track("defaults_seeded", json!({ "count": count }))
                        .await;
                }
                Err(err) => warn!("failed to seed starter snippets: {err}"),
            }
        }
        self.migrations.migrate_if_needed(&self.ctx).await
    }

    pub async fn handle_startup(&self) -> MigrationOutcome {
        self.migrations.migrate_if_needed(&self.ctx).await
    }

    pub async fn handle_message(&self, message: Message) -> Value {
        match message {
            Message::GetSnapprompts => {
                serde_json::to_value(self.get_snapprompts().await).unwrap_or_else(|_| json!([]))
            }
        }
    }

    /// Current primary-key array, empty if absent or unreadable.
    pub async fn get_snapprompts(&self) -> Vec<Snippet> {
        SnippetStore::load(self.ctx.clone()).await.into_snippets()
    }
}

/// Writes the starter snippets on a fresh install, to both backends. Skipped
/// entirely when the primary key already holds records, so re-running the
/// install path cannot duplicate data.
pub async fn seed_default_snippets(ctx: &ExtensionContext) -> AppResult<usize> {
    let existing = storage::read_key(ctx.sync.as_ref(), PRIMARY_KEY).await?;
    if matches!(&existing, Some(Value::Array(items)) if !items.is_empty()) {
        info!("snippets already exist, skipping starter snippet creation");
        return Ok(0);
    }

    let defaults: Vec<Snippet> = DEFAULT_SNIPPETS
        .iter()
        .map(|(label, text)| Snippet::new(*label, *text))
        .collect();
    let value = serde_json::to_value(&defaults).map_err(StorageError::from)?;

    storage::write_key(ctx.sync.as_ref(), PRIMARY_KEY, value.clone()).await?;
    // a failed local write does not fail the install
    if let Err(err) = storage::write_key(ctx.local.as_ref(), PRIMARY_KEY, value).await {
        warn!("failed to write starter snippets to local backend: {err}");
    }

    Ok(defaults.len())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::model::SCHEMA_VERSION;
    use crate::storage::VERSION_KEY;

    use super::*;

    fn process(ctx: &ExtensionContext) -> BackgroundProcess {
        BackgroundProcess::new(ctx.clone(), Arc::new(Analytics::disabled()))
    }

    async fn primary_len(ctx: &ExtensionContext) -> usize {
        storage::read_key(ctx.sync.as_ref(), PRIMARY_KEY)
            .await
            .expect("read")
            .and_then(|value| value.as_array().map(Vec::len))
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn install_seeds_defaults_and_stamps_the_marker() {
        let ctx = ExtensionContext::in_memory();

        let outcome = process(&ctx).handle_installed(InstallReason::Install).await;

        assert_eq!(outcome, MigrationOutcome::FreshInstall);
        assert_eq!(primary_len(&ctx).await, DEFAULT_SNIPPETS.len());

        let marker = storage::read_key(ctx.sync.as_ref(), VERSION_KEY)
            .await
            .expect("read")
            .expect("stamped");
        assert_eq!(marker, json!(SCHEMA_VERSION));

        // Backup copy lands in the local backend too.
        let local = storage::read_key(ctx.local.as_ref(), PRIMARY_KEY)
            .await
            .expect("read")
            .expect("written");
        assert_eq!(local.as_array().map(Vec::len), Some(DEFAULT_SNIPPETS.len()));
    }

    #[tokio::test]
    async fn install_does_not_clobber_existing_snippets() {
        let ctx = ExtensionContext::in_memory();
        storage::write_key(
            ctx.sync.as_ref(),
            PRIMARY_KEY,
            json!([{ "id": "1", "label": "Mine", "text": "body",
                     "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z" }]),
        )
        .await
        .expect("seed");

        process(&ctx).handle_installed(InstallReason::Install).await;

        assert_eq!(primary_len(&ctx).await, 1);
    }

    #[tokio::test]
    async fn repeated_install_does_not_duplicate_defaults() {
        let ctx = ExtensionContext::in_memory();
        let background = process(&ctx);

        background.handle_installed(InstallReason::Install).await;
        background.handle_installed(InstallReason::Install).await;

        assert_eq!(primary_len(&ctx).await, DEFAULT_SNIPPETS.len());
    }

    #[tokio::test]
    async fn update_runs_the_migration_pipeline() {
        let ctx = ExtensionContext::in_memory();
        storage::write_key(ctx.sync.as_ref(), VERSION_KEY, json!("1.0.0"))
            .await
            .expect("seed marker");
        storage::write_key(
            ctx.local.as_ref(),
            "prompts",
            json!([{ "label": "Old", "text": "body" }]),
        )
        .await
        .expect("seed data");

        let outcome = process(&ctx).handle_installed(InstallReason::Update).await;

        assert_eq!(outcome, MigrationOutcome::Migrated(1));
        assert_eq!(primary_len(&ctx).await, 1);
    }

    #[tokio::test]
    async fn startup_with_current_marker_is_a_no_op() {
        let ctx = ExtensionContext::in_memory();
        storage::write_key(ctx.sync.as_ref(), VERSION_KEY, json!(SCHEMA_VERSION))
            .await
            .expect("seed marker");

        let outcome = process(&ctx).handle_startup().await;
        assert_eq!(outcome, MigrationOutcome::UpToDate);
    }

    #[tokio::test]
    async fn get_snapprompts_returns_empty_when_absent() {
        let ctx = ExtensionContext::in_memory();
        assert!(process(&ctx).get_snapprompts().await.is_empty());
    }

    #[tokio::test]
    async fn message_surface_answers_with_the_primary_array() {
        let ctx = ExtensionContext::in_memory();
        let background = process(&ctx);
        background.handle_installed(InstallReason::Install).await;

        let message: Message =
            serde_json::from_value(json!({ "action": "getSnapprompts" })).expect("parse");
        let response = background.handle_message(message).await;

        assert_eq!(
            response.as_array().map(Vec::len),
            Some(DEFAULT_SNIPPETS.len())
        );
    }
}
