use std::sync::Arc;

use serde_json::json;

use crate::analytics::Analytics;
use crate::error::AppResult;
use crate::model::Snippet;
use crate::services::migration::MigrationManager;
use crate::services::recovery;
use crate::services::store::SnippetStore;
use crate::ExtensionContext;

/// Runs once per popup open. Re-checks migration before loading, since the
/// background process may not have run yet on this profile, then owns the
/// user-facing CRUD and recovery for the session's lifetime.
pub struct PopupSession {
    store: SnippetStore,
    analytics: Arc<Analytics>,
    recovery_available: bool,
}

impl PopupSession {
    pub async fn open(ctx: ExtensionContext, analytics: Arc<Analytics>) -> Self {
        MigrationManager::new().migrate_if_needed(&ctx).await;

        let store = SnippetStore::load(ctx).await;
        let recovery_available = recovery::has_recoverable(store.context(), store.snippets()).await;
        analytics
            .track("popup_opened", json!({ "snippet_count": store.len() }))
            .await;

        Self {
            store,
            analytics,
            recovery_available,
        }
    }

    pub fn snippets(&self) -> &[Snippet] {
        self.store.snippets()
    }

    pub fn store(&self) -> &SnippetStore {
        &self.store
    }

    /// Whether scavenging would surface snippets not in the active
    /// collection; drives the recovery affordance in the UI.
    pub fn recovery_available(&self) -> bool {
        self.recovery_available
    }

    pub async fn create_snippet(&mut self, label: &str, text: &str) -> AppResult<Snippet> {
        let snippet = self.store.create(label, text).await?;
        self.analytics
            .track("snippet_created", json!({ "count": self.store.len() }))
            .await;
        self.refresh_recovery().await;
        Ok(snippet)
    }

    pub async fn update_snippet(&mut self, id: &str, label: &str, text: &str) -> AppResult<Snippet> {
        let snippet = self.store.update(id, label, text).await?;
        self.analytics
            .track("snippet_edited", json!({ "count": self.store.len() }))
            .await;
        self.refresh_recovery().await;
        Ok(snippet)
    }

    pub async fn delete_snippet(&mut self, id: &str) -> AppResult<Snippet> {
        let snippet = self.store.delete(id).await?;
        self.analytics
            .track("snippet_deleted", json!({ "count": self.store.len() }))
            .await;
        self.refresh_recovery().await;
        Ok(snippet)
    }

    pub async fn reorder_snippet(&mut self, id: &str, to_index: usize) -> AppResult<()> {
        self.store.reorder(id, to_index).await
    }

    /// Scavenges all storage locations and appends whatever is not already in
    /// the active collection. Returns how many snippets were added.
    pub async fn recover_lost(&mut self) -> AppResult<usize> {
        self.analytics.track("recovery_attempted", json!({})).await;

        let found = recovery::recover(self.store.context(), self.store.snippets()).await;
        if found.is_empty() {
            self.recovery_available = false;
            return Ok(0);
        }

        let added = self.store.append_recovered(found).await?;
        self.analytics
            .track("recovery_successful", json!({ "count": added }))
            .await;
        self.refresh_recovery().await;
        Ok(added)
    }

    pub fn export_snippets(&self) -> Result<String, serde_json::Error> {
        self.store.export_json()
    }

    pub async fn import_snippets(&mut self, payload: &str) -> AppResult<usize> {
        let added = self.store.import_json(payload).await?;
        self.refresh_recovery().await;
        Ok(added)
    }

    async fn refresh_recovery(&mut self) {
        self.recovery_available =
            recovery::has_recoverable(self.store.context(), self.store.snippets()).await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::model::SCHEMA_VERSION;
    use crate::storage::{self, PRIMARY_KEY, VERSION_KEY};

    use super::*;

    async fn open(ctx: &ExtensionContext) -> PopupSession {
        PopupSession::open(ctx.clone(), Arc::new(Analytics::disabled())).await
    }

    #[tokio::test]
    async fn open_on_fresh_profile_stamps_and_starts_empty() {
        let ctx = ExtensionContext::in_memory();
        let session = open(&ctx).await;

        assert!(session.snippets().is_empty());
        assert!(!session.recovery_available());

        let marker = storage::read_key(ctx.sync.as_ref(), VERSION_KEY)
            .await
            .expect("read")
            .expect("stamped");
        assert_eq!(marker, json!(SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn open_migrates_legacy_data_before_loading() {
        let ctx = ExtensionContext::in_memory();
        storage::write_key(ctx.sync.as_ref(), VERSION_KEY, json!("1.0.0"))
            .await
            .expect("seed marker");
        storage::write_key(
            ctx.local.as_ref(),
            "snippets",
            json!([{ "label": "Legacy", "text": "survived" }]),
        )
        .await
        .expect("seed data");

        let session = open(&ctx).await;

        assert_eq!(session.snippets().len(), 1);
        assert_eq!(session.snippets()[0].label, "Legacy");
        // Everything scavengeable is already active.
        assert!(!session.recovery_available());
    }

    #[tokio::test]
    async fn recovery_affordance_appears_for_orphaned_data() {
        let ctx = ExtensionContext::in_memory();
        storage::write_key(ctx.sync.as_ref(), VERSION_KEY, json!(SCHEMA_VERSION))
            .await
            .expect("seed marker");
        storage::write_key(
            ctx.sync.as_ref(),
            PRIMARY_KEY,
            serde_json::to_value(vec![crate::model::Snippet::new("Active", "body")])
                .expect("encode"),
        )
        .await
        .expect("seed primary");
        storage::write_key(
            ctx.local.as_ref(),
            "prompts",
            json!([{ "label": "Orphan", "text": "left behind" }]),
        )
        .await
        .expect("seed orphan");

        let mut session = open(&ctx).await;
        assert_eq!(session.snippets().len(), 1);
        assert!(session.recovery_available());

        let added = session.recover_lost().await.expect("recover");
        assert_eq!(added, 1);
        assert_eq!(session.snippets().len(), 2);
        assert!(!session.recovery_available());

        // Recovered snippets are persisted, not just held in memory.
        let stored = storage::read_key(ctx.sync.as_ref(), PRIMARY_KEY)
            .await
            .expect("read")
            .expect("written");
        assert_eq!(stored.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn recover_with_nothing_found_adds_nothing() {
        let ctx = ExtensionContext::in_memory();
        let mut session = open(&ctx).await;

        let added = session.recover_lost().await.expect("recover");
        assert_eq!(added, 0);
        assert!(session.snippets().is_empty());
    }

    #[tokio::test]
    async fn crud_round_trip_through_the_session() {
        let ctx = ExtensionContext::in_memory();
        let mut session = open(&ctx).await;

        let created = session
            .create_snippet("Greeting", "Hello there")
            .await
            .expect("create");
        let updated = session
            .update_snippet(&created.id, "Greeting", "Hello again")
            .await
            .expect("update");
        assert_eq!(updated.text, "Hello again");

        session.delete_snippet(&created.id).await.expect("delete");
        assert!(session.snippets().is_empty());
    }

    #[tokio::test]
    async fn second_open_sees_the_first_sessions_writes() {
        let ctx = ExtensionContext::in_memory();
        let mut first = open(&ctx).await;
        first
            .create_snippet("Greeting", "Hello there")
            .await
            .expect("create");

        let second = open(&ctx).await;
        assert_eq!(second.snippets().len(), 1);
        assert_eq!(second.snippets()[0].label, "Greeting");
    }
}
