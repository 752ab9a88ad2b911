use std::collections::HashMap;

use serde_json::Value;
use tracing::{error, info};

use crate::model::SCHEMA_VERSION;
use crate::services::{scanner, validator};
use crate::storage::{self, StorageError, PRIMARY_KEY, VERSION_KEY};
use crate::ExtensionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No marker found: stamped the current version and nothing else.
    /// Default data is seeded by the install entry point, not here.
    FreshInstall,
    /// Marker already matches the running schema version.
    UpToDate,
    /// Marker mismatched and the scavenge produced records; the cleaned set
    /// now overwrites the primary key.
    Migrated(usize),
    /// Marker mismatched but no source held any data; only the marker moved.
    NothingToMigrate,
    /// Storage failed somewhere along the way. Never fatal: the hosting
    /// process continues as if migration had not run.
    Failed,
}

/// Arbitrates schema migrations against the version marker. Both the
/// background process and the popup run this independently at their lifecycle
/// points; the sequence is idempotent, so the race's worst case is a
/// redundant re-migration.
pub struct MigrationManager {
    current_version: &'static str,
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationManager {
    pub fn new() -> Self {
        Self {
            current_version: SCHEMA_VERSION,
        }
    }

    #[cfg(test)]
    pub fn with_version(current_version: &'static str) -> Self {
        Self { current_version }
    }

    pub async fn migrate_if_needed(&self, ctx: &ExtensionContext) -> MigrationOutcome {
        match self.run(ctx).await {
            Ok(outcome) => {
                match outcome {
                    MigrationOutcome::Migrated(count) => {
                        info!("migrated {count} snippets to schema {}", self.current_version);
                    }
                    MigrationOutcome::NothingToMigrate => {
                        info!("no data to migrate, version marker updated");
                    }
                    MigrationOutcome::FreshInstall => {
                        info!("fresh install, stamped schema {}", self.current_version);
                    }
                    MigrationOutcome::UpToDate | MigrationOutcome::Failed => {}
                }
                outcome
            }
            Err(err) => {
                error!("migration failed: {err}");
                MigrationOutcome::Failed
            }
        }
    }

    async fn run(&self, ctx: &ExtensionContext) -> Result<MigrationOutcome, StorageError> {
        let stored = storage::read_key(ctx.sync.as_ref(), VERSION_KEY)
            .await?
            .and_then(|value| value.as_str().map(str::to_string));

        let Some(stored) = stored else {
            self.stamp_version(ctx).await?;
            return Ok(MigrationOutcome::FreshInstall);
        };

        if stored == self.current_version {
            return Ok(MigrationOutcome::UpToDate);
        }

        info!(
            "schema marker {stored} does not match {}, scavenging all sources",
            self.current_version
        );

        let Some(candidates) = scanner::scan(ctx).await else {
            self.stamp_version(ctx).await?;
            return Ok(MigrationOutcome::NothingToMigrate);
        };

        let cleaned = validator::clean(candidates);
        let entries = HashMap::from([
            (PRIMARY_KEY.to_string(), serde_json::to_value(&cleaned)?),
            (
                VERSION_KEY.to_string(),
                Value::String(self.current_version.to_string()),
            ),
        ]);
        ctx.sync.set(entries).await?;
        Ok(MigrationOutcome::Migrated(cleaned.len()))
    }

    async fn stamp_version(&self, ctx: &ExtensionContext) -> Result<(), StorageError> {
        storage::write_key(
            ctx.sync.as_ref(),
            VERSION_KEY,
            Value::String(self.current_version.to_string()),
        )
        .await
    }
}
