use serde_json::Value;
use tracing::debug;

use crate::storage::{self, StorageBackend, LEGACY_KEYS, PRIMARY_KEY};
use crate::ExtensionContext;

/// Scavenges every known storage location for snippet-like records: the
/// primary key and each legacy key, against both backends. Contributions are
/// concatenated rather than merged; deduplication is the validator's job.
///
/// Returns `None` only when every source yielded nothing, so callers can tell
/// "no data anywhere" apart from "empty after filtering".
pub async fn scan(ctx: &ExtensionContext) -> Option<Vec<Value>> {
    let mut found = Vec::new();

    collect_key(ctx.sync.as_ref(), PRIMARY_KEY, &mut found).await;
    collect_key(ctx.local.as_ref(), PRIMARY_KEY, &mut found).await;

    for key in LEGACY_KEYS {
        collect_key(ctx.sync.as_ref(), key, &mut found).await;
    }
    for key in LEGACY_KEYS {
        collect_key(ctx.local.as_ref(), key, &mut found).await;
    }

    if found.is_empty() {
        None
    } else {
        debug!("scan found {} candidate records", found.len());
        Some(found)
    }
}

// A failed or malformed read is "found nothing there"; the remaining sources
// still get scanned.
async fn collect_key(backend: &dyn StorageBackend, key: &str, found: &mut Vec<Value>) {
    match storage::read_key(backend, key).await {
        Ok(Some(Value::Array(items))) if !items.is_empty() => {
            debug!("found {} records under key {key}", items.len());
            found.extend(items);
        }
        Ok(_) => {}
        Err(err) => debug!("skipping unreadable source {key}: {err}"),
    }
}
