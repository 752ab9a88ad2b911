use std::collections::HashSet;

use tracing::info;

use crate::model::Snippet;
use crate::services::{scanner, validator};
use crate::ExtensionContext;

/// Scavenges every storage location and returns the snippets whose content
/// fingerprint is not already in `active`. Does not touch the store; the
/// caller decides whether to append and save.
pub async fn recover(ctx: &ExtensionContext, active: &[Snippet]) -> Vec<Snippet> {
    let Some(candidates) = scanner::scan(ctx).await else {
        return Vec::new();
    };
    let cleaned = validator::clean(candidates);
    let net_new = filter_net_new(active, cleaned);
    if !net_new.is_empty() {
        info!("recovery found {} snippets not in the active collection", net_new.len());
    }
    net_new
}

/// Read-only variant used to decide whether to surface a recovery affordance.
pub async fn has_recoverable(ctx: &ExtensionContext, active: &[Snippet]) -> bool {
    !recover(ctx, active).await.is_empty()
}

pub fn filter_net_new(active: &[Snippet], candidates: Vec<Snippet>) -> Vec<Snippet> {
    let existing: HashSet<String> = active
        .iter()
        .map(|snippet| validator::fingerprint(&snippet.label, &snippet.text))
        .collect();

    candidates
        .into_iter()
        .filter(|candidate| {
            !existing.contains(&validator::fingerprint(&candidate.label, &candidate.text))
        })
        .collect()
}
