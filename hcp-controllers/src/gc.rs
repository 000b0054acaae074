//! Recursive deletion of document hierarchies.

use futures::TryStreamExt;
use hcp_clients::store::{StoreBackend, StoreError};
use hcp_core::keys::TYPE_CONTROLLERS;
use hcp_core::ResourceId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether `id` addresses a controller record.
#[must_use]
pub fn is_controller_record(id: &ResourceId) -> bool {
    id.resource_type().eq_ignore_ascii_case(TYPE_CONTROLLERS)
}

/// Deletes every descendant of `root` matched by `retainable`, then `root`
/// itself. Both steps tolerate already-deleted documents, so a crashed run
/// is re-runnable and a second invocation is a no-op.
///
/// Operations under the deleted hierarchy are not touched here; they are
/// garbage-collected by TTL.
pub async fn delete_recursively(
    backend: &Arc<dyn StoreBackend>,
    root: &ResourceId,
) -> Result<(), StoreError> {
    delete_descendants_matching(backend, root, |_| true).await?;
    delete_ignoring_missing(backend, root).await
}

/// Deletes the descendants of `root` for which `matches` returns true.
/// `root` itself is left alone.
pub async fn delete_descendants_matching(
    backend: &Arc<dyn StoreBackend>,
    root: &ResourceId,
    matches: impl Fn(&ResourceId) -> bool,
) -> Result<(), StoreError> {
    let mut descendants = backend.list_recursive(root);
    let mut doomed = Vec::new();
    while let Some(value) = descendants.try_next().await? {
        let Some(raw) = value.get("id").and_then(serde_json::Value::as_str) else {
            warn!(%root, "descendant document without an id field, skipping");
            continue;
        };
        let id: ResourceId = match raw.parse() {
            Ok(id) => id,
            Err(error) => {
                warn!(%root, raw, %error, "descendant document with unparseable id, skipping");
                continue;
            }
        };
        if matches(&id) {
            doomed.push(id);
        }
    }
    drop(descendants);

    debug!(%root, count = doomed.len(), "deleting descendants");
    for id in &doomed {
        delete_ignoring_missing(backend, id).await?;
    }
    Ok(())
}

async fn delete_ignoring_missing(
    backend: &Arc<dyn StoreBackend>,
    id: &ResourceId,
) -> Result<(), StoreError> {
    match backend.delete(id).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err),
    }
}
