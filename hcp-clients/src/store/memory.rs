//! In-memory store backend, used as the test double across the workspace.

use super::{StoreBackend, StoreError};
use async_trait::async_trait;
use futures::{stream, stream::BoxStream, StreamExt};
use hcp_core::ResourceId;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A [`StoreBackend`] over a sorted map keyed by the store-key encoding,
/// which makes child and descendant listing a prefix scan, the same access
/// pattern the production store uses.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn scan(
        &self,
        prefix: &str,
        kind: Option<&str>,
    ) -> Vec<serde_json::Value> {
        self.docs
            .read()
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| {
                kind.is_none_or(|kind| {
                    let segments: Vec<&str> = key.split('|').collect();
                    segments.len() >= 2 && segments[segments.len() - 2] == kind
                })
            })
            .map(|(_, value)| value.clone())
            .collect()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn create(&self, id: &ResourceId, body: serde_json::Value) -> Result<(), StoreError> {
        let mut docs = self.docs.write();
        let key = id.store_key();
        if docs.contains_key(&key) {
            return Err(StoreError::conflict(id));
        }
        docs.insert(key, body);
        Ok(())
    }

    async fn get(&self, id: &ResourceId) -> Result<serde_json::Value, StoreError> {
        self.docs
            .read()
            .get(&id.store_key())
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn replace(&self, id: &ResourceId, body: serde_json::Value) -> Result<(), StoreError> {
        let mut docs = self.docs.write();
        match docs.get_mut(&id.store_key()) {
            Some(slot) => {
                *slot = body;
                Ok(())
            }
            None => Err(StoreError::not_found(id)),
        }
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        match self.docs.write().remove(&id.store_key()) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(id)),
        }
    }

    fn list(
        &self,
        scope: Option<&ResourceId>,
        kind: &str,
    ) -> BoxStream<'static, Result<serde_json::Value, StoreError>> {
        let prefix = scope.map(|scope| format!("{}|", scope.store_key())).unwrap_or_default();
        let items = self.scan(&prefix, Some(&kind.to_ascii_lowercase()));
        stream::iter(items.into_iter().map(Ok)).boxed()
    }

    fn list_recursive(
        &self,
        root: &ResourceId,
    ) -> BoxStream<'static, Result<serde_json::Value, StoreError>> {
        let prefix = format!("{}|", root.store_key());
        stream::iter(self.scan(&prefix, None).into_iter().map(Ok)).boxed()
    }
}
