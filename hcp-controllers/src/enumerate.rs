//! Key enumerators for the periodic resync walks.
//!
//! Each walk starts from the subscription population and fans out to the
//! relevant children. Only Registered/Warned subscriptions are walked.

use async_trait::async_trait;
use futures::TryStreamExt;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{
    ClusterDocument, Document, ExternalAuthDocument, NodePoolDocument, OperationDocument,
    SubscriptionDocument,
};
use hcp_core::{
    ClusterKey, ExternalAuthKey, NodePoolKey, OperationKey, ResourceId, ResourceKey,
    SubscriptionKey,
};
use hcp_runtime::{BoxError, KeyEnumerator};
use std::sync::Arc;
use tracing::warn;

async fn active_subscriptions(
    subscriptions: &Docs<SubscriptionDocument>,
) -> Result<Vec<SubscriptionDocument>, BoxError> {
    let all: Vec<SubscriptionDocument> = subscriptions.list(None).try_collect().await?;
    Ok(all.into_iter().filter(|sub| sub.state.is_active()).collect())
}

/// Enumerates the keys of one document kind across all active
/// subscriptions.
pub struct ChildKeyEnumerator<D, K> {
    subscriptions: Docs<SubscriptionDocument>,
    docs: Docs<D>,
    to_key: fn(&ResourceId) -> Option<K>,
}

impl<D: Document, K: ResourceKey> ChildKeyEnumerator<D, K> {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>, to_key: fn(&ResourceId) -> Option<K>) -> Self {
        Self {
            subscriptions: Docs::new(Arc::clone(&backend)),
            docs: Docs::new(backend),
            to_key,
        }
    }
}

#[async_trait]
impl<D: Document, K: ResourceKey> KeyEnumerator<K> for ChildKeyEnumerator<D, K> {
    async fn keys(&self) -> Result<Vec<K>, BoxError> {
        let mut keys = Vec::new();
        for sub in active_subscriptions(&self.subscriptions).await? {
            let mut docs = self.docs.list(Some(&sub.id));
            while let Some(doc) = docs.try_next().await? {
                match (self.to_key)(doc.id()) {
                    Some(key) => keys.push(key),
                    None => warn!(id = %doc.id(), "document id does not form a key"),
                }
            }
        }
        Ok(keys)
    }
}

#[must_use]
pub fn cluster_keys(backend: Arc<dyn StoreBackend>) -> ChildKeyEnumerator<ClusterDocument, ClusterKey> {
    ChildKeyEnumerator::new(backend, ClusterKey::from_resource_id)
}

#[must_use]
pub fn node_pool_keys(
    backend: Arc<dyn StoreBackend>,
) -> ChildKeyEnumerator<NodePoolDocument, NodePoolKey> {
    ChildKeyEnumerator::new(backend, NodePoolKey::from_resource_id)
}

#[must_use]
pub fn external_auth_keys(
    backend: Arc<dyn StoreBackend>,
) -> ChildKeyEnumerator<ExternalAuthDocument, ExternalAuthKey> {
    ChildKeyEnumerator::new(backend, ExternalAuthKey::from_resource_id)
}

#[must_use]
pub fn operation_keys(
    backend: Arc<dyn StoreBackend>,
) -> ChildKeyEnumerator<OperationDocument, OperationKey> {
    ChildKeyEnumerator::new(backend, OperationKey::from_resource_id)
}

/// Enumerates the active subscriptions themselves.
pub struct SubscriptionKeyEnumerator {
    subscriptions: Docs<SubscriptionDocument>,
}

impl SubscriptionKeyEnumerator {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            subscriptions: Docs::new(backend),
        }
    }
}

#[async_trait]
impl KeyEnumerator<SubscriptionKey> for SubscriptionKeyEnumerator {
    async fn keys(&self) -> Result<Vec<SubscriptionKey>, BoxError> {
        Ok(active_subscriptions(&self.subscriptions)
            .await?
            .iter()
            .map(SubscriptionDocument::key)
            .collect())
    }
}
