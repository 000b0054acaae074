//! Store-backed active-operation lookup for the operation-aware cooldown.

use async_trait::async_trait;
use futures::TryStreamExt;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::OperationDocument;
use hcp_core::{ResourceId, ResourceKey, SubscriptionKey};
use hcp_runtime::{ActiveOperationLister, BoxError};
use std::sync::Arc;

/// Answers "does this resource have an operation in flight?" from the
/// operation documents of the resource's subscription. Operations on a
/// descendant count as activity on the resource.
pub struct StoreOperationLister {
    operations: Docs<OperationDocument>,
}

impl StoreOperationLister {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            operations: Docs::new(backend),
        }
    }
}

#[async_trait]
impl ActiveOperationLister for StoreOperationLister {
    async fn has_active_operations(
        &self,
        subscription_id: &str,
        resource_id: &ResourceId,
    ) -> Result<bool, BoxError> {
        let scope = SubscriptionKey::new(subscription_id).resource_id();
        let mut operations = self.operations.list(Some(&scope));
        while let Some(op) = operations.try_next().await? {
            if op.is_terminal() {
                continue;
            }
            if op.external_id == *resource_id || op.external_id.is_descendant_of(resource_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
