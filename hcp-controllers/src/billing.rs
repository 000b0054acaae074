//! Billing document stamping.
//!
//! The deletion timestamp is written **before** a cluster hierarchy is torn
//! down. The first stamp wins; re-running after a crash leaves it untouched,
//! which is what keeps the teardown sequence restartable.

use chrono::{DateTime, Utc};
use hcp_clients::store::{Docs, StoreError};
use hcp_core::documents::BillingDocument;
use hcp_core::{ClusterKey, ResourceKey};
use tracing::warn;

pub async fn stamp_deletion(
    billing: &Docs<BillingDocument>,
    cluster: &ClusterKey,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let id = cluster.billing_id();
    let Some(mut doc) = billing.try_get(&id).await? else {
        warn!(%cluster, "no billing document to stamp at teardown");
        return Ok(());
    };
    if doc.deletion_time.is_some() {
        return Ok(());
    }
    doc.deletion_time = Some(now);
    billing.replace(&doc).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcp_clients::store::{MemoryStore, StoreBackend};
    use std::sync::Arc;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn first_stamp_wins() {
        let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
        let billing = Docs::<BillingDocument>::new(Arc::clone(&backend));
        let cluster = ClusterKey::new("sub1", "rg1", "c1");
        billing
            .create(&BillingDocument {
                id: cluster.billing_id(),
                cluster_id: cluster.resource_id(),
                creation_time: ts("2026-01-01T00:00:00Z"),
                deletion_time: None,
            })
            .await
            .unwrap();

        stamp_deletion(&billing, &cluster, ts("2026-03-01T00:00:00Z")).await.unwrap();
        stamp_deletion(&billing, &cluster, ts("2026-03-02T00:00:00Z")).await.unwrap();

        let doc = billing.get(&cluster.billing_id()).await.unwrap();
        assert_eq!(doc.deletion_time, Some(ts("2026-03-01T00:00:00Z")));
    }

    #[tokio::test]
    async fn missing_billing_document_is_tolerated() {
        let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
        let billing = Docs::<BillingDocument>::new(Arc::clone(&backend));
        let cluster = ClusterKey::new("sub1", "rg1", "c1");
        stamp_deletion(&billing, &cluster, ts("2026-03-01T00:00:00Z")).await.unwrap();
    }
}
