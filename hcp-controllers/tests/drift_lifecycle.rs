//! End-to-end drift lifecycle: a cluster that vanishes remotely is torn
//! down locally through the full controller loop, and the record the
//! controller leaves behind is swept once its parent is gone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hcp_clients::ocm::{
    BreakGlassCredential, ClusterService, CsCluster, CsClusterState, CsExternalAuth, CsNodePool,
    OcmError, UpgradePolicy,
};
use hcp_clients::store::{Docs, MemoryStore, StoreBackend};
use hcp_controllers::drift::{ClusterDriftSyncer, OrphanControllerSweep};
use hcp_controllers::enumerate::{cluster_keys, SubscriptionKeyEnumerator};
use hcp_core::documents::{
    BillingDocument, ClusterDocument, ControllerDocument, NodePoolDocument, SubscriptionDocument,
};
use hcp_core::{ClusterKey, NodePoolKey, ResourceKey, SubscriptionKey, SubscriptionState};
use hcp_runtime::{Controller, ManualClock, StatusWriter, TimeCooldown};
use parking_lot::Mutex;
use semver::Version;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cluster service where only the cluster population matters.
#[derive(Default)]
struct SparseClusterService {
    clusters: Mutex<HashMap<String, CsCluster>>,
}

impl SparseClusterService {
    fn put_cluster(&self, internal_id: &str) {
        self.clusters.lock().insert(
            internal_id.to_owned(),
            CsCluster {
                id: internal_id.to_owned(),
                name: internal_id.to_owned(),
                state: CsClusterState::Ready,
                current_version: None,
                provision_error: None,
                inflight_checks: Vec::new(),
            },
        );
    }
}

#[async_trait]
impl ClusterService for SparseClusterService {
    async fn get_cluster(&self, internal_id: &str) -> Result<CsCluster, OcmError> {
        self.clusters
            .lock()
            .get(internal_id)
            .cloned()
            .ok_or_else(|| OcmError::not_found(internal_id))
    }

    async fn get_node_pool(&self, internal_id: &str) -> Result<CsNodePool, OcmError> {
        Err(OcmError::not_found(internal_id))
    }

    async fn list_node_pools(&self, _cluster: &str) -> Result<Vec<CsNodePool>, OcmError> {
        Ok(Vec::new())
    }

    async fn get_external_auth(&self, internal_id: &str) -> Result<CsExternalAuth, OcmError> {
        Err(OcmError::not_found(internal_id))
    }

    async fn list_external_auths(&self, _cluster: &str) -> Result<Vec<CsExternalAuth>, OcmError> {
        Ok(Vec::new())
    }

    async fn get_break_glass_credential(
        &self,
        _cluster: &str,
        credential_id: &str,
    ) -> Result<BreakGlassCredential, OcmError> {
        Err(OcmError::not_found(credential_id))
    }

    async fn list_break_glass_credentials(
        &self,
        _cluster: &str,
    ) -> Result<Vec<BreakGlassCredential>, OcmError> {
        Ok(Vec::new())
    }

    async fn list_upgrade_policies(&self, _cluster: &str) -> Result<Vec<UpgradePolicy>, OcmError> {
        Ok(Vec::new())
    }

    async fn create_upgrade_policy(
        &self,
        _cluster: &str,
        _version: &Version,
    ) -> Result<UpgradePolicy, OcmError> {
        Err(OcmError::Transport("not under test".into()))
    }
}

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn remote_deletion_flows_through_the_controller_loop() {
    let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
    let cluster_service = Arc::new(SparseClusterService::default());
    let clock = ManualClock::at(ts("2026-03-01T00:00:00Z"));
    let key = ClusterKey::new("sub1", "rg1", "c1");

    // Seed: an active subscription, the cluster and a node pool, billing.
    Docs::new(Arc::clone(&backend))
        .create(&SubscriptionDocument {
            id: SubscriptionKey::new("sub1").resource_id(),
            state: SubscriptionState::Registered,
        })
        .await
        .unwrap();
    let mut cluster = ClusterDocument::new(key.resource_id());
    cluster.internal_id = Some("cs-c1".into());
    Docs::new(Arc::clone(&backend)).create(&cluster).await.unwrap();
    let pool = NodePoolKey::new(key.clone(), "p1");
    Docs::new(Arc::clone(&backend))
        .create(&NodePoolDocument::new(pool.resource_id()))
        .await
        .unwrap();
    Docs::new(Arc::clone(&backend))
        .create(&BillingDocument {
            id: key.billing_id(),
            cluster_id: key.resource_id(),
            creation_time: ts("2026-01-01T00:00:00Z"),
            deletion_time: None,
        })
        .await
        .unwrap();
    cluster_service.put_cluster("cs-c1");

    let status = StatusWriter::new(Arc::clone(&backend), Arc::new(clock.clone()));
    let drift = Controller::new(
        "clusterDrift",
        ClusterDriftSyncer::new(
            Arc::clone(&backend),
            Arc::clone(&cluster_service) as Arc<dyn ClusterService>,
            Arc::new(clock.clone()),
            Arc::new(TimeCooldown::new(Duration::ZERO)),
        ),
        status.clone(),
    )
    .with_enumerator(Arc::new(cluster_keys(Arc::clone(&backend))))
    .with_resync_interval(Duration::from_millis(50));

    let sweep = Controller::new(
        "orphanSweep",
        OrphanControllerSweep::new(
            Arc::clone(&backend),
            Arc::new(TimeCooldown::new(Duration::ZERO)),
        ),
        status.clone(),
    )
    .with_enumerator(Arc::new(SubscriptionKeyEnumerator::new(Arc::clone(&backend))))
    .with_resync_interval(Duration::from_millis(50));

    let shutdown = CancellationToken::new();
    let drift_task = tokio::spawn(drift.run(shutdown.clone(), 2));
    let sweep_task = tokio::spawn(sweep.run(shutdown.clone(), 1));

    // Phase 1: remote cluster exists; the drift controller records a
    // healthy condition under the cluster.
    let records: Docs<ControllerDocument> = Docs::new(Arc::clone(&backend));
    let record_id = key.controller_record("clusterDrift").id.clone();
    let mut observed = false;
    for _ in 0..500 {
        if records.try_get(&record_id).await.unwrap().is_some() {
            observed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(observed, "drift controller never recorded status");
    assert!(backend.get(&key.resource_id()).await.is_ok());

    // Phase 2: the remote side loses the cluster. The next drift pass
    // stamps billing and cascades; the sweep then removes the leftover
    // controller record.
    cluster_service.clusters.lock().clear();

    let billing: Docs<BillingDocument> = Docs::new(Arc::clone(&backend));
    let mut torn_down = false;
    for _ in 0..500 {
        let cluster_gone = backend.get(&key.resource_id()).await.is_err();
        let record_gone = records.try_get(&record_id).await.unwrap().is_none();
        if cluster_gone && record_gone {
            torn_down = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(torn_down, "teardown did not complete");

    assert!(backend.get(&pool.resource_id()).await.unwrap_err().is_not_found());
    let stamped = billing.get(&key.billing_id()).await.unwrap();
    assert_eq!(stamped.deletion_time, Some(ts("2026-03-01T00:00:00Z")));

    shutdown.cancel();
    drift_task.await.unwrap();
    sweep_task.await.unwrap();
}
