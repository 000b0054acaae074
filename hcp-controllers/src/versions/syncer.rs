//! Keeps the service-provider version state of a cluster current.

use super::{select_next_version, GraphClientCache};
use async_trait::async_trait;
use hcp_clients::ocm::ClusterService;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{ClusterDocument, ServiceProviderClusterDocument};
use hcp_core::{ClusterKey, ResourceKey};
use hcp_runtime::{BoxError, Cooldown, Syncer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cluster syncer that snapshots the running version into the
/// active-version history and computes the next desired version from the
/// update graph.
pub struct VersionSyncer {
    clusters: Docs<ClusterDocument>,
    provider_state: Docs<ServiceProviderClusterDocument>,
    cluster_service: Arc<dyn ClusterService>,
    graph_clients: Arc<GraphClientCache>,
    cooldown: Arc<dyn Cooldown<ClusterKey>>,
}

impl VersionSyncer {
    #[must_use]
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
        graph_clients: Arc<GraphClientCache>,
        cooldown: Arc<dyn Cooldown<ClusterKey>>,
    ) -> Self {
        Self {
            clusters: Docs::new(Arc::clone(&backend)),
            provider_state: Docs::new(backend),
            cluster_service,
            graph_clients,
            cooldown,
        }
    }
}

#[async_trait]
impl Syncer for VersionSyncer {
    type Key = ClusterKey;

    async fn sync_once(
        &self,
        _shutdown: &CancellationToken,
        key: &ClusterKey,
    ) -> Result<(), BoxError> {
        let Some(cluster) = self.clusters.try_get(&key.resource_id()).await? else {
            return Ok(());
        };
        let Some(internal_id) = &cluster.internal_id else {
            debug!(%key, "cluster has no remote counterpart yet");
            return Ok(());
        };
        let remote = match self.cluster_service.get_cluster(internal_id).await {
            Ok(remote) => remote,
            // Remote gone: the drift reconciler owns that situation.
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut state = self
            .provider_state
            .create_or_get(&ServiceProviderClusterDocument::new(key.provider_state_id()))
            .await?;
        let mut changed = false;
        if let Some(current) = remote.current_version {
            changed |= state.observe_version(current);
        }

        if let Some(desired_minor) = cluster.desired_minor_version {
            let graph = self.graph_clients.client_for(key);
            let selected = select_next_version(
                graph.as_ref(),
                &cluster.channel_group,
                desired_minor,
                &state.active_versions,
            )
            .await?;
            if let Some(version) = selected {
                if state.desired_version.as_ref() != Some(&version) {
                    info!(%key, %version, "new desired version");
                    state.desired_version = Some(version);
                    changed = true;
                }
            }
        }

        if changed {
            self.provider_state.replace(&state).await?;
        }
        Ok(())
    }

    fn cooldown(&self) -> Arc<dyn Cooldown<ClusterKey>> {
        Arc::clone(&self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{v, FakeClusterService, FakeGraph};
    use hcp_clients::ocm::CsClusterState;
    use hcp_clients::store::MemoryStore;
    use hcp_core::MinorVersion;
    use hcp_runtime::TimeCooldown;
    use std::time::Duration;

    fn cooldown() -> Arc<dyn Cooldown<ClusterKey>> {
        Arc::new(TimeCooldown::new(Duration::ZERO))
    }

    fn cache_of(graph: FakeGraph) -> Arc<GraphClientCache> {
        let graph = Arc::new(graph);
        Arc::new(GraphClientCache::new(Box::new(move |_| {
            Arc::clone(&graph) as Arc<dyn hcp_clients::graph::UpdateGraphClient>
        })))
    }

    struct Fixture {
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<FakeClusterService>,
        key: ClusterKey,
    }

    impl Fixture {
        async fn new(desired_minor: Option<&str>) -> Self {
            let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
            let cluster_service = Arc::new(FakeClusterService::new());
            let key = ClusterKey::new("sub1", "rg1", "c1");

            let mut doc = ClusterDocument::new(key.resource_id());
            doc.internal_id = Some("cs-c1".into());
            doc.desired_minor_version =
                desired_minor.map(|m| m.parse::<MinorVersion>().unwrap());
            Docs::new(Arc::clone(&backend)).create(&doc).await.unwrap();

            Self {
                backend,
                cluster_service,
                key,
            }
        }

        fn syncer(&self, graph: FakeGraph) -> VersionSyncer {
            VersionSyncer::new(
                Arc::clone(&self.backend),
                Arc::clone(&self.cluster_service) as Arc<dyn ClusterService>,
                cache_of(graph),
                cooldown(),
            )
        }

        async fn state(&self) -> ServiceProviderClusterDocument {
            Docs::new(Arc::clone(&self.backend))
                .get(&self.key.provider_state_id())
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn records_running_version_and_desired_version() {
        let fixture = Fixture::new(Some("4.19")).await;
        fixture.cluster_service.put_cluster("cs-c1", CsClusterState::Ready);
        fixture
            .cluster_service
            .clusters
            .lock()
            .get_mut("cs-c1")
            .unwrap()
            .current_version = Some(v("4.19.10"));

        let graph = FakeGraph::new().edge("stable-4.19", "4.19.10", &["4.19.22"]);
        let syncer = fixture.syncer(graph);
        syncer
            .sync_once(&CancellationToken::new(), &fixture.key)
            .await
            .unwrap();

        let state = fixture.state().await;
        assert_eq!(state.active_versions, vec![v("4.19.10")]);
        assert_eq!(state.desired_version, Some(v("4.19.22")));
    }

    #[tokio::test]
    async fn rerun_with_no_change_writes_nothing_new() {
        let fixture = Fixture::new(Some("4.19")).await;
        fixture.cluster_service.put_cluster("cs-c1", CsClusterState::Ready);
        fixture
            .cluster_service
            .clusters
            .lock()
            .get_mut("cs-c1")
            .unwrap()
            .current_version = Some(v("4.19.10"));

        let graph = FakeGraph::new().edge("stable-4.19", "4.19.10", &["4.19.22"]);
        let syncer = fixture.syncer(graph);
        syncer.sync_once(&CancellationToken::new(), &fixture.key).await.unwrap();
        let first = fixture.state().await;
        syncer.sync_once(&CancellationToken::new(), &fixture.key).await.unwrap();
        assert_eq!(fixture.state().await, first);
    }

    #[tokio::test]
    async fn no_desired_minor_still_snapshots_the_running_version() {
        let fixture = Fixture::new(None).await;
        fixture.cluster_service.put_cluster("cs-c1", CsClusterState::Ready);
        fixture
            .cluster_service
            .clusters
            .lock()
            .get_mut("cs-c1")
            .unwrap()
            .current_version = Some(v("4.19.10"));

        let syncer = fixture.syncer(FakeGraph::new());
        syncer.sync_once(&CancellationToken::new(), &fixture.key).await.unwrap();

        let state = fixture.state().await;
        assert_eq!(state.active_versions, vec![v("4.19.10")]);
        assert_eq!(state.desired_version, None);
    }

    #[tokio::test]
    async fn deleted_cluster_and_missing_remote_are_success() {
        let fixture = Fixture::new(Some("4.19")).await;
        let syncer = fixture.syncer(FakeGraph::new());
        // Remote counterpart missing entirely.
        syncer.sync_once(&CancellationToken::new(), &fixture.key).await.unwrap();

        // Document missing entirely.
        let ghost = ClusterKey::new("sub1", "rg1", "ghost");
        syncer.sync_once(&CancellationToken::new(), &ghost).await.unwrap();
    }
}
