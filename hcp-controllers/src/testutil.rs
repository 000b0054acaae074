//! Scripted fakes shared by the reconciler tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use hcp_clients::graph::{GraphError, Release, UpdateGraph, UpdateGraphClient};
use hcp_clients::notify::{NotificationClient, NotificationPayload, NotifyError};
use hcp_clients::ocm::{
    BreakGlassCredential, ClusterService, CsCluster, CsClusterState, CsExternalAuth, CsNodePool,
    OcmError, UpgradePolicy,
};
use http::StatusCode;
use parking_lot::Mutex;
use semver::Version;

pub(crate) fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

pub(crate) fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// Update graph defined edge by edge. A channel exists iff at least one
/// edge was added for it; querying an unknown channel or an unknown `from`
/// node yields the VersionNotFound sentinel.
#[derive(Default)]
pub(crate) struct FakeGraph {
    channels: Mutex<HashMap<String, HashMap<Version, Vec<Version>>>>,
    pub(crate) calls: Mutex<Vec<(String, Version)>>,
}

impl FakeGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn edge(self, channel: &str, from: &str, to: &[&str]) -> Self {
        self.channels
            .lock()
            .entry(channel.to_owned())
            .or_default()
            .insert(v(from), to.iter().map(|s| v(s)).collect());
        self
    }
}

#[async_trait]
impl UpdateGraphClient for FakeGraph {
    async fn get_updates(&self, channel: &str, from: &Version) -> Result<UpdateGraph, GraphError> {
        self.calls.lock().push((channel.to_owned(), from.clone()));
        let channels = self.channels.lock();
        let candidates = channels
            .get(channel)
            .and_then(|nodes| nodes.get(from))
            .ok_or_else(|| GraphError::VersionNotFound {
                channel: channel.to_owned(),
                version: from.clone(),
            })?;
        Ok(UpdateGraph {
            from: Release::new(from.clone()),
            candidates: candidates.iter().cloned().map(Release::new).collect(),
            conditional: Vec::new(),
        })
    }
}

/// Cluster service whose world is plain maps keyed by internal id.
#[derive(Default)]
pub(crate) struct FakeClusterService {
    pub(crate) clusters: Mutex<HashMap<String, CsCluster>>,
    pub(crate) node_pools: Mutex<HashMap<String, Vec<CsNodePool>>>,
    pub(crate) external_auths: Mutex<HashMap<String, Vec<CsExternalAuth>>>,
    pub(crate) credentials: Mutex<HashMap<String, Vec<BreakGlassCredential>>>,
    pub(crate) upgrade_policies: Mutex<HashMap<String, Vec<UpgradePolicy>>>,
    /// When set, every cluster lookup fails as if the transport dropped.
    pub(crate) unreachable: Mutex<bool>,
}

impl FakeClusterService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put_cluster(&self, internal_id: &str, state: CsClusterState) {
        self.clusters.lock().insert(
            internal_id.to_owned(),
            CsCluster {
                id: internal_id.to_owned(),
                name: internal_id.to_owned(),
                state,
                current_version: None,
                provision_error: None,
                inflight_checks: Vec::new(),
            },
        );
    }

    pub(crate) fn remove_cluster(&self, internal_id: &str) {
        self.clusters.lock().remove(internal_id);
    }
}

#[async_trait]
impl ClusterService for FakeClusterService {
    async fn get_cluster(&self, internal_id: &str) -> Result<CsCluster, OcmError> {
        if *self.unreachable.lock() {
            return Err(OcmError::Transport("socket closed".into()));
        }
        self.clusters
            .lock()
            .get(internal_id)
            .cloned()
            .ok_or_else(|| OcmError::not_found(internal_id))
    }

    async fn get_node_pool(&self, internal_id: &str) -> Result<CsNodePool, OcmError> {
        self.node_pools
            .lock()
            .values()
            .flatten()
            .find(|pool| pool.id == internal_id)
            .cloned()
            .ok_or_else(|| OcmError::not_found(internal_id))
    }

    async fn list_node_pools(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<CsNodePool>, OcmError> {
        Ok(self
            .node_pools
            .lock()
            .get(cluster_internal_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_external_auth(&self, internal_id: &str) -> Result<CsExternalAuth, OcmError> {
        self.external_auths
            .lock()
            .values()
            .flatten()
            .find(|auth| auth.id == internal_id)
            .cloned()
            .ok_or_else(|| OcmError::not_found(internal_id))
    }

    async fn list_external_auths(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<CsExternalAuth>, OcmError> {
        Ok(self
            .external_auths
            .lock()
            .get(cluster_internal_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_break_glass_credential(
        &self,
        cluster_internal_id: &str,
        credential_id: &str,
    ) -> Result<BreakGlassCredential, OcmError> {
        self.credentials
            .lock()
            .get(cluster_internal_id)
            .and_then(|creds| creds.iter().find(|c| c.id == credential_id))
            .cloned()
            .ok_or_else(|| OcmError::not_found(credential_id))
    }

    async fn list_break_glass_credentials(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<BreakGlassCredential>, OcmError> {
        Ok(self
            .credentials
            .lock()
            .get(cluster_internal_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_upgrade_policies(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<UpgradePolicy>, OcmError> {
        let mut policies = self
            .upgrade_policies
            .lock()
            .get(cluster_internal_id)
            .cloned()
            .unwrap_or_default();
        policies.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        Ok(policies)
    }

    async fn create_upgrade_policy(
        &self,
        cluster_internal_id: &str,
        version: &Version,
    ) -> Result<UpgradePolicy, OcmError> {
        let policy = UpgradePolicy {
            id: format!("policy-{version}"),
            version: version.clone(),
            creation_time: Utc::now(),
        };
        self.upgrade_policies
            .lock()
            .entry(cluster_internal_id.to_owned())
            .or_default()
            .push(policy.clone());
        Ok(policy)
    }
}

/// Records deliveries; can be told to reject the next N posts.
#[derive(Default)]
pub(crate) struct FakeNotifier {
    pub(crate) posts: Mutex<Vec<(String, NotificationPayload)>>,
    pub(crate) reject_next: Mutex<u32>,
}

impl FakeNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn post_count(&self) -> usize {
        self.posts.lock().len()
    }
}

#[async_trait]
impl NotificationClient for FakeNotifier {
    async fn notify(&self, uri: &str, payload: &NotificationPayload) -> Result<(), NotifyError> {
        {
            let mut reject = self.reject_next.lock();
            if *reject > 0 {
                *reject -= 1;
                return Err(NotifyError::Rejected(StatusCode::SERVICE_UNAVAILABLE));
            }
        }
        self.posts.lock().push((uri.to_owned(), payload.clone()));
        Ok(())
    }
}
