//! Cluster documents and their satellite state.

use super::{Document, ProvisionedResource};
use crate::keys::{
    TYPE_BILLING, TYPE_CLUSTERS, TYPE_EXTERNAL_AUTHS, TYPE_MANAGEMENT_CONTENT, TYPE_NODE_POOLS,
    TYPE_PROVIDER_STATE,
};
use crate::resource_id::ResourceId;
use crate::state::ProvisioningState;
use crate::version::MinorVersion;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

/// A hosted control-plane cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDocument {
    pub id: ResourceId,
    /// Cluster-service identifier (href) of the remote counterpart, set once
    /// the frontend has created it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<ResourceId>,
    pub provisioning_state: ProvisioningState,
    /// Customer-requested `major.minor` upgrade target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_minor_version: Option<MinorVersion>,
    /// Update-graph channel group, e.g. `stable`.
    pub channel_group: String,
}

impl ClusterDocument {
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            internal_id: None,
            active_operation_id: None,
            provisioning_state: ProvisioningState::Accepted,
            desired_minor_version: None,
            channel_group: "stable".to_owned(),
        }
    }
}

impl Document for ClusterDocument {
    const KIND: &'static str = TYPE_CLUSTERS;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

impl ProvisionedResource for ClusterDocument {
    fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.provisioning_state = state;
    }

    fn active_operation_id(&self) -> Option<&ResourceId> {
        self.active_operation_id.as_ref()
    }

    fn set_active_operation_id(&mut self, id: Option<ResourceId>) {
        self.active_operation_id = id;
    }
}

/// A node pool under a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolDocument {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<ResourceId>,
    pub provisioning_state: ProvisioningState,
}

impl NodePoolDocument {
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            internal_id: None,
            active_operation_id: None,
            provisioning_state: ProvisioningState::Accepted,
        }
    }
}

impl Document for NodePoolDocument {
    const KIND: &'static str = TYPE_NODE_POOLS;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

impl ProvisionedResource for NodePoolDocument {
    fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.provisioning_state = state;
    }

    fn active_operation_id(&self) -> Option<&ResourceId> {
        self.active_operation_id.as_ref()
    }

    fn set_active_operation_id(&mut self, id: Option<ResourceId>) {
        self.active_operation_id = id;
    }
}

/// An external authentication configuration under a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthDocument {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<ResourceId>,
    pub provisioning_state: ProvisioningState,
}

impl ExternalAuthDocument {
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            internal_id: None,
            active_operation_id: None,
            provisioning_state: ProvisioningState::Accepted,
        }
    }
}

impl Document for ExternalAuthDocument {
    const KIND: &'static str = TYPE_EXTERNAL_AUTHS;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

impl ProvisionedResource for ExternalAuthDocument {
    fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.provisioning_state = state;
    }

    fn active_operation_id(&self) -> Option<&ResourceId> {
        self.active_operation_id.as_ref()
    }

    fn set_active_operation_id(&mut self, id: Option<ResourceId>) {
        self.active_operation_id = id;
    }
}

/// Billing status for a cluster. Stamped with a deletion timestamp before
/// the cluster hierarchy is torn down, so a crashed teardown stays
/// restartable and usage reporting sees the end of life exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDocument {
    pub id: ResourceId,
    pub cluster_id: ResourceId,
    pub creation_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<DateTime<Utc>>,
}

impl Document for BillingDocument {
    const KIND: &'static str = TYPE_BILLING;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// How many past versions the active-version history keeps.
pub const MAX_ACTIVE_VERSIONS: usize = 5;

/// Service-provider-side version state for a cluster: the recent history of
/// versions observed running (newest first) and the version the service
/// wants the cluster to reach next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderClusterDocument {
    pub id: ResourceId,
    /// Newest-first, truncated to [`MAX_ACTIVE_VERSIONS`]. The head is the
    /// most recent snapshot taken from the cluster service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_versions: Vec<Version>,
    /// Set only to a version reachable from every active version via the
    /// update graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_version: Option<Version>,
}

impl ServiceProviderClusterDocument {
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            active_versions: Vec::new(),
            desired_version: None,
        }
    }

    #[must_use]
    pub fn latest_active(&self) -> Option<&Version> {
        self.active_versions.first()
    }

    /// Records a freshly observed running version. Returns whether the
    /// history changed.
    pub fn observe_version(&mut self, version: Version) -> bool {
        if self.latest_active() == Some(&version) {
            return false;
        }
        self.active_versions.retain(|v| *v != version);
        self.active_versions.insert(0, version);
        self.active_versions.truncate(MAX_ACTIVE_VERSIONS);
        true
    }
}

impl Document for ServiceProviderClusterDocument {
    const KIND: &'static str = TYPE_PROVIDER_STATE;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Opaque management-side placement content for a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementClusterDocument {
    pub id: ResourceId,
    pub content: serde_json::Value,
}

impl Document for ManagementClusterDocument {
    const KIND: &'static str = TYPE_MANAGEMENT_CONTENT;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}
