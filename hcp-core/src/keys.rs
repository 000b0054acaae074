//! Typed keys for the resources the runtime reconciles.
//!
//! Keys are the unit that flows through work queues and cooldowns: small
//! immutable value types carrying just enough identifiers to locate the
//! resource in the document store. Equality and hashing drive queue
//! de-duplication, so keys derive both structurally.

use crate::documents::ControllerDocument;
use crate::resource_id::ResourceId;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Resource provider namespace for all ids rendered by keys.
pub const PROVIDER_NAMESPACE: &str = "Microsoft.RedHatOpenShift";

pub const TYPE_CLUSTERS: &str = "hcpOpenShiftClusters";
pub const TYPE_NODE_POOLS: &str = "nodePools";
pub const TYPE_EXTERNAL_AUTHS: &str = "externalAuths";
pub const TYPE_OPERATIONS: &str = "hcpOperationStatuses";
pub const TYPE_CONTROLLERS: &str = "controllers";
pub const TYPE_BILLING: &str = "hcpOpenShiftClusterBillingStatuses";
pub const TYPE_PROVIDER_STATE: &str = "serviceProviderClusters";
pub const TYPE_MANAGEMENT_CONTENT: &str = "managementClusterContents";

/// Capability shared by all queue keys.
pub trait ResourceKey:
    Clone + Eq + Hash + Debug + Display + Send + Sync + 'static
{
    /// The fully qualified id of the resource this key addresses.
    fn resource_id(&self) -> ResourceId;

    /// The subscription the resource lives under.
    fn subscription_id(&self) -> &str;

    /// A zero-valued controller record under this resource, used when a
    /// controller observes the resource for the first time.
    fn controller_record(&self, controller_name: &str) -> ControllerDocument {
        ControllerDocument::zero(&self.resource_id(), controller_name)
    }

    /// Whether the operation-aware cooldown should treat this key as having
    /// in-flight work without consulting the operation lister. Operation
    /// keys are always treated as active.
    fn always_active(&self) -> bool {
        false
    }
}

/// Key of an Azure subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub subscription_id: String,
}

impl SubscriptionKey {
    #[must_use]
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }
}

impl ResourceKey for SubscriptionKey {
    fn resource_id(&self) -> ResourceId {
        render(&format!("/subscriptions/{}", self.subscription_id))
    }

    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }
}

impl Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)
    }
}

/// Key of a hosted control-plane cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl ClusterKey {
    #[must_use]
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// Recovers the key from a cluster resource id, if it is one.
    #[must_use]
    pub fn from_resource_id(id: &ResourceId) -> Option<Self> {
        if !id.resource_type().eq_ignore_ascii_case(TYPE_CLUSTERS) {
            return None;
        }
        Some(Self::new(id.subscription_id(), id.resource_group()?, id.name()))
    }

    /// Id of the billing status document for this cluster. Billing documents
    /// are siblings of the cluster, not children, so the deletion timestamp
    /// stamped during teardown survives the cluster's cascade delete.
    #[must_use]
    pub fn billing_id(&self) -> ResourceId {
        render(&format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id, self.resource_group, PROVIDER_NAMESPACE, TYPE_BILLING, self.name
        ))
    }

    /// Id of the service-provider state document tracking desired/active
    /// versions for this cluster.
    #[must_use]
    pub fn provider_state_id(&self) -> ResourceId {
        self.resource_id().child(TYPE_PROVIDER_STATE, "current")
    }
}

impl ResourceKey for ClusterKey {
    fn resource_id(&self) -> ResourceId {
        render(&format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id, self.resource_group, PROVIDER_NAMESPACE, TYPE_CLUSTERS, self.name
        ))
    }

    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }
}

impl Display for ClusterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.resource_id(), f)
    }
}

/// Key of a node pool under a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePoolKey {
    pub cluster: ClusterKey,
    pub name: String,
}

impl NodePoolKey {
    #[must_use]
    pub fn new(cluster: ClusterKey, name: impl Into<String>) -> Self {
        Self {
            cluster,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn from_resource_id(id: &ResourceId) -> Option<Self> {
        if !id.resource_type().eq_ignore_ascii_case(TYPE_NODE_POOLS) {
            return None;
        }
        let cluster = ClusterKey::from_resource_id(&id.parent()?)?;
        Some(Self::new(cluster, id.name()))
    }
}

impl ResourceKey for NodePoolKey {
    fn resource_id(&self) -> ResourceId {
        self.cluster.resource_id().child(TYPE_NODE_POOLS, &self.name)
    }

    fn subscription_id(&self) -> &str {
        &self.cluster.subscription_id
    }
}

impl Display for NodePoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.resource_id(), f)
    }
}

/// Key of an external authentication configuration under a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalAuthKey {
    pub cluster: ClusterKey,
    pub name: String,
}

impl ExternalAuthKey {
    #[must_use]
    pub fn new(cluster: ClusterKey, name: impl Into<String>) -> Self {
        Self {
            cluster,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn from_resource_id(id: &ResourceId) -> Option<Self> {
        if !id.resource_type().eq_ignore_ascii_case(TYPE_EXTERNAL_AUTHS) {
            return None;
        }
        let cluster = ClusterKey::from_resource_id(&id.parent()?)?;
        Some(Self::new(cluster, id.name()))
    }
}

impl ResourceKey for ExternalAuthKey {
    fn resource_id(&self) -> ResourceId {
        self.cluster
            .resource_id()
            .child(TYPE_EXTERNAL_AUTHS, &self.name)
    }

    fn subscription_id(&self) -> &str {
        &self.cluster.subscription_id
    }
}

impl Display for ExternalAuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.resource_id(), f)
    }
}

/// Key of an asynchronous operation document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub subscription_id: String,
    pub name: String,
}

impl OperationKey {
    #[must_use]
    pub fn new(subscription_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn from_resource_id(id: &ResourceId) -> Option<Self> {
        if !id.resource_type().eq_ignore_ascii_case(TYPE_OPERATIONS) {
            return None;
        }
        Some(Self::new(id.subscription_id(), id.name()))
    }
}

impl ResourceKey for OperationKey {
    fn resource_id(&self) -> ResourceId {
        render(&format!(
            "/subscriptions/{}/providers/{}/{}/{}",
            self.subscription_id, PROVIDER_NAMESPACE, TYPE_OPERATIONS, self.name
        ))
    }

    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn always_active(&self) -> bool {
        true
    }
}

impl Display for OperationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.resource_id(), f)
    }
}

/// Key fields come from already-parsed resource ids or provider constants,
/// so rendering them back into an id cannot fail.
fn render(raw: &str) -> ResourceId {
    match raw.parse() {
        Ok(id) => id,
        Err(_) => unreachable!("key segments are pre-validated: {raw}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_key() -> ClusterKey {
        ClusterKey::new("sub1", "rg1", "cluster1")
    }

    #[test]
    fn cluster_id_rendering() {
        assert_eq!(
            cluster_key().resource_id().to_string(),
            "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/cluster1"
        );
    }

    #[test]
    fn cluster_key_roundtrips_through_id() {
        let id = cluster_key().resource_id();
        assert_eq!(ClusterKey::from_resource_id(&id), Some(cluster_key()));
        let np = NodePoolKey::new(cluster_key(), "pool1");
        assert_eq!(NodePoolKey::from_resource_id(&np.resource_id()), Some(np));
        let op = OperationKey::new("sub1", "op1");
        assert_eq!(OperationKey::from_resource_id(&op.resource_id()), Some(op));
    }

    #[test]
    fn from_resource_id_rejects_other_types() {
        let id = cluster_key().resource_id();
        assert!(NodePoolKey::from_resource_id(&id).is_none());
        assert!(OperationKey::from_resource_id(&id).is_none());
    }

    #[test]
    fn billing_id_is_a_sibling_of_the_cluster() {
        let key = cluster_key();
        let billing = key.billing_id();
        assert!(!billing.is_descendant_of(&key.resource_id()));
        assert_eq!(billing.subscription_id(), "sub1");
        assert_eq!(billing.resource_type(), TYPE_BILLING);
    }

    #[test]
    fn provider_state_is_a_descendant_of_the_cluster() {
        let key = cluster_key();
        assert!(key.provider_state_id().is_descendant_of(&key.resource_id()));
    }

    #[test]
    fn controller_record_location() {
        let record = cluster_key().controller_record("clusterDrift");
        assert_eq!(record.controller_name, "clusterDrift");
        assert_eq!(record.id.parent().unwrap(), cluster_key().resource_id());
        assert!(record.conditions.is_empty());
    }

    #[test]
    fn only_operation_keys_are_always_active() {
        assert!(OperationKey::new("sub1", "op1").always_active());
        assert!(!cluster_key().always_active());
        assert!(!SubscriptionKey::new("sub1").always_active());
    }
}
