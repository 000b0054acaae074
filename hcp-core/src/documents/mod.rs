//! Typed documents persisted in the document store.
//!
//! Every document carries its fully qualified [`ResourceId`] as the primary
//! key; the store addresses documents by that id alone. Kind-specific bodies
//! live on the individual structs.

mod cluster;
mod operation;

pub use cluster::{
    BillingDocument, ClusterDocument, ExternalAuthDocument, ManagementClusterDocument,
    NodePoolDocument, ServiceProviderClusterDocument, MAX_ACTIVE_VERSIONS,
};
pub use operation::OperationDocument;

use crate::conditions::Condition;
use crate::keys::{SubscriptionKey, TYPE_CONTROLLERS};
use crate::resource_id::ResourceId;
use crate::state::{ProvisioningState, SubscriptionState};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A persisted document kind.
pub trait Document:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// The type keyword under which documents of this kind are filed,
    /// e.g. `hcpOpenShiftClusters`.
    const KIND: &'static str;

    /// The document's primary key.
    fn id(&self) -> &ResourceId;
}

/// A document tracking an ARM resource whose mutations happen through
/// asynchronous operations.
pub trait ProvisionedResource: Document {
    fn provisioning_state(&self) -> ProvisioningState;
    fn set_provisioning_state(&mut self, state: ProvisioningState);

    /// Id of the operation currently mutating this resource, if any. It
    /// matches the in-flight operation's id until that operation reaches a
    /// terminal state, at which point it is cleared.
    fn active_operation_id(&self) -> Option<&ResourceId>;
    fn set_active_operation_id(&mut self, id: Option<ResourceId>);
}

/// Registration record of an Azure subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDocument {
    pub id: ResourceId,
    pub state: SubscriptionState,
}

impl SubscriptionDocument {
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.id.subscription_id())
    }
}

impl Document for SubscriptionDocument {
    const KIND: &'static str = "subscriptions";

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Per-(resource, controller) record carrying the controller's latest
/// degradation condition. Lives as a child document under the resource the
/// controller operates on; exists iff the controller has observed the
/// resource at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerDocument {
    pub id: ResourceId,
    pub controller_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ControllerDocument {
    /// The zero-valued record for `controller_name` under `resource`.
    #[must_use]
    pub fn zero(resource: &ResourceId, controller_name: &str) -> Self {
        Self {
            id: resource.child(TYPE_CONTROLLERS, controller_name),
            controller_name: controller_name.to_owned(),
            conditions: Vec::new(),
        }
    }

    /// The resource this record reports on.
    #[must_use]
    pub fn parent_resource(&self) -> Option<ResourceId> {
        self.id.parent()
    }
}

impl Document for ControllerDocument {
    const KIND: &'static str = TYPE_CONTROLLERS;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}
