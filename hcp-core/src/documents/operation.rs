//! Asynchronous operation documents.

use super::Document;
use crate::cloud_error::CloudError;
use crate::keys::{OperationKey, ResourceKey, TYPE_OPERATIONS};
use crate::resource_id::ResourceId;
use crate::state::{OperationRequest, ProvisioningState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One in-flight asynchronous request against an external resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDocument {
    pub id: ResourceId,
    /// The ARM resource the request mutates.
    pub external_id: ResourceId,
    /// Denormalized partition key.
    pub subscription_id: String,
    pub request: OperationRequest,
    pub state: ProvisioningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudError>,
    pub last_transition_time: DateTime<Utc>,
    /// Remote-system identifier of the object the request created or
    /// targets (cluster-service href, credential id, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    /// Where to POST the completion payload, cleared after the first
    /// accepted delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_uri: Option<String>,
}

impl OperationDocument {
    #[must_use]
    pub fn new(
        key: &OperationKey,
        external_id: ResourceId,
        request: OperationRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: key.resource_id(),
            external_id,
            subscription_id: key.subscription_id.clone(),
            request,
            state: ProvisioningState::Accepted,
            error: None,
            last_transition_time: now,
            internal_id: None,
            notification_uri: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> OperationKey {
        OperationKey::new(&*self.subscription_id, self.id.name())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// A terminal notification that has not been delivered yet.
    #[must_use]
    pub fn notification_pending(&self) -> bool {
        self.is_terminal() && self.notification_uri.is_some()
    }
}

impl Document for OperationDocument {
    const KIND: &'static str = TYPE_OPERATIONS;

    fn id(&self) -> &ResourceId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ClusterKey;

    fn doc() -> OperationDocument {
        OperationDocument::new(
            &OperationKey::new("sub1", "op1"),
            ClusterKey::new("sub1", "rg1", "c1").resource_id(),
            OperationRequest::Create,
            Utc::now(),
        )
    }

    #[test]
    fn key_roundtrip() {
        let op = doc();
        assert_eq!(op.key(), OperationKey::new("sub1", "op1"));
        assert_eq!(op.id, op.key().resource_id());
    }

    #[test]
    fn notification_pending_requires_terminal_and_uri() {
        let mut op = doc();
        assert!(!op.notification_pending());
        op.notification_uri = Some("https://example.test/cb".to_owned());
        assert!(!op.notification_pending());
        op.state = ProvisioningState::Succeeded;
        assert!(op.notification_pending());
        op.notification_uri = None;
        assert!(!op.notification_pending());
    }
}
