//! Core data model for the HCP backend.
//!
//! Everything in this crate is a plain value type: ARM resource ids, the
//! typed keys that flow through the controller runtime's work queues, the
//! documents persisted in the document store, and the condition/state enums
//! shared by every reconciler. No I/O happens here.

pub mod cloud_error;
pub mod conditions;
pub mod documents;
pub mod keys;
pub mod resource_id;
pub mod state;
pub mod version;

pub use cloud_error::CloudError;
pub use conditions::{Condition, ConditionStatus};
pub use documents::Document;
pub use keys::{
    ClusterKey, ExternalAuthKey, NodePoolKey, OperationKey, ResourceKey, SubscriptionKey,
};
pub use resource_id::ResourceId;
pub use state::{OperationRequest, ProvisioningState, SubscriptionState};
pub use version::MinorVersion;
