//! Lifecycle state enums shared across documents and reconcilers.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// ARM-shaped lifecycle state of a resource or operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Provisioning,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
}

impl ProvisioningState {
    /// Terminal states are sticky: once an operation reaches one, its
    /// document is updated at most once more, to clear the notification URI.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "Accepted",
            Self::Provisioning => "Provisioning",
            Self::Updating => "Updating",
            Self::Deleting => "Deleting",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}

/// The kind of asynchronous request an operation document tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationRequest {
    Create,
    Update,
    Delete,
    RequestCredential,
    RevokeCredentials,
}

/// Registration state of an Azure subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionState {
    Registered,
    Warned,
    Suspended,
    Deleted,
}

impl SubscriptionState {
    /// Only Registered/Warned subscriptions are walked by periodic list loops.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Registered | Self::Warned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ProvisioningState::Succeeded.is_terminal());
        assert!(ProvisioningState::Failed.is_terminal());
        assert!(ProvisioningState::Canceled.is_terminal());
        assert!(!ProvisioningState::Deleting.is_terminal());
        assert!(!ProvisioningState::Accepted.is_terminal());
    }

    #[test]
    fn request_kind_wire_form() {
        let json = serde_json::to_string(&OperationRequest::RequestCredential).unwrap();
        assert_eq!(json, "\"requestCredential\"");
    }

    #[test]
    fn active_subscription_states() {
        assert!(SubscriptionState::Registered.is_active());
        assert!(SubscriptionState::Warned.is_active());
        assert!(!SubscriptionState::Suspended.is_active());
        assert!(!SubscriptionState::Deleted.is_active());
    }
}
