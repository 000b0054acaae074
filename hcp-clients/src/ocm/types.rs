//! Domain objects returned by the cluster service.

use chrono::{DateTime, Utc};
use semver::Version;

/// Lifecycle state of a remote cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsClusterState {
    Error,
    Installing,
    Pending,
    Ready,
    Uninstalling,
    Updating,
    Validating,
    /// A state this build does not know about yet.
    Other(String),
}

/// Lifecycle state of a remote node pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsNodePoolState {
    Validating,
    Pending,
    Installing,
    Ready,
    Updating,
    Uninstalling,
    RecoverableError,
    Error,
    Other(String),
}

/// Structured provisioning failure reported by the cluster service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionError {
    pub code: String,
    pub message: String,
}

/// One in-flight provisioning check; failures feed the multi-error
/// expansion of provision error code `OCM4001`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflightCheck {
    pub name: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsCluster {
    /// The internal id (href) documents refer to.
    pub id: String,
    pub name: String,
    pub state: CsClusterState,
    /// The version currently running, if reported.
    pub current_version: Option<Version>,
    pub provision_error: Option<ProvisionError>,
    pub inflight_checks: Vec<InflightCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsNodePool {
    pub id: String,
    pub name: String,
    pub state: CsNodePoolState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsExternalAuth {
    pub id: String,
    pub name: String,
}

/// Issuance state of a break-glass credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Created,
    Issued,
    AwaitingRevocation,
    Revoked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakGlassCredential {
    pub id: String,
    pub status: CredentialStatus,
    pub expiration: DateTime<Utc>,
}

impl BreakGlassCredential {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePolicy {
    pub id: String,
    pub version: Version,
    pub creation_time: DateTime<Utc>,
}
