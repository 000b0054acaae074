//! Typed interface to the OCM cluster service.
//!
//! The production transport lives elsewhere; reconcilers consume this trait
//! and check error categories by status code.

mod types;

pub use types::{
    BreakGlassCredential, CredentialStatus, CsCluster, CsClusterState, CsExternalAuth,
    CsNodePool, CsNodePoolState, InflightCheck, ProvisionError, UpgradePolicy,
};

use crate::BoxError;
use async_trait::async_trait;
use http::StatusCode;
use semver::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcmError {
    #[error("cluster service returned {status}: {message}")]
    Response { status: StatusCode, message: String },
    #[error("cluster service transport failure")]
    Transport(#[source] BoxError),
}

impl OcmError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Response {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Read/write operations on the cluster service's view of the world.
///
/// Objects are addressed by their internal id (href) as recorded on the
/// corresponding documents.
#[async_trait]
pub trait ClusterService: Send + Sync + 'static {
    async fn get_cluster(&self, internal_id: &str) -> Result<CsCluster, OcmError>;

    async fn get_node_pool(&self, internal_id: &str) -> Result<CsNodePool, OcmError>;

    async fn list_node_pools(&self, cluster_internal_id: &str)
        -> Result<Vec<CsNodePool>, OcmError>;

    async fn get_external_auth(&self, internal_id: &str) -> Result<CsExternalAuth, OcmError>;

    async fn list_external_auths(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<CsExternalAuth>, OcmError>;

    async fn get_break_glass_credential(
        &self,
        cluster_internal_id: &str,
        credential_id: &str,
    ) -> Result<BreakGlassCredential, OcmError>;

    async fn list_break_glass_credentials(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<BreakGlassCredential>, OcmError>;

    /// Existing upgrade policies for a cluster, newest first.
    async fn list_upgrade_policies(
        &self,
        cluster_internal_id: &str,
    ) -> Result<Vec<UpgradePolicy>, OcmError>;

    async fn create_upgrade_policy(
        &self,
        cluster_internal_id: &str,
        version: &Version,
    ) -> Result<UpgradePolicy, OcmError>;
}
