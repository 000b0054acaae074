//! Client interface to the Cincinnati-style update-graph service.

use crate::BoxError;
use async_trait::async_trait;
use semver::Version;
use thiserror::Error;

/// One release node in the update graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: Version,
    /// Release payload image, when the graph reports one.
    pub image: Option<String>,
}

impl Release {
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self { version, image: None }
    }
}

/// An update edge that is only recommended under conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalUpdate {
    pub release: Release,
    pub risks: Vec<String>,
}

/// The reachable updates from one version in one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGraph {
    pub from: Release,
    pub candidates: Vec<Release>,
    pub conditional: Vec<ConditionalUpdate>,
}

#[derive(Debug, Error)]
pub enum GraphError {
    /// The channel does not exist, or the version is not a node in it. This
    /// is a sentinel the upgrade selector branches on, not a failure.
    #[error("version {version} not found in channel {channel}")]
    VersionNotFound { channel: String, version: Version },
    #[error("update service transport failure")]
    Transport(#[source] BoxError),
}

impl GraphError {
    #[must_use]
    pub fn is_version_not_found(&self) -> bool {
        matches!(self, Self::VersionNotFound { .. })
    }
}

/// Queries update recommendations for one cluster.
///
/// Implementations carry the per-cluster identity the graph service uses for
/// weighted rollout decisions, which is why clients are cached per cluster
/// rather than shared.
#[async_trait]
pub trait UpdateGraphClient: Send + Sync + 'static {
    async fn get_updates(&self, channel: &str, from: &Version) -> Result<UpdateGraph, GraphError>;
}
