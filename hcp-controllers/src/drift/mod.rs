//! Drift reconciliation between the document store and the cluster service.
//!
//! The store is authoritative for what the customer asked for; the cluster
//! service is authoritative for what exists. When the remote side loses a
//! resource, the local hierarchy is finalised and cascade-deleted. Remote
//! objects with no local document are only reported — creating documents is
//! the frontend's job.

mod children;
mod cluster;
mod orphans;

pub use children::{ChildDriftSyncer, ExternalAuthDriftSyncer, NodePoolDriftSyncer, RemoteChild};
pub use cluster::ClusterDriftSyncer;
pub use orphans::OrphanControllerSweep;
