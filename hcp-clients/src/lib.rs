//! Interfaces to the systems the HCP backend collaborates with.
//!
//! The reconciliation core consumes these as traits: the document store
//! ([`store`]), the OCM cluster service ([`ocm`]), the Cincinnati-style
//! update-graph service ([`graph`]), and the async-notification endpoint
//! ([`notify`]). Production transports live behind the traits; the in-memory
//! store backend here is the test double used across the workspace.

pub mod graph;
pub mod notify;
pub mod ocm;
pub mod store;

/// Boxed error for transport failures surfaced through client traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
