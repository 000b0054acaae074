//! Version selection and actuation for control-plane upgrades.
//!
//! [`selector`] is the pure decision procedure over the update graph;
//! [`cache`] holds the per-cluster graph clients it consults;
//! [`VersionSyncer`] keeps the service-provider version state current and
//! persists decisions; [`UpgradePolicySyncer`] turns a persisted decision
//! into a remote upgrade policy.

mod cache;
mod selector;
mod syncer;
mod trigger;

pub use cache::GraphClientCache;
pub use selector::{select_next_version, SelectError};
pub use syncer::VersionSyncer;
pub use trigger::UpgradePolicySyncer;
