//! Reconciliation runtime for the HCP backend.
//!
//! The runtime drives each tracked resource from its recorded state toward
//! its desired state: informers turn list snapshots or change feeds into
//! events, cooldowns throttle per-key enqueueing, a de-duplicating
//! rate-limited work queue feeds a pool of workers, and every sync attempt
//! leaves an up-to-date controller condition on the resource it touched.
//!
//! Reconcilers supply a [`Syncer`]; everything else here is generic over the
//! key type.

pub mod clock;
pub mod controller;
pub mod cooldown;
pub mod informer;
pub mod queue;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Controller, KeyEnumerator, ReconcileError, Syncer};
pub use cooldown::{ActiveOperationLister, Cooldown, OperationAwareCooldown, TimeCooldown};
pub use informer::{EventHandler, Informer, PollInformer, PushInformer, ResourceEvent, SourceEvent};
pub use queue::WorkQueue;
pub use status::StatusWriter;

pub use hcp_clients::BoxError;
