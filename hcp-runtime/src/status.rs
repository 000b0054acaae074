//! Per-controller status reporting.
//!
//! After every sync attempt the controller loop records its current
//! degradation condition on the resource it touched, exactly once, without
//! retry: a failed write leaves the resource in a state that will trigger
//! another reconcile anyway, and retrying here could re-create a record
//! under a parent that a parallel reconcile just deleted.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use hcp_clients::store::{Docs, StoreBackend, StoreError};
use hcp_core::documents::ControllerDocument;
use hcp_core::{Condition, ConditionStatus, ResourceKey};
use std::sync::Arc;
use tracing::debug;

pub const CONDITION_DEGRADED: &str = "Degraded";
pub const REASON_NO_ERRORS: &str = "NoErrors";
pub const REASON_SYNC_ERROR: &str = "SyncError";

/// An edit applied to the controller record before it is written. The
/// second argument is the wall-clock time of this write.
pub type Mutation = Box<dyn FnOnce(&mut ControllerDocument, DateTime<Utc>) + Send>;

/// Replaces the condition with `incoming`'s type in place, or appends it,
/// keeping at most one condition per type. The last-transition time is
/// preserved when the status did not change.
pub fn set_condition(conditions: &mut Vec<Condition>, incoming: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == incoming.type_) {
        Some(existing) => {
            let unchanged = existing.status == incoming.status;
            let previous_transition = existing.last_transition_time;
            *existing = incoming;
            if unchanged {
                existing.last_transition_time = previous_transition;
            }
        }
        None => conditions.push(incoming),
    }
}

/// The degradation condition mutation for one sync outcome.
#[must_use]
pub fn degraded_mutation(error: Option<String>) -> Mutation {
    Box::new(move |record, now| {
        let condition = match error {
            Some(message) => Condition::new(
                CONDITION_DEGRADED,
                ConditionStatus::True,
                REASON_SYNC_ERROR,
                message,
                now,
            ),
            None => Condition::new(
                CONDITION_DEGRADED,
                ConditionStatus::False,
                REASON_NO_ERRORS,
                "sync succeeded",
                now,
            ),
        };
        set_condition(&mut record.conditions, condition);
    })
}

/// Structural equality that disregards last-transition times for conditions
/// whose status matches, so refreshed-but-unchanged conditions do not force
/// a write.
#[must_use]
pub fn conditions_equivalent(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len()
        && a.iter().all(|ca| {
            b.iter().any(|cb| {
                ca.type_ == cb.type_
                    && ca.status == cb.status
                    && ca.reason == cb.reason
                    && ca.message == cb.message
            })
        })
}

#[must_use]
pub fn records_equivalent(a: &ControllerDocument, b: &ControllerDocument) -> bool {
    a.id == b.id
        && a.controller_name == b.controller_name
        && conditions_equivalent(&a.conditions, &b.conditions)
}

/// Writes controller records with a single read-modify-write cycle.
#[derive(Clone)]
pub struct StatusWriter {
    records: Docs<ControllerDocument>,
    clock: Arc<dyn Clock>,
}

impl StatusWriter {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Docs::new(backend),
            clock,
        }
    }

    /// Reads the controller record under `key` (constructing the zero
    /// record on first observation), applies `mutations` in order, and
    /// writes the result back unless it is equivalent to what is stored.
    ///
    /// Conflicts are **not** retried; the enclosing reconcile loop is the
    /// single retry authority.
    pub async fn write_controller<K: ResourceKey>(
        &self,
        key: &K,
        controller_name: &str,
        mutations: Vec<Mutation>,
    ) -> Result<(), StoreError> {
        let zero = key.controller_record(controller_name);
        let existing = self.records.try_get(&zero.id).await?;

        let mut desired = existing.clone().unwrap_or(zero);
        let now = self.clock.now();
        for mutation in mutations {
            mutation(&mut desired, now);
        }

        match existing {
            Some(existing) if records_equivalent(&existing, &desired) => {
                debug!(key = %key, controller = controller_name, "controller record unchanged");
                Ok(())
            }
            Some(_) => self.records.replace(&desired).await,
            None => self.records.create(&desired).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use hcp_clients::store::MemoryStore;
    use hcp_core::ClusterKey;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn set_condition_appends_and_replaces_in_place() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            Condition::new("Degraded", ConditionStatus::False, "NoErrors", "ok", ts("2026-03-01T00:00:00Z")),
        );
        set_condition(
            &mut conditions,
            Condition::new("Available", ConditionStatus::True, "Ready", "up", ts("2026-03-01T00:00:00Z")),
        );
        set_condition(
            &mut conditions,
            Condition::new("Degraded", ConditionStatus::True, "SyncError", "boom", ts("2026-03-01T00:05:00Z")),
        );
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].type_, "Degraded");
        assert_eq!(conditions[0].status, ConditionStatus::True);
    }

    #[test]
    fn transition_time_moves_only_with_status() {
        let mut conditions = vec![Condition::new(
            "Degraded",
            ConditionStatus::False,
            "NoErrors",
            "ok",
            ts("2026-03-01T00:00:00Z"),
        )];
        // Same status, new reason: timestamp preserved.
        set_condition(
            &mut conditions,
            Condition::new("Degraded", ConditionStatus::False, "Settled", "ok", ts("2026-03-01T01:00:00Z")),
        );
        assert_eq!(conditions[0].reason, "Settled");
        assert_eq!(conditions[0].last_transition_time, ts("2026-03-01T00:00:00Z"));
        // Status flip: timestamp moves.
        set_condition(
            &mut conditions,
            Condition::new("Degraded", ConditionStatus::True, "SyncError", "boom", ts("2026-03-01T02:00:00Z")),
        );
        assert_eq!(conditions[0].last_transition_time, ts("2026-03-01T02:00:00Z"));
    }

    #[test]
    fn equivalence_ignores_transition_times() {
        let a = vec![Condition::new("Degraded", ConditionStatus::False, "NoErrors", "ok", ts("2026-03-01T00:00:00Z"))];
        let b = vec![Condition::new("Degraded", ConditionStatus::False, "NoErrors", "ok", ts("2026-06-01T00:00:00Z"))];
        assert!(conditions_equivalent(&a, &b));

        let c = vec![Condition::new("Degraded", ConditionStatus::True, "SyncError", "ok", ts("2026-03-01T00:00:00Z"))];
        assert!(!conditions_equivalent(&a, &c));
        assert!(!conditions_equivalent(&a, &[]));
    }

    fn writer(store: &Arc<MemoryStore>, clock: &ManualClock) -> StatusWriter {
        StatusWriter::new(
            Arc::clone(store) as Arc<dyn StoreBackend>,
            Arc::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn first_observation_creates_the_record() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(ts("2026-03-01T00:00:00Z"));
        let writer = writer(&store, &clock);
        let key = ClusterKey::new("sub1", "rg1", "c1");

        writer
            .write_controller(&key, "clusterDrift", vec![degraded_mutation(None)])
            .await
            .unwrap();

        let records = Docs::<ControllerDocument>::new(Arc::clone(&store) as Arc<dyn StoreBackend>);
        let record = records.get(&key.controller_record("clusterDrift").id).await.unwrap();
        assert_eq!(record.controller_name, "clusterDrift");
        assert_eq!(record.conditions.len(), 1);
        assert_eq!(record.conditions[0].status, ConditionStatus::False);
        assert_eq!(record.conditions[0].reason, REASON_NO_ERRORS);
    }

    #[tokio::test]
    async fn unchanged_outcome_issues_no_write() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(ts("2026-03-01T00:00:00Z"));
        let writer = writer(&store, &clock);
        let key = ClusterKey::new("sub1", "rg1", "c1");

        writer
            .write_controller(&key, "clusterDrift", vec![degraded_mutation(None)])
            .await
            .unwrap();
        let records = Docs::<ControllerDocument>::new(Arc::clone(&store) as Arc<dyn StoreBackend>);
        let first = records.get(&key.controller_record("clusterDrift").id).await.unwrap();

        // A later identical outcome: lastTransitionTime preserved exactly.
        clock.advance(chrono::Duration::hours(1));
        writer
            .write_controller(&key, "clusterDrift", vec![degraded_mutation(None)])
            .await
            .unwrap();
        let second = records.get(&key.controller_record("clusterDrift").id).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(second.conditions[0].last_transition_time, ts("2026-03-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn status_flip_rewrites_and_restamps() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(ts("2026-03-01T00:00:00Z"));
        let writer = writer(&store, &clock);
        let key = ClusterKey::new("sub1", "rg1", "c1");

        writer
            .write_controller(&key, "clusterDrift", vec![degraded_mutation(None)])
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(5));
        writer
            .write_controller(
                &key,
                "clusterDrift",
                vec![degraded_mutation(Some("remote lookup failed".into()))],
            )
            .await
            .unwrap();

        let records = Docs::<ControllerDocument>::new(Arc::clone(&store) as Arc<dyn StoreBackend>);
        let record = records.get(&key.controller_record("clusterDrift").id).await.unwrap();
        assert_eq!(record.conditions[0].status, ConditionStatus::True);
        assert_eq!(record.conditions[0].reason, REASON_SYNC_ERROR);
        assert_eq!(record.conditions[0].last_transition_time, ts("2026-03-01T00:05:00Z"));
    }

    #[tokio::test]
    async fn mutations_apply_in_order() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(ts("2026-03-01T00:00:00Z"));
        let writer = writer(&store, &clock);
        let key = ClusterKey::new("sub1", "rg1", "c1");

        writer
            .write_controller(
                &key,
                "clusterDrift",
                vec![
                    degraded_mutation(Some("first".into())),
                    degraded_mutation(None),
                ],
            )
            .await
            .unwrap();

        let records = Docs::<ControllerDocument>::new(Arc::clone(&store) as Arc<dyn StoreBackend>);
        let record = records.get(&key.controller_record("clusterDrift").id).await.unwrap();
        assert_eq!(record.conditions.len(), 1);
        assert_eq!(record.conditions[0].status, ConditionStatus::False);
    }
}
