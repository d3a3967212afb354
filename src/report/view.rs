use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;

use super::{DateRange, ReportKind, ReportRows};
use crate::telemetry::metrics::REPORT_STALE_DROPPED;

type ViewKey = (String, ReportKind);

/// Proof that a query was started; only the latest ticket of a view may
/// commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    owner: String,
    kind: ReportKind,
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The row set currently backing a view and its exports.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub rows: ReportRows,
    pub range: Option<DateRange>,
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ViewState {
    issued: u64,
    current: Option<Arc<Snapshot>>,
    touched: Instant,
}

/// Current row set per `(owner, kind)`, with last-request-wins semantics.
///
/// Views untouched for longer than the idle TTL are dropped on the next
/// `begin`.
#[derive(Debug)]
pub struct ViewRegistry {
    views: Mutex<HashMap<ViewKey, ViewState>>,
    idle_ttl: Duration,
}

impl ViewRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            views: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ViewKey, ViewState>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self, owner: &str, kind: ReportKind) -> Ticket {
        let now = Instant::now();
        let mut views = self.lock();

        let before = views.len();
        views.retain(|_, state| now.duration_since(state.touched) < self.idle_ttl);
        if views.len() < before {
            tracing::debug!(expired = before - views.len(), "Expired idle report views");
        }

        let state = views
            .entry((owner.to_string(), kind))
            .or_insert_with(|| ViewState {
                issued: 0,
                current: None,
                touched: now,
            });
        state.issued += 1;
        state.touched = now;

        Ticket {
            owner: owner.to_string(),
            kind,
            generation: state.issued,
        }
    }

    /// Stores the rows unless a newer query was begun for the same view
    /// since `ticket` was issued. Returns the stored snapshot.
    pub fn commit(
        &self,
        ticket: Ticket,
        rows: ReportRows,
        range: Option<DateRange>,
        fetched_at: DateTime<Utc>,
    ) -> Option<Arc<Snapshot>> {
        let mut views = self.lock();
        let latest = views
            .get(&(ticket.owner.clone(), ticket.kind))
            .map(|state| state.issued);

        if latest != Some(ticket.generation) {
            tracing::info!(
                report.kind = %ticket.kind,
                generation = ticket.generation,
                latest = latest.unwrap_or_default(),
                "Dropping superseded report response"
            );
            REPORT_STALE_DROPPED.add(1, &[KeyValue::new("report.kind", ticket.kind.slug())]);
            return None;
        }

        let state = views.get_mut(&(ticket.owner, ticket.kind))?;
        let snapshot = Arc::new(Snapshot {
            rows,
            range,
            generation: ticket.generation,
            fetched_at,
        });
        state.current = Some(Arc::clone(&snapshot));
        state.touched = Instant::now();
        Some(snapshot)
    }

    /// Releases a ticket whose query failed. A view that never held rows is
    /// forgotten; one with rows keeps them.
    pub fn abandon(&self, ticket: &Ticket) {
        let mut views = self.lock();
        let key = (ticket.owner.clone(), ticket.kind);
        let forget = views
            .get(&key)
            .is_some_and(|state| state.issued == ticket.generation && state.current.is_none());
        if forget {
            views.remove(&key);
        }
    }

    pub fn current(&self, owner: &str, kind: ReportKind) -> Option<Arc<Snapshot>> {
        let mut views = self.lock();
        let state = views.get_mut(&(owner.to_string(), kind))?;
        state.touched = Instant::now();
        state.current.clone()
    }

    /// Drops every view of `owner`, in-flight tickets included. Returns how
    /// many views were removed.
    pub fn clear_owner(&self, owner: &str) -> usize {
        let mut views = self.lock();
        let before = views.len();
        views.retain(|(view_owner, _), _| view_owner != owner);
        before - views.len()
    }

    pub fn view_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::rows::fixtures::cost_rows;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_commit_then_current() {
        let registry = ViewRegistry::new(HOUR);
        let ticket = registry.begin("tok", ReportKind::VehicleCost);
        assert_eq!(ticket.generation(), 1);

        let stored = registry
            .commit(ticket, cost_rows(2), None, Utc::now())
            .unwrap();
        assert_eq!(stored.generation, 1);

        let current = registry.current("tok", ReportKind::VehicleCost).unwrap();
        assert_eq!(current.rows.len(), 2);
        assert!(registry.current("tok", ReportKind::FuelConsumption).is_none());
        assert!(registry.current("other", ReportKind::VehicleCost).is_none());
    }

    #[test]
    fn test_superseded_response_is_dropped() {
        let registry = ViewRegistry::new(HOUR);
        let first = registry.begin("tok", ReportKind::VehicleCost);
        let second = registry.begin("tok", ReportKind::VehicleCost);

        // Newer query lands first.
        assert!(registry
            .commit(second, cost_rows(3), None, Utc::now())
            .is_some());
        // Older one arrives late.
        assert!(registry
            .commit(first, cost_rows(1), None, Utc::now())
            .is_none());

        let current = registry.current("tok", ReportKind::VehicleCost).unwrap();
        assert_eq!(current.rows.len(), 3);
        assert_eq!(current.generation, 2);
    }

    #[test]
    fn test_failed_query_leaves_snapshot_untouched() {
        let registry = ViewRegistry::new(HOUR);
        let ticket = registry.begin("tok", ReportKind::VehicleCost);
        registry.commit(ticket, cost_rows(2), None, Utc::now());

        let failed = registry.begin("tok", ReportKind::VehicleCost);
        registry.abandon(&failed);

        let current = registry.current("tok", ReportKind::VehicleCost).unwrap();
        assert_eq!(current.rows.len(), 2);
        assert_eq!(current.generation, 1);
        assert_eq!(registry.view_count(), 1);
    }

    #[test]
    fn test_failed_queries_leave_no_entries() {
        let registry = ViewRegistry::new(HOUR);
        for i in 0..50 {
            let ticket = registry.begin(&format!("random-{i}"), ReportKind::VehicleCost);
            registry.abandon(&ticket);
        }
        assert_eq!(registry.view_count(), 0);
    }

    #[test]
    fn test_abandon_keeps_newer_in_flight_ticket() {
        let registry = ViewRegistry::new(HOUR);
        let older = registry.begin("tok", ReportKind::VehicleCost);
        let newer = registry.begin("tok", ReportKind::VehicleCost);

        registry.abandon(&older);
        assert_eq!(registry.view_count(), 1);
        assert!(registry.commit(newer, cost_rows(1), None, Utc::now()).is_some());
    }

    #[test]
    fn test_clear_owner_drops_only_that_owner() {
        let registry = ViewRegistry::new(HOUR);
        for kind in [ReportKind::VehicleCost, ReportKind::FuelConsumption] {
            let ticket = registry.begin("alice", kind);
            registry.commit(ticket, cost_rows(1), None, Utc::now());
        }
        let bob = registry.begin("bob", ReportKind::VehicleCost);
        registry.commit(bob, cost_rows(2), None, Utc::now());
        let in_flight = registry.begin("alice", ReportKind::TopMaintenance);

        assert_eq!(registry.clear_owner("alice"), 3);
        assert_eq!(registry.view_count(), 1);
        assert!(registry.current("alice", ReportKind::VehicleCost).is_none());
        assert!(registry.current("bob", ReportKind::VehicleCost).is_some());

        // A response that lands after the owner left is not stored.
        assert!(registry
            .commit(in_flight, cost_rows(1), None, Utc::now())
            .is_none());
        assert_eq!(registry.view_count(), 1);
    }

    #[test]
    fn test_idle_views_expire_on_next_begin() {
        let registry = ViewRegistry::new(Duration::ZERO);
        let alice = registry.begin("alice", ReportKind::VehicleCost);
        registry.commit(alice, cost_rows(1), None, Utc::now());
        assert_eq!(registry.view_count(), 1);

        let _bob = registry.begin("bob", ReportKind::VehicleCost);
        assert_eq!(registry.view_count(), 1);
        assert!(registry.current("alice", ReportKind::VehicleCost).is_none());
    }

    #[test]
    fn test_views_are_isolated_per_owner() {
        let registry = ViewRegistry::new(HOUR);
        let a = registry.begin("alice", ReportKind::VehicleCost);
        let b = registry.begin("bob", ReportKind::VehicleCost);
        assert_eq!(a.generation(), 1);
        assert_eq!(b.generation(), 1);

        assert!(registry.commit(a, cost_rows(1), None, Utc::now()).is_some());
        assert!(registry.commit(b, cost_rows(4), None, Utc::now()).is_some());
        assert_eq!(
            registry.current("alice", ReportKind::VehicleCost).unwrap().rows.len(),
            1
        );
    }
}
