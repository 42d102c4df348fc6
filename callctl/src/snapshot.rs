//! In-memory store of fetched call sets, one snapshot per workspace.
//!
//! A fetch is a long multi-page operation, and nothing stops a client from
//! starting another one for the same workspace while the first is still in
//! flight. Snapshots are therefore generation-tagged: every fetch takes a
//! monotonically increasing generation number up front, and installation
//! refuses to replace a snapshot from a newer generation. The last-started
//! fetch wins regardless of completion order, and a failed fetch installs
//! nothing — the previous snapshot stays intact.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::billing::FleetSummary;
use crate::filters::CallFilter;
use crate::provider::types::Call;

/// The full normalized result set of one completed fetch.
#[derive(Debug, Clone)]
pub struct CallSnapshot {
    pub workspace: String,
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    /// The filter the set was fetched with; drives export naming.
    pub filter: CallFilter,
    pub calls: Vec<Call>,
    pub summary: FleetSummary,
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: DashMap<String, Arc<CallSnapshot>>,
    generations: DashMap<String, u64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next fetch generation for a workspace. Call before the
    /// first page request.
    pub fn begin_fetch(&self, workspace: &str) -> u64 {
        let mut entry = self.generations.entry(workspace.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Install a completed snapshot. Returns `false` (and drops the
    /// snapshot) when a newer generation is already installed.
    pub fn install(&self, snapshot: CallSnapshot) -> bool {
        match self.snapshots.entry(snapshot.workspace.clone()) {
            Entry::Occupied(current) if current.get().generation > snapshot.generation => false,
            Entry::Occupied(mut current) => {
                current.insert(Arc::new(snapshot));
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(snapshot));
                true
            }
        }
    }

    pub fn get(&self, workspace: &str) -> Option<Arc<CallSnapshot>> {
        self.snapshots
            .get(workspace)
            .map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::BillingPolicy;

    fn snapshot(workspace: &str, generation: u64, calls: usize) -> CallSnapshot {
        let calls: Vec<Call> = (0..calls)
            .map(|i| Call {
                call_id: format!("call_{i}"),
                ..Default::default()
            })
            .collect();
        let summary = BillingPolicy::default().summarize(&calls);
        CallSnapshot {
            workspace: workspace.to_string(),
            generation,
            fetched_at: Utc::now(),
            filter: CallFilter::default(),
            calls,
            summary,
        }
    }

    #[test]
    fn generations_increase_per_workspace() {
        let store = SnapshotStore::new();
        assert_eq!(store.begin_fetch("acme"), 1);
        assert_eq!(store.begin_fetch("acme"), 2);
        assert_eq!(store.begin_fetch("globex"), 1);
    }

    #[test]
    fn stale_fetch_cannot_overwrite_newer_snapshot() {
        let store = SnapshotStore::new();
        let first = store.begin_fetch("acme");
        let second = store.begin_fetch("acme");

        // The later-started fetch completes first
        assert!(store.install(snapshot("acme", second, 5)));
        // ... then the stale one lands and is refused
        assert!(!store.install(snapshot("acme", first, 2)));

        let current = store.get("acme").unwrap();
        assert_eq!(current.generation, second);
        assert_eq!(current.calls.len(), 5);
    }

    #[test]
    fn in_order_completion_replaces_normally() {
        let store = SnapshotStore::new();
        let first = store.begin_fetch("acme");
        assert!(store.install(snapshot("acme", first, 1)));
        let second = store.begin_fetch("acme");
        assert!(store.install(snapshot("acme", second, 3)));

        assert_eq!(store.get("acme").unwrap().calls.len(), 3);
        assert!(store.get("globex").is_none());
    }
}
