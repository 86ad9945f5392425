//! Explicit goal handles.
//!
//! The source pattern this replaces is a weak map from goal-function
//! identity to an id. Here, any goal that needs to be discovered by its
//! siblings during group-metadata enrichment (in practice, SQL
//! fact-relation goals) carries a `GoalHandle` that it was assigned at
//! construction time, and registers itself with the relation's
//! `GoalRegistry`.
// krelation 2024

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identifies a goal across the lifetime of the relation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GoalHandle(pub u64);

impl GoalHandle {
    pub fn next() -> GoalHandle {
        GoalHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// A record describing one goal created from a relation factory: its table,
/// its query-object (column -> term, stored by the caller), and whatever
/// relation-scoped options it carries. `Q` is the per-goal payload type
/// (defined in `facts::sql`); the registry itself is agnostic to it.
#[derive(Debug, Clone)]
pub struct GoalRecord<Q> {
    pub handle: GoalHandle,
    pub table: String,
    pub query: Q,
}

/// Shared, append-only goal registry for one relation factory.
///
/// Never mutated concurrently: the engine's scheduling model is
/// single-threaded cooperative, so a plain `HashMap` behind no lock is
/// sufficient.
#[derive(Debug, Default)]
pub struct GoalRegistry<Q> {
    records: HashMap<GoalHandle, GoalRecord<Q>>,
}

impl<Q: Clone> GoalRegistry<Q> {
    pub fn new() -> Self {
        GoalRegistry { records: HashMap::new() }
    }

    pub fn register(&mut self, table: &str, query: Q) -> GoalHandle {
        let handle = GoalHandle::next();
        self.records.insert(handle, GoalRecord { handle, table: table.to_string(), query });
        handle
    }

    pub fn get(&self, handle: GoalHandle) -> Option<&GoalRecord<Q>> {
        self.records.get(&handle)
    }

    pub fn lookup_many<'a>(&'a self, handles: impl Iterator<Item = &'a GoalHandle>)
        -> Vec<&'a GoalRecord<Q>> {
        handles.filter_map(|h| self.records.get(h)).collect()
    }
}
