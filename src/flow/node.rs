//! Flow node state and child result map.

use crate::store::JobId;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Policy options for a flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowOptions {
    /// When a child fails permanently: cancel all not-yet-started
    /// siblings (best-effort) and fail the parent immediately, without
    /// ever running it. When false, siblings keep running and the parent
    /// is failed only once every child has settled.
    pub remove_dependency_on_failure: bool,
}

impl FlowOptions {
    /// Options with `remove_dependency_on_failure` set.
    pub fn abort_on_child_failure() -> Self {
        Self {
            remove_dependency_on_failure: true,
        }
    }
}

/// Append-only map from child-job identity to that child's result value.
///
/// Visible to the parent only once every child has settled. The map
/// guarantees no ordering; callers that need one sort explicitly by an
/// `index` field carried inside each value.
#[derive(Debug, Clone, Default)]
pub struct ChildResults {
    values: HashMap<JobId, Value>,
}

impl ChildResults {
    pub(crate) fn insert(&mut self, child: JobId, value: Value) {
        self.values.insert(child, value);
    }

    /// Returns the result for one child.
    pub fn get(&self, child: &JobId) -> Option<&Value> {
        self.values.get(child)
    }

    /// Iterates over `(child id, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&JobId, &Value)> {
        self.values.iter()
    }

    /// Iterates over result values in no particular order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no child produced a result.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A parent job gated on a set of child jobs.
#[derive(Debug)]
pub(crate) struct FlowNode {
    /// Children that have not yet settled.
    pub pending: HashSet<JobId>,
    /// Results of completed children.
    pub results: ChildResults,
    /// Whether any child failed permanently.
    pub child_failed: bool,
    /// Flow policy.
    pub options: FlowOptions,
    /// Whether the parent has been made eligible (or failed).
    pub resolved: bool,
}

impl FlowNode {
    pub(crate) fn new(children: Vec<JobId>, options: FlowOptions) -> Self {
        Self {
            pending: children.into_iter().collect(),
            results: ChildResults::default(),
            child_failed: false,
            options,
            resolved: false,
        }
    }

    /// True once every declared child reached a terminal state.
    pub(crate) fn all_settled(&self) -> bool {
        self.pending.is_empty()
    }
}
