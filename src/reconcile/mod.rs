//! Reconciliation of desired state against a cluster
//!
//! Each resource kind has a phase that walks the declared items in order and
//! yields one [`ItemReport`] per item. [`Reconciler`] drives the phases,
//! counts outcomes and decides when to stop.

mod acls;
mod groups;
mod runner;
mod topics;

pub use acls::{expand_permission, AclPhase};
pub use groups::GroupPhase;
pub use runner::Reconciler;
pub use topics::TopicPhase;

use serde::Serialize;
use std::fmt;

/// Kind of resource an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Topic,
    ConsumerGroup,
    Acl,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Topic => "TOPIC",
            ResourceKind::ConsumerGroup => "CONSUMER-GROUP",
            ResourceKind::Acl => "ACL",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one declared item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// Already in the desired state
    Ok,
    /// At least one change was applied
    Changed,
    /// Something failed
    Error,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Ok => "ok",
            ItemStatus::Changed => "changed",
            ItemStatus::Error => "error",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one declared item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub kind: ResourceKind,
    /// Human readable description of the task, e.g. `Create topic orders (...)`
    pub task: String,
    pub status: ItemStatus,
    /// Error text; empty on success
    pub message: String,
    /// Number of successful mutations
    pub changes: usize,
    /// Number of failures
    pub failures: usize,
    /// The item as it was acted upon
    pub detail: serde_json::Value,
}

impl ItemReport {
    fn new<T: Serialize>(kind: ResourceKind, task: String, status: ItemStatus, item: &T) -> Self {
        let (changes, failures) = match status {
            ItemStatus::Ok => (0, 0),
            ItemStatus::Changed => (1, 0),
            ItemStatus::Error => (0, 1),
        };
        Self {
            kind,
            task,
            status,
            message: String::new(),
            changes,
            failures,
            detail: serde_json::to_value(item).unwrap_or(serde_json::Value::Null),
        }
    }

    pub(crate) fn ok<T: Serialize>(kind: ResourceKind, task: String, item: &T) -> Self {
        Self::new(kind, task, ItemStatus::Ok, item)
    }

    pub(crate) fn changed<T: Serialize>(kind: ResourceKind, task: String, item: &T) -> Self {
        Self::new(kind, task, ItemStatus::Changed, item)
    }

    pub(crate) fn failed<T: Serialize>(
        kind: ResourceKind,
        task: String,
        message: impl Into<String>,
        item: &T,
    ) -> Self {
        Self {
            message: message.into(),
            ..Self::new(kind, task, ItemStatus::Error, item)
        }
    }

    /// Outcome of deleting every match of a pattern
    ///
    /// Each deletion counts on its own: successes as changes, failures as
    /// failures. The entry is "ok" only when nothing matched.
    pub(crate) fn pattern_deletion<T: Serialize>(
        kind: ResourceKind,
        task: String,
        changes: usize,
        failures: Vec<String>,
        item: &T,
    ) -> Self {
        let status = if !failures.is_empty() {
            ItemStatus::Error
        } else if changes > 0 {
            ItemStatus::Changed
        } else {
            ItemStatus::Ok
        };
        Self {
            message: failures.last().cloned().unwrap_or_default(),
            changes,
            failures: failures.len(),
            ..Self::new(kind, task, status, item)
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ItemStatus::Error
    }
}

/// Counters for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub changed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &ItemReport) {
        if report.status == ItemStatus::Ok {
            self.ok += 1;
        }
        self.changed += report.changes;
        self.failed += report.failures;
    }

    /// A run succeeds when nothing failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok={} changed={} failed={}",
            self.ok, self.changed, self.failed
        )
    }
}

/// Receives item outcomes as they happen
pub trait Reporter {
    fn report(&mut self, report: &ItemReport);

    /// Called once after the last item
    fn summary(&mut self, _summary: &RunSummary) {}
}

impl Reporter for Vec<ItemReport> {
    fn report(&mut self, report: &ItemReport) {
        self.push(report.clone());
    }
}
