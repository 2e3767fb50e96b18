//! Run aggregator

use super::{AclPhase, GroupPhase, ItemReport, Reporter, RunSummary, TopicPhase};
use crate::admin::ClusterAdmin;
use crate::config::ApplyOptions;
use crate::error::Result;
use crate::spec::Spec;
use tracing::{debug, info};

/// Drives the topic, consumer-group and ACL phases against one cluster
pub struct Reconciler<'a, A: ClusterAdmin + ?Sized> {
    admin: &'a mut A,
    options: ApplyOptions,
}

impl<'a, A: ClusterAdmin + ?Sized> Reconciler<'a, A> {
    pub fn new(admin: &'a mut A, options: ApplyOptions) -> Self {
        Self { admin, options }
    }

    /// Apply `spec` and report every item as it completes
    ///
    /// Returns `Err` only when a phase cannot start; item failures are
    /// counted in the summary. With `stop_on_error` the run ends after the
    /// first failed item and later phases never start.
    pub fn run(&mut self, spec: &Spec, reporter: &mut dyn Reporter) -> Result<RunSummary> {
        let stop_on_error = self.options.stop_on_error;
        let mut summary = RunSummary::default();

        let mut aborted = {
            let phase = TopicPhase::new(&mut *self.admin, &spec.topics, stop_on_error)?;
            drain(phase, stop_on_error, &mut summary, reporter)
        };

        if !aborted && !spec.consumer_groups.is_empty() {
            let phase = GroupPhase::new(&mut *self.admin, &spec.consumer_groups, stop_on_error)?;
            aborted = drain(phase, stop_on_error, &mut summary, reporter);
        }

        if !aborted && !spec.acls.is_empty() {
            let phase = AclPhase::new(&mut *self.admin, &spec.acls)?;
            aborted = drain(phase, stop_on_error, &mut summary, reporter);
        }

        if aborted {
            debug!("Stopped after first error");
        }
        info!(
            ok = summary.ok,
            changed = summary.changed,
            failed = summary.failed,
            "Run finished"
        );
        reporter.summary(&summary);
        Ok(summary)
    }
}

/// Feed a phase into the summary; returns true if it stopped on an error
fn drain(
    phase: impl Iterator<Item = ItemReport>,
    stop_on_error: bool,
    summary: &mut RunSummary,
    reporter: &mut dyn Reporter,
) -> bool {
    for report in phase {
        summary.record(&report);
        reporter.report(&report);
        if stop_on_error && report.is_error() {
            return true;
        }
    }
    false
}
