//! Consumer-group phase
//!
//! Consumer groups can only be deleted, by exact name or by pattern.

use super::{ItemReport, ResourceKind};
use crate::admin::ClusterAdmin;
use crate::error::{OpsError, Result};
use crate::pattern::{Matcher, NamePattern};
use crate::spec::{ConsumerGroup, STATE_ABSENT};
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub struct GroupPhase<'a, A: ClusterAdmin + ?Sized> {
    admin: &'a mut A,
    groups: std::slice::Iter<'a, ConsumerGroup>,
    live: BTreeSet<String>,
    stop_on_error: bool,
}

impl<'a, A: ClusterAdmin + ?Sized> GroupPhase<'a, A> {
    /// Start the phase; fails if the groups cannot be listed
    pub fn new(admin: &'a mut A, groups: &'a [ConsumerGroup], stop_on_error: bool) -> Result<Self> {
        let live = admin
            .list_consumer_groups()
            .map_err(|e| OpsError::RunAborted(format!("Can't list consumer-groups: {}", e)))?;

        debug!(groups = live.len(), "Starting consumer-group phase");
        Ok(Self {
            admin,
            groups: groups.iter(),
            live,
            stop_on_error,
        })
    }

    fn reconcile(&mut self, declared: &ConsumerGroup) -> ItemReport {
        let mut group = declared.clone();
        let pattern = NamePattern::normalize(&group.pattern_type);
        group.pattern_type = pattern.as_str().to_string();
        let task = format!("Delete consumer-group {} by {}", pattern, group.name);

        if !group.is_absent() {
            return ItemReport::failed(
                ResourceKind::ConsumerGroup,
                task,
                "Consumer-groups support only state=absent",
                &group,
            );
        }
        group.state = STATE_ABSENT.to_string();

        let matcher = match Matcher::new(&group.name, pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                return ItemReport::failed(ResourceKind::ConsumerGroup, task, e.message(), &group)
            }
        };

        let mut deleted = 0;
        let mut failures = Vec::new();
        for name in matcher.select(&self.live) {
            group.matched.push(name.clone());
            match self.admin.delete_consumer_group(&name) {
                Ok(()) => {
                    self.live.remove(&name);
                    deleted += 1;
                }
                Err(e) => {
                    warn!(group = %name, error = %e, "Failed to delete consumer group");
                    failures.push(e.to_string());
                    if self.stop_on_error {
                        break;
                    }
                }
            }
        }

        ItemReport::pattern_deletion(ResourceKind::ConsumerGroup, task, deleted, failures, &group)
    }
}

impl<A: ClusterAdmin + ?Sized> Iterator for GroupPhase<'_, A> {
    type Item = ItemReport;

    fn next(&mut self) -> Option<ItemReport> {
        let group = self.groups.next()?;
        Some(self.reconcile(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{AdminCall, InMemoryCluster};
    use crate::error::KafkaErrorCode;
    use crate::reconcile::ItemStatus;

    fn group(name: &str, pattern_type: &str) -> ConsumerGroup {
        ConsumerGroup {
            name: name.into(),
            state: STATE_ABSENT.into(),
            pattern_type: pattern_type.into(),
            matched: Vec::new(),
        }
    }

    fn run(cluster: &mut InMemoryCluster, groups: &[ConsumerGroup]) -> Vec<ItemReport> {
        GroupPhase::new(cluster, groups, false).unwrap().collect()
    }

    #[test]
    fn test_literal_is_exact_name() {
        let mut cluster = InMemoryCluster::new(1)
            .with_group("billing")
            .with_group("billing-v2");
        let reports = run(&mut cluster, &[group("billing", "")]);

        assert_eq!(reports[0].task, "Delete consumer-group literal by billing");
        assert_eq!(reports[0].status, ItemStatus::Changed);
        assert_eq!(cluster.groups().len(), 1);
        assert!(cluster.groups().contains("billing-v2"));
    }

    #[test]
    fn test_unknown_pattern_type_is_literal() {
        let mut cluster = InMemoryCluster::new(1).with_group("billing-v2");
        let reports = run(&mut cluster, &[group("billing", "glob")]);

        assert_eq!(reports[0].status, ItemStatus::Ok);
        assert_eq!(reports[0].detail["patternType"], "literal");
        assert!(cluster.mutations().is_empty());
    }

    #[test]
    fn test_prefixed_deletes_all_matches() {
        let mut cluster = InMemoryCluster::new(1)
            .with_group("etl-1")
            .with_group("etl-2")
            .with_group("web");
        let reports = run(&mut cluster, &[group("etl-", "PREFIXED")]);

        assert_eq!(reports[0].changes, 2);
        assert_eq!(reports[0].detail["matched"], serde_json::json!(["etl-1", "etl-2"]));
        assert_eq!(cluster.groups().iter().collect::<Vec<_>>(), vec!["web"]);
    }

    #[test]
    fn test_present_state_is_rejected() {
        let mut cluster = InMemoryCluster::new(1).with_group("billing");
        let present = ConsumerGroup {
            state: "present".into(),
            ..group("billing", "")
        };
        let reports = run(&mut cluster, &[present]);

        assert!(reports[0].is_error());
        assert_eq!(reports[0].message, "Consumer-groups support only state=absent");
        assert!(cluster.mutations().is_empty());
    }

    #[test]
    fn test_failed_deletion() {
        let mut cluster = InMemoryCluster::new(1)
            .with_group("billing")
            .fail_when(|call| {
                matches!(call, AdminCall::DeleteConsumerGroup(_))
                    .then_some(KafkaErrorCode::NonEmptyGroup)
            });
        let reports = run(&mut cluster, &[group("billing", "literal")]);

        assert!(reports[0].is_error());
        assert_eq!(reports[0].message, "The group is not empty");
        assert_eq!(reports[0].detail["matched"], serde_json::json!(["billing"]));
    }

    #[test]
    fn test_list_failure_aborts() {
        let mut cluster = InMemoryCluster::new(1).fail_when(|call| {
            matches!(call, AdminCall::ListConsumerGroups)
                .then_some(KafkaErrorCode::CoordinatorNotAvailable)
        });
        let err = GroupPhase::new(&mut cluster, &[], false).err().unwrap();
        assert!(err.to_string().starts_with("Can't list consumer-groups: "));
    }
}
