//! Topic phase

use super::{ItemReport, ResourceKind};
use crate::admin::{ClusterAdmin, TopicDetail};
use crate::error::{OpsError, Result};
use crate::pattern::{is_internal, Matcher, NamePattern};
use crate::spec::{Topic, DEFAULT_CONFIG_VALUE, STATE_ABSENT, STATE_PRESENT};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const REPLICATION_FACTOR_CHANGE: &str = "Cannot change replication-factor. Consider doing it manually with kafka-reassign-partitions utility or re-creating the topic";

/// Replication factor used when a topic does not declare one
pub(crate) fn auto_replication_factor(brokers: usize) -> i32 {
    if brokers > 1 {
        2
    } else {
        1
    }
}

/// Reconciles declared topics one at a time
///
/// The live topic list is fetched once when the phase starts and kept in
/// step with the changes the phase makes.
pub struct TopicPhase<'a, A: ClusterAdmin + ?Sized> {
    admin: &'a mut A,
    topics: std::slice::Iter<'a, Topic>,
    live: BTreeMap<String, TopicDetail>,
    auto_replication_factor: i32,
    stop_on_error: bool,
}

impl<'a, A: ClusterAdmin + ?Sized> TopicPhase<'a, A> {
    /// Start the phase; fails if the cluster cannot be described or listed
    pub fn new(admin: &'a mut A, topics: &'a [Topic], stop_on_error: bool) -> Result<Self> {
        let brokers = admin
            .describe_cluster()
            .map_err(|e| OpsError::RunAborted(format!("Can't get number of brokers: {}", e)))?;
        let live = admin
            .list_topics()
            .map_err(|e| OpsError::RunAborted(format!("Can't list topics: {}", e)))?;

        debug!(brokers = brokers.len(), topics = live.len(), "Starting topic phase");
        Ok(Self {
            admin,
            topics: topics.iter(),
            live,
            auto_replication_factor: auto_replication_factor(brokers.len()),
            stop_on_error,
        })
    }

    fn reconcile(&mut self, declared: &Topic) -> ItemReport {
        let mut topic = declared.clone();

        if topic.is_absent() {
            topic.state = STATE_ABSENT.to_string();
            let pattern = NamePattern::normalize(&topic.pattern_type);
            if pattern != NamePattern::Literal {
                topic.pattern_type = pattern.as_str().to_string();
                return self.delete_matching(topic, pattern);
            }
            return self.delete_literal(topic);
        }

        topic.state = STATE_PRESENT.to_string();
        match self.live.get(&topic.name).cloned() {
            None => self.create(topic),
            Some(live) => self.align(topic, &live),
        }
    }

    fn delete_matching(&mut self, mut topic: Topic, pattern: NamePattern) -> ItemReport {
        let task = format!("Delete topics {} by {}", pattern, topic.name);

        let matcher = match Matcher::new(&topic.name, pattern) {
            Ok(matcher) => matcher,
            Err(e) => return ItemReport::failed(ResourceKind::Topic, task, e.message(), &topic),
        };
        let candidates: Vec<String> = self
            .live
            .keys()
            .filter(|name| !is_internal(name))
            .filter(|name| matcher.is_match(name))
            .cloned()
            .collect();

        let mut deleted = 0;
        let mut failures = Vec::new();
        for name in candidates {
            topic.matched.push(name.clone());
            match self.admin.delete_topic(&name) {
                Ok(()) => {
                    self.live.remove(&name);
                    deleted += 1;
                }
                Err(e) => {
                    warn!(topic = %name, error = %e, "Failed to delete topic");
                    failures.push(e.to_string());
                    if self.stop_on_error {
                        break;
                    }
                }
            }
        }

        ItemReport::pattern_deletion(ResourceKind::Topic, task, deleted, failures, &topic)
    }

    fn delete_literal(&mut self, topic: Topic) -> ItemReport {
        let task = format!("Delete topic {}", topic.name);

        if !self.live.contains_key(&topic.name) {
            return ItemReport::ok(ResourceKind::Topic, task, &topic);
        }
        match self.admin.delete_topic(&topic.name) {
            Ok(()) => {
                self.live.remove(&topic.name);
                ItemReport::changed(ResourceKind::Topic, task, &topic)
            }
            Err(e) => {
                warn!(topic = %topic.name, error = %e, "Failed to delete topic");
                ItemReport::failed(ResourceKind::Topic, task, e.to_string(), &topic)
            }
        }
    }

    fn create(&mut self, mut topic: Topic) -> ItemReport {
        if topic.replication_factor < 1 {
            topic.replication_factor = self.auto_replication_factor;
        }
        let task = format!(
            "Create topic {} (partitions={}, replicas={})",
            topic.name, topic.partitions, topic.replication_factor
        );

        let replication_factor = match i16::try_from(topic.replication_factor) {
            Ok(rf) => rf,
            Err(_) => {
                let message = format!("Invalid replication factor: {}", topic.replication_factor);
                return ItemReport::failed(ResourceKind::Topic, task, message, &topic);
            }
        };
        let detail = TopicDetail {
            partitions: topic.partitions.max(0),
            replication_factor,
            configs: explicit_configs(&topic.configs),
        };

        match self.admin.create_topic(&topic.name, &detail) {
            Ok(()) => {
                self.live.insert(topic.name.clone(), detail);
                ItemReport::changed(ResourceKind::Topic, task, &topic)
            }
            Err(e) => {
                warn!(topic = %topic.name, error = %e, "Failed to create topic");
                ItemReport::failed(ResourceKind::Topic, task, e.to_string(), &topic)
            }
        }
    }

    fn align(&mut self, mut topic: Topic, live: &TopicDetail) -> ItemReport {
        let task = if topic.replication_factor > 0 {
            format!(
                "Modify topic {} (partitions={}, replicas={})",
                topic.name, topic.partitions, topic.replication_factor
            )
        } else {
            format!("Modify topic {} (partitions={})", topic.name, topic.partitions)
        };

        if topic.replication_factor > 0
            && topic.replication_factor != i32::from(live.replication_factor)
        {
            return ItemReport::failed(ResourceKind::Topic, task, REPLICATION_FACTOR_CHANGE, &topic);
        }

        let mut altered = false;

        if topic.partitions > 0 && topic.partitions != live.partitions {
            debug!(
                topic = %topic.name,
                from = live.partitions,
                to = topic.partitions,
                "Partition count differs"
            );
            if let Err(e) = self.admin.create_partitions(&topic.name, topic.partitions) {
                warn!(topic = %topic.name, error = %e, "Failed to change partition count");
                return ItemReport::failed(ResourceKind::Topic, task, e.to_string(), &topic);
            }
            if let Some(entry) = self.live.get_mut(&topic.name) {
                entry.partitions = topic.partitions;
            }
            altered = true;
        }

        if config_alter_needed(&topic.configs, &live.configs) {
            let merged = merged_configs(&topic.configs, &live.configs);
            for (key, value) in &live.configs {
                topic
                    .configs
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }

            debug!(topic = %topic.name, entries = merged.len(), "Topic config differs");
            if let Err(e) = self.admin.alter_topic_config(&topic.name, &merged) {
                warn!(topic = %topic.name, error = %e, "Failed to alter topic config");
                return ItemReport::failed(ResourceKind::Topic, task, e.to_string(), &topic);
            }
            if let Some(entry) = self.live.get_mut(&topic.name) {
                entry.configs = merged;
            }
            altered = true;
        }

        if altered {
            ItemReport::changed(ResourceKind::Topic, task, &topic)
        } else {
            ItemReport::ok(ResourceKind::Topic, task, &topic)
        }
    }
}

impl<A: ClusterAdmin + ?Sized> Iterator for TopicPhase<'_, A> {
    type Item = ItemReport;

    fn next(&mut self) -> Option<ItemReport> {
        let topic = self.topics.next()?;
        Some(self.reconcile(topic))
    }
}

/// Declared overrides without the `default` markers
fn explicit_configs(declared: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    declared
        .iter()
        .filter(|(_, v)| v.as_str() != DEFAULT_CONFIG_VALUE)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// True if any declared key disagrees with the live overrides
///
/// A declared `default` agrees with a key that has no live override.
fn config_alter_needed(
    declared: &BTreeMap<String, String>,
    live: &BTreeMap<String, String>,
) -> bool {
    declared.iter().any(|(key, value)| match live.get(key) {
        Some(current) => current != value,
        None => value != DEFAULT_CONFIG_VALUE,
    })
}

/// Full override set to send: declared values plus undeclared live overrides
fn merged_configs(
    declared: &BTreeMap<String, String>,
    live: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = explicit_configs(declared);
    for (key, value) in live {
        if !declared.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
