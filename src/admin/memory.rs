//! In-process cluster
//!
//! Holds topics, consumer groups and ACLs in memory and answers every
//! [`ClusterAdmin`] call the way a broker would, including the error codes a
//! broker returns for invalid requests. Every call is recorded, and failures
//! can be injected for chosen calls.

use super::{
    AclEntry, AclFilter, AclResource, BrokerInfo, ClusterAdmin, ResourceAcls, TopicDetail,
};
use crate::acl::{AclOperation, AclPatternType, AclPermissionType, AclResourceType};
use crate::error::{KafkaErrorCode, OpsError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Partition count used when a topic is created with the broker default
pub const DEFAULT_NUM_PARTITIONS: i32 = 1;

/// A call made against an [`InMemoryCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    DescribeCluster,
    ListTopics,
    CreateTopic { name: String, detail: TopicDetail },
    DeleteTopic(String),
    CreatePartitions { name: String, count: i32 },
    AlterTopicConfig { name: String, configs: BTreeMap<String, String> },
    ListConsumerGroups,
    DeleteConsumerGroup(String),
    ListAcls,
    CreateAcl(AclResource, AclEntry),
    DeleteAcls(AclFilter),
}

impl AdminCall {
    /// Returns true for calls that change cluster state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            AdminCall::DescribeCluster
                | AdminCall::ListTopics
                | AdminCall::ListConsumerGroups
                | AdminCall::ListAcls
        )
    }
}

type FailureRule = Box<dyn Fn(&AdminCall) -> Option<KafkaErrorCode> + Send>;

/// A cluster that lives in memory
pub struct InMemoryCluster {
    brokers: Vec<BrokerInfo>,
    topics: BTreeMap<String, TopicDetail>,
    groups: BTreeSet<String>,
    acls: Vec<(AclResource, AclEntry)>,
    calls: Vec<AdminCall>,
    failures: Vec<FailureRule>,
}

impl fmt::Debug for InMemoryCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCluster")
            .field("brokers", &self.brokers.len())
            .field("topics", &self.topics)
            .field("groups", &self.groups)
            .field("acls", &self.acls.len())
            .field("calls", &self.calls.len())
            .field("failure_rules", &self.failures.len())
            .finish()
    }
}

impl InMemoryCluster {
    /// Create an empty cluster with `brokers` brokers
    pub fn new(brokers: usize) -> Self {
        let brokers = (0..brokers)
            .map(|i| BrokerInfo {
                id: i as i32 + 1,
                host: format!("broker-{}", i + 1),
                port: 9092,
            })
            .collect();

        Self {
            brokers,
            topics: BTreeMap::new(),
            groups: BTreeSet::new(),
            acls: Vec::new(),
            calls: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_topic(mut self, name: &str, partitions: i32, replication_factor: i16) -> Self {
        self.topics.insert(
            name.to_string(),
            TopicDetail {
                partitions,
                replication_factor,
                configs: BTreeMap::new(),
            },
        );
        self
    }

    /// Set an override on a topic added earlier
    pub fn with_topic_config(mut self, name: &str, key: &str, value: &str) -> Self {
        if let Some(topic) = self.topics.get_mut(name) {
            topic.configs.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn with_group(mut self, name: &str) -> Self {
        self.groups.insert(name.to_string());
        self
    }

    pub fn with_acl(mut self, resource: AclResource, entry: AclEntry) -> Self {
        self.acls.push((resource, entry));
        self
    }

    /// Fail every call for which `rule` returns an error code
    pub fn fail_when<F>(mut self, rule: F) -> Self
    where
        F: Fn(&AdminCall) -> Option<KafkaErrorCode> + Send + 'static,
    {
        self.failures.push(Box::new(rule));
        self
    }

    pub fn brokers(&self) -> &[BrokerInfo] {
        &self.brokers
    }

    pub fn topics(&self) -> &BTreeMap<String, TopicDetail> {
        &self.topics
    }

    pub fn topic(&self, name: &str) -> Option<&TopicDetail> {
        self.topics.get(name)
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn acl_entries(&self) -> &[(AclResource, AclEntry)] {
        &self.acls
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> &[AdminCall] {
        &self.calls
    }

    /// The calls that changed cluster state
    pub fn mutations(&self) -> Vec<&AdminCall> {
        self.calls.iter().filter(|c| c.is_mutation()).collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn record(&mut self, call: AdminCall) -> Result<()> {
        let injected = self.failures.iter().find_map(|rule| rule(&call));
        self.calls.push(call);
        match injected {
            Some(code) => Err(OpsError::broker(code.as_i16(), None)),
            None => Ok(()),
        }
    }
}

fn broker_error(code: KafkaErrorCode, message: String) -> OpsError {
    OpsError::broker(code.as_i16(), Some(&message))
}

fn is_concrete_acl(resource: &AclResource, entry: &AclEntry) -> bool {
    !matches!(
        resource.resource_type,
        AclResourceType::Unknown | AclResourceType::Any
    ) && matches!(
        resource.pattern_type,
        AclPatternType::Literal | AclPatternType::Prefixed
    ) && !matches!(entry.operation, AclOperation::Unknown | AclOperation::Any)
        && matches!(
            entry.permission_type,
            AclPermissionType::Allow | AclPermissionType::Deny
        )
}

impl ClusterAdmin for InMemoryCluster {
    fn describe_cluster(&mut self) -> Result<Vec<BrokerInfo>> {
        self.record(AdminCall::DescribeCluster)?;
        Ok(self.brokers.clone())
    }

    fn list_topics(&mut self) -> Result<BTreeMap<String, TopicDetail>> {
        self.record(AdminCall::ListTopics)?;
        Ok(self.topics.clone())
    }

    fn create_topic(&mut self, name: &str, detail: &TopicDetail) -> Result<()> {
        self.record(AdminCall::CreateTopic {
            name: name.to_string(),
            detail: detail.clone(),
        })?;

        if self.topics.contains_key(name) {
            return Err(broker_error(
                KafkaErrorCode::TopicAlreadyExists,
                format!("Topic '{}' already exists.", name),
            ));
        }
        if detail.partitions < 0 {
            return Err(OpsError::broker(KafkaErrorCode::InvalidPartitions.as_i16(), None));
        }
        let available = self.brokers.len();
        if detail.replication_factor < 1 || detail.replication_factor as usize > available {
            return Err(broker_error(
                KafkaErrorCode::InvalidReplicationFactor,
                format!(
                    "Replication factor: {} larger than available brokers: {}.",
                    detail.replication_factor, available
                ),
            ));
        }

        let partitions = if detail.partitions == 0 {
            DEFAULT_NUM_PARTITIONS
        } else {
            detail.partitions
        };
        self.topics.insert(
            name.to_string(),
            TopicDetail {
                partitions,
                replication_factor: detail.replication_factor,
                configs: detail.configs.clone(),
            },
        );
        Ok(())
    }

    fn delete_topic(&mut self, name: &str) -> Result<()> {
        self.record(AdminCall::DeleteTopic(name.to_string()))?;
        match self.topics.remove(name) {
            Some(_) => Ok(()),
            None => Err(OpsError::broker(
                KafkaErrorCode::UnknownTopicOrPartition.as_i16(),
                None,
            )),
        }
    }

    fn create_partitions(&mut self, name: &str, count: i32) -> Result<()> {
        self.record(AdminCall::CreatePartitions {
            name: name.to_string(),
            count,
        })?;

        let Some(topic) = self.topics.get_mut(name) else {
            return Err(OpsError::broker(
                KafkaErrorCode::UnknownTopicOrPartition.as_i16(),
                None,
            ));
        };
        if count <= topic.partitions {
            return Err(broker_error(
                KafkaErrorCode::InvalidPartitions,
                format!(
                    "Topic currently has {} partitions, which is higher than the requested {}.",
                    topic.partitions, count
                ),
            ));
        }
        topic.partitions = count;
        Ok(())
    }

    fn alter_topic_config(&mut self, name: &str, configs: &BTreeMap<String, String>) -> Result<()> {
        self.record(AdminCall::AlterTopicConfig {
            name: name.to_string(),
            configs: configs.clone(),
        })?;

        match self.topics.get_mut(name) {
            Some(topic) => {
                topic.configs = configs.clone();
                Ok(())
            }
            None => Err(OpsError::broker(
                KafkaErrorCode::UnknownTopicOrPartition.as_i16(),
                None,
            )),
        }
    }

    fn list_consumer_groups(&mut self) -> Result<BTreeSet<String>> {
        self.record(AdminCall::ListConsumerGroups)?;
        Ok(self.groups.clone())
    }

    fn delete_consumer_group(&mut self, name: &str) -> Result<()> {
        self.record(AdminCall::DeleteConsumerGroup(name.to_string()))?;
        if self.groups.remove(name) {
            Ok(())
        } else {
            Err(OpsError::broker(KafkaErrorCode::GroupIdNotFound.as_i16(), None))
        }
    }

    fn list_acls(&mut self, filter: &AclFilter) -> Result<Vec<ResourceAcls>> {
        self.record(AdminCall::ListAcls)?;

        let mut grouped: Vec<ResourceAcls> = Vec::new();
        for (resource, entry) in self.acls.iter().filter(|(r, e)| filter.matches(r, e)) {
            match grouped.iter_mut().find(|g| &g.resource == resource) {
                Some(group) => group.acls.push(entry.clone()),
                None => grouped.push(ResourceAcls {
                    resource: resource.clone(),
                    acls: vec![entry.clone()],
                }),
            }
        }
        Ok(grouped)
    }

    fn create_acl(&mut self, resource: &AclResource, entry: &AclEntry) -> Result<()> {
        self.record(AdminCall::CreateAcl(resource.clone(), entry.clone()))?;

        if !is_concrete_acl(resource, entry) {
            return Err(broker_error(
                KafkaErrorCode::InvalidRequest,
                format!(
                    "Invalid ACL creation: {} {} {} {}",
                    resource.resource_type,
                    resource.pattern_type,
                    entry.operation,
                    entry.permission_type
                ),
            ));
        }

        let exists = self
            .acls
            .iter()
            .any(|(r, e)| r == resource && e == entry);
        if !exists {
            self.acls.push((resource.clone(), entry.clone()));
        }
        Ok(())
    }

    fn delete_acls(&mut self, filter: &AclFilter) -> Result<usize> {
        self.record(AdminCall::DeleteAcls(filter.clone()))?;

        let before = self.acls.len();
        self.acls.retain(|(r, e)| !filter.matches(r, e));
        Ok(before - self.acls.len())
    }
}
