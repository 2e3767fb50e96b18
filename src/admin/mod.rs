//! Cluster administration
//!
//! [`ClusterAdmin`] is the seam between the reconcilers and a cluster. The
//! wire implementation lives in [`kafka`]; [`memory`] holds an in-process
//! cluster used by tests and dry runs.

mod connection;
pub mod kafka;
pub mod memory;
mod scram;
mod tls;

pub use kafka::KafkaAdmin;
pub use memory::{AdminCall, InMemoryCluster};

use crate::acl::{AclOperation, AclPatternType, AclPermissionType, AclResourceType};
use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};

/// A broker as reported by cluster metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerInfo {
    pub id: i32,
    pub host: String,
    pub port: i32,
}

impl BrokerInfo {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shape and config overrides of a topic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicDetail {
    pub partitions: i32,
    pub replication_factor: i16,
    /// Topic-level overrides only; broker defaults are not included
    pub configs: BTreeMap<String, String>,
}

/// The resource half of an ACL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AclResource {
    pub resource_type: AclResourceType,
    pub name: String,
    pub pattern_type: AclPatternType,
}

/// The principal half of an ACL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AclEntry {
    pub principal: String,
    pub host: String,
    pub operation: AclOperation,
    pub permission_type: AclPermissionType,
}

/// All entries bound to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAcls {
    pub resource: AclResource,
    pub acls: Vec<AclEntry>,
}

/// Selects ACLs for listing or deletion
///
/// `Any` enumeration values and `None` strings match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclFilter {
    pub resource_type: AclResourceType,
    pub resource_name: Option<String>,
    pub pattern_type: AclPatternType,
    pub principal: Option<String>,
    pub host: Option<String>,
    pub operation: AclOperation,
    pub permission_type: AclPermissionType,
}

impl AclFilter {
    /// A filter that selects every ACL on the cluster
    pub fn match_all() -> Self {
        Self {
            resource_type: AclResourceType::Any,
            resource_name: None,
            pattern_type: AclPatternType::Any,
            principal: None,
            host: None,
            operation: AclOperation::Any,
            permission_type: AclPermissionType::Any,
        }
    }

    /// Test one entry against the filter
    ///
    /// Resource names compare exactly; pattern type `MATCH` is treated like
    /// `ANY` here, the way the broker does for stored literal/prefixed ACLs.
    pub fn matches(&self, resource: &AclResource, entry: &AclEntry) -> bool {
        let type_ok = self.resource_type == AclResourceType::Any
            || self.resource_type == resource.resource_type;
        let name_ok = self
            .resource_name
            .as_deref()
            .map_or(true, |n| n == resource.name);
        let pattern_ok = matches!(self.pattern_type, AclPatternType::Any | AclPatternType::Match)
            || self.pattern_type == resource.pattern_type;
        let principal_ok = self
            .principal
            .as_deref()
            .map_or(true, |p| p == entry.principal);
        let host_ok = self.host.as_deref().map_or(true, |h| h == entry.host);
        let op_ok = self.operation == AclOperation::Any || self.operation == entry.operation;
        let perm_ok = self.permission_type == AclPermissionType::Any
            || self.permission_type == entry.permission_type;

        type_ok && name_ok && pattern_ok && principal_ok && host_ok && op_ok && perm_ok
    }
}

/// Administrative operations the reconcilers need from a cluster
pub trait ClusterAdmin {
    /// Brokers currently in the cluster
    fn describe_cluster(&mut self) -> Result<Vec<BrokerInfo>>;

    /// All topics with their partition count, replication factor and overrides
    fn list_topics(&mut self) -> Result<BTreeMap<String, TopicDetail>>;

    /// Create a topic; a partition count of 0 uses the broker default
    fn create_topic(&mut self, name: &str, detail: &TopicDetail) -> Result<()>;

    fn delete_topic(&mut self, name: &str) -> Result<()>;

    /// Raise the partition count of a topic to `count`
    fn create_partitions(&mut self, name: &str, count: i32) -> Result<()>;

    /// Replace the full set of overrides on a topic
    fn alter_topic_config(&mut self, name: &str, configs: &BTreeMap<String, String>) -> Result<()>;

    fn list_consumer_groups(&mut self) -> Result<BTreeSet<String>>;

    fn delete_consumer_group(&mut self, name: &str) -> Result<()>;

    fn list_acls(&mut self, filter: &AclFilter) -> Result<Vec<ResourceAcls>>;

    fn create_acl(&mut self, resource: &AclResource, entry: &AclEntry) -> Result<()>;

    /// Delete every ACL matching `filter`, returning how many were removed
    fn delete_acls(&mut self, filter: &AclFilter) -> Result<usize>;
}
