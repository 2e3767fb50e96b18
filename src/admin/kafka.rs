//! [`ClusterAdmin`] over the Kafka wire protocol
//!
//! Requests are routed the way the admin API expects: topic creation,
//! deletion and partition changes go to the controller, group listing fans
//! out to every broker, group deletion goes to the group coordinator, and
//! config and ACL requests use the bootstrap connection.

use super::connection::BrokerConnection;
use super::tls;
use super::{
    AclEntry, AclFilter, AclResource, BrokerInfo, ClusterAdmin, ResourceAcls, TopicDetail,
};
use crate::acl::{AclOperation, AclPatternType, AclPermissionType, AclResourceType};
use crate::config::ConnectionConfig;
use crate::error::{check_error_code, OpsError, Result};
use kafka_protocol::messages::alter_configs_request::{AlterConfigsResource, AlterableConfig};
use kafka_protocol::messages::create_acls_request::AclCreation;
use kafka_protocol::messages::create_partitions_request::CreatePartitionsTopic;
use kafka_protocol::messages::create_topics_request::{CreatableTopic, CreatableTopicConfig};
use kafka_protocol::messages::delete_acls_request::DeleteAclsFilter;
use kafka_protocol::messages::describe_configs_request::DescribeConfigsResource;
use kafka_protocol::messages::metadata_request::MetadataRequestTopic;
use kafka_protocol::messages::{
    AlterConfigsRequest, AlterConfigsResponse, ApiKey, BrokerId, CreateAclsRequest,
    CreateAclsResponse, CreatePartitionsRequest, CreatePartitionsResponse, CreateTopicsRequest,
    CreateTopicsResponse, DeleteAclsRequest, DeleteAclsResponse, DeleteGroupsRequest,
    DeleteGroupsResponse, DeleteTopicsRequest, DeleteTopicsResponse, DescribeAclsRequest,
    DescribeAclsResponse, DescribeConfigsRequest, DescribeConfigsResponse, FindCoordinatorRequest,
    FindCoordinatorResponse, GroupId, ListGroupsRequest, ListGroupsResponse, MetadataRequest,
    MetadataResponse, TopicName,
};
use kafka_protocol::protocol::StrBytes;
use rustls::ClientConfig;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

const METADATA_VERSION: i16 = 1;
const DESCRIBE_CONFIGS_VERSION: i16 = 1;
const CREATE_TOPICS_VERSION: i16 = 4;
const DELETE_TOPICS_VERSION: i16 = 1;
const CREATE_PARTITIONS_VERSION: i16 = 1;
const ALTER_CONFIGS_VERSION: i16 = 1;
const LIST_GROUPS_VERSION: i16 = 2;
const FIND_COORDINATOR_VERSION: i16 = 1;
const DELETE_GROUPS_VERSION: i16 = 1;
const DESCRIBE_ACLS_VERSION: i16 = 1;
const CREATE_ACLS_VERSION: i16 = 1;
const DELETE_ACLS_VERSION: i16 = 1;

/// Config resource type code for topics
const RESOURCE_TYPE_TOPIC: i8 = 2;
/// `config_source` of an override set on the topic itself
const CONFIG_SOURCE_DYNAMIC_TOPIC: i8 = 1;
/// FindCoordinator key type for consumer groups
const COORDINATOR_KEY_GROUP: i8 = 0;

/// Timeout passed to the broker for topic and partition changes
const OPERATION_TIMEOUT_MS: i32 = 30_000;

fn str_bytes(s: &str) -> StrBytes {
    StrBytes::from_string(s.to_string())
}

fn topic_name(name: &str) -> TopicName {
    TopicName(str_bytes(name))
}

fn optional_message(message: &Option<StrBytes>) -> Option<&str> {
    message.as_ref().map(|m| m.as_str())
}

/// Admin client for a live cluster
pub struct KafkaAdmin {
    config: ConnectionConfig,
    tls: Option<Arc<ClientConfig>>,
    bootstrap: BrokerConnection,
    brokers: Vec<BrokerInfo>,
    controller_id: i32,
    connections: HashMap<i32, BrokerConnection>,
}

impl std::fmt::Debug for KafkaAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaAdmin")
            .field("bootstrap", &self.bootstrap.address())
            .field("protocol", &self.config.protocol)
            .field("brokers", &self.brokers)
            .field("controller_id", &self.controller_id)
            .finish()
    }
}

impl KafkaAdmin {
    /// Connect to the first reachable bootstrap broker and load cluster metadata
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let tls = config.protocol.uses_tls().then(tls::client_config);

        let mut last_error = None;
        let mut bootstrap = None;
        for address in &config.brokers {
            match BrokerConnection::open(address, &config, tls.as_ref()) {
                Ok(connection) => {
                    bootstrap = Some(connection);
                    break;
                }
                Err(e) => {
                    warn!(broker = %address, error = %e, "Bootstrap broker unreachable");
                    last_error = Some(e);
                }
            }
        }
        let bootstrap = match (bootstrap, last_error) {
            (Some(connection), _) => connection,
            (None, Some(e)) => return Err(e),
            (None, None) => return Err(OpsError::Config("No broker address given".to_string())),
        };

        let mut admin = Self {
            config,
            tls,
            bootstrap,
            brokers: Vec::new(),
            controller_id: -1,
            connections: HashMap::new(),
        };
        admin.refresh_brokers()?;

        info!(
            bootstrap = %admin.bootstrap.address(),
            brokers = admin.brokers.len(),
            controller = admin.controller_id,
            "Connected to cluster"
        );
        Ok(admin)
    }

    /// Address of the broker this client bootstrapped from
    pub fn bootstrap_address(&self) -> &str {
        self.bootstrap.address()
    }

    fn metadata(&mut self, topics: Option<Vec<MetadataRequestTopic>>) -> Result<MetadataResponse> {
        let request = MetadataRequest::default().with_topics(topics);
        let response: MetadataResponse =
            self.bootstrap
                .send(ApiKey::Metadata, METADATA_VERSION, &request)?;

        self.brokers = response
            .brokers
            .iter()
            .map(|b| BrokerInfo {
                id: b.node_id.0,
                host: b.host.as_str().to_string(),
                port: b.port,
            })
            .collect();
        self.controller_id = response.controller_id.0;
        Ok(response)
    }

    fn refresh_brokers(&mut self) -> Result<()> {
        self.metadata(Some(Vec::new())).map(|_| ())
    }

    fn broker_connection(&mut self, id: i32) -> Result<&mut BrokerConnection> {
        if !self.connections.contains_key(&id) {
            let broker = self
                .brokers
                .iter()
                .find(|b| b.id == id)
                .ok_or_else(|| OpsError::protocol("route request", format!("unknown broker id {}", id)))?;
            let connection = BrokerConnection::open(&broker.address(), &self.config, self.tls.as_ref())?;
            self.connections.insert(id, connection);
        }
        self.connections
            .get_mut(&id)
            .ok_or_else(|| OpsError::protocol("route request", format!("no connection to broker {}", id)))
    }

    fn controller(&mut self) -> Result<&mut BrokerConnection> {
        if self.controller_id < 0 {
            self.refresh_brokers()?;
        }
        let id = self.controller_id;
        self.broker_connection(id)
    }

    /// Topic-level overrides for each named topic
    fn describe_topic_configs(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, BTreeMap<String, String>>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let resources = names
            .iter()
            .map(|name| {
                DescribeConfigsResource::default()
                    .with_resource_type(RESOURCE_TYPE_TOPIC)
                    .with_resource_name(str_bytes(name))
                    .with_configuration_keys(None)
            })
            .collect();
        let request = DescribeConfigsRequest::default().with_resources(resources);
        let response: DescribeConfigsResponse =
            self.bootstrap
                .send(ApiKey::DescribeConfigs, DESCRIBE_CONFIGS_VERSION, &request)?;

        let mut configs = HashMap::new();
        for result in response.results {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
            let overrides = result
                .configs
                .iter()
                .filter(|c| c.config_source == CONFIG_SOURCE_DYNAMIC_TOPIC)
                .filter_map(|c| {
                    c.value
                        .as_ref()
                        .map(|v| (c.name.as_str().to_string(), v.as_str().to_string()))
                })
                .collect();
            configs.insert(result.resource_name.as_str().to_string(), overrides);
        }
        Ok(configs)
    }
}

fn acl_filter_fields(filter: &AclFilter) -> (Option<StrBytes>, Option<StrBytes>, Option<StrBytes>) {
    (
        filter.resource_name.as_deref().map(str_bytes),
        filter.principal.as_deref().map(str_bytes),
        filter.host.as_deref().map(str_bytes),
    )
}

impl ClusterAdmin for KafkaAdmin {
    fn describe_cluster(&mut self) -> Result<Vec<BrokerInfo>> {
        self.refresh_brokers()?;
        Ok(self.brokers.clone())
    }

    fn list_topics(&mut self) -> Result<BTreeMap<String, TopicDetail>> {
        let metadata = self.metadata(None)?;

        let mut topics = BTreeMap::new();
        for topic in &metadata.topics {
            let Some(name) = topic.name.as_ref() else {
                continue;
            };
            check_error_code(topic.error_code, None)?;

            let replication_factor = topic
                .partitions
                .iter()
                .min_by_key(|p| p.partition_index)
                .map_or(0, |p| p.replica_nodes.len() as i16);
            topics.insert(
                name.as_str().to_string(),
                TopicDetail {
                    partitions: topic.partitions.len() as i32,
                    replication_factor,
                    configs: BTreeMap::new(),
                },
            );
        }

        let names: Vec<String> = topics.keys().cloned().collect();
        let mut configs = self.describe_topic_configs(&names)?;
        for (name, detail) in topics.iter_mut() {
            if let Some(overrides) = configs.remove(name) {
                detail.configs = overrides;
            }
        }

        debug!(count = topics.len(), "Listed topics");
        Ok(topics)
    }

    fn create_topic(&mut self, name: &str, detail: &TopicDetail) -> Result<()> {
        let request = create_topics_request(name, detail);
        let partitions = request.topics.first().map_or(-1, |t| t.num_partitions);

        let response: CreateTopicsResponse =
            self.controller()?
                .send(ApiKey::CreateTopics, CREATE_TOPICS_VERSION, &request)?;
        for result in &response.topics {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
        }
        info!(topic = %name, partitions, replication_factor = detail.replication_factor, "Created topic");
        Ok(())
    }

    fn delete_topic(&mut self, name: &str) -> Result<()> {
        let request = DeleteTopicsRequest::default()
            .with_topic_names(vec![topic_name(name)])
            .with_timeout_ms(OPERATION_TIMEOUT_MS);

        let response: DeleteTopicsResponse =
            self.controller()?
                .send(ApiKey::DeleteTopics, DELETE_TOPICS_VERSION, &request)?;
        for result in &response.responses {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
        }
        info!(topic = %name, "Deleted topic");
        Ok(())
    }

    fn create_partitions(&mut self, name: &str, count: i32) -> Result<()> {
        let topic = CreatePartitionsTopic::default()
            .with_name(topic_name(name))
            .with_count(count)
            .with_assignments(None);
        let request = CreatePartitionsRequest::default()
            .with_topics(vec![topic])
            .with_timeout_ms(OPERATION_TIMEOUT_MS)
            .with_validate_only(false);

        let response: CreatePartitionsResponse =
            self.controller()?
                .send(ApiKey::CreatePartitions, CREATE_PARTITIONS_VERSION, &request)?;
        for result in &response.results {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
        }
        info!(topic = %name, count, "Increased partition count");
        Ok(())
    }

    fn alter_topic_config(&mut self, name: &str, configs: &BTreeMap<String, String>) -> Result<()> {
        let entries = configs
            .iter()
            .map(|(k, v)| {
                AlterableConfig::default()
                    .with_name(str_bytes(k))
                    .with_value(Some(str_bytes(v)))
            })
            .collect();
        let resource = AlterConfigsResource::default()
            .with_resource_type(RESOURCE_TYPE_TOPIC)
            .with_resource_name(str_bytes(name))
            .with_configs(entries);
        let request = AlterConfigsRequest::default()
            .with_resources(vec![resource])
            .with_validate_only(false);

        let response: AlterConfigsResponse =
            self.bootstrap
                .send(ApiKey::AlterConfigs, ALTER_CONFIGS_VERSION, &request)?;
        for result in &response.responses {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
        }
        info!(topic = %name, entries = configs.len(), "Altered topic config");
        Ok(())
    }

    fn list_consumer_groups(&mut self) -> Result<BTreeSet<String>> {
        self.refresh_brokers()?;
        let ids: Vec<i32> = self.brokers.iter().map(|b| b.id).collect();

        let mut groups = BTreeSet::new();
        for id in ids {
            let response: ListGroupsResponse = self.broker_connection(id)?.send(
                ApiKey::ListGroups,
                LIST_GROUPS_VERSION,
                &ListGroupsRequest::default(),
            )?;
            check_error_code(response.error_code, None)?;
            groups.extend(response.groups.iter().map(|g| g.group_id.as_str().to_string()));
        }

        debug!(count = groups.len(), "Listed consumer groups");
        Ok(groups)
    }

    fn delete_consumer_group(&mut self, name: &str) -> Result<()> {
        let request = FindCoordinatorRequest::default()
            .with_key(str_bytes(name))
            .with_key_type(COORDINATOR_KEY_GROUP);
        let coordinator: FindCoordinatorResponse =
            self.bootstrap
                .send(ApiKey::FindCoordinator, FIND_COORDINATOR_VERSION, &request)?;
        check_error_code(
            coordinator.error_code,
            optional_message(&coordinator.error_message),
        )?;

        let BrokerId(node_id) = coordinator.node_id;
        if !self.brokers.iter().any(|b| b.id == node_id) {
            self.brokers.push(BrokerInfo {
                id: node_id,
                host: coordinator.host.as_str().to_string(),
                port: coordinator.port,
            });
        }

        let request =
            DeleteGroupsRequest::default().with_groups_names(vec![GroupId(str_bytes(name))]);
        let response: DeleteGroupsResponse = self.broker_connection(node_id)?.send(
            ApiKey::DeleteGroups,
            DELETE_GROUPS_VERSION,
            &request,
        )?;
        for result in &response.results {
            check_error_code(result.error_code, None)?;
        }
        info!(group = %name, coordinator = node_id, "Deleted consumer group");
        Ok(())
    }

    fn list_acls(&mut self, filter: &AclFilter) -> Result<Vec<ResourceAcls>> {
        let (resource_name, principal, host) = acl_filter_fields(filter);
        let request = DescribeAclsRequest::default()
            .with_resource_type_filter(filter.resource_type.to_code())
            .with_resource_name_filter(resource_name)
            .with_pattern_type_filter(filter.pattern_type.to_code())
            .with_principal_filter(principal)
            .with_host_filter(host)
            .with_operation(filter.operation.to_code())
            .with_permission_type(filter.permission_type.to_code());

        let response: DescribeAclsResponse =
            self.bootstrap
                .send(ApiKey::DescribeAcls, DESCRIBE_ACLS_VERSION, &request)?;
        check_error_code(response.error_code, optional_message(&response.error_message))?;

        let acls: Vec<ResourceAcls> = response
            .resources
            .iter()
            .map(|r| ResourceAcls {
                resource: AclResource {
                    resource_type: AclResourceType::from_code(r.resource_type),
                    name: r.resource_name.as_str().to_string(),
                    pattern_type: AclPatternType::from_code(r.pattern_type),
                },
                acls: r
                    .acls
                    .iter()
                    .map(|a| AclEntry {
                        principal: a.principal.as_str().to_string(),
                        host: a.host.as_str().to_string(),
                        operation: AclOperation::from_code(a.operation),
                        permission_type: AclPermissionType::from_code(a.permission_type),
                    })
                    .collect(),
            })
            .collect();

        debug!(resources = acls.len(), "Listed ACLs");
        Ok(acls)
    }

    fn create_acl(&mut self, resource: &AclResource, entry: &AclEntry) -> Result<()> {
        let creation = AclCreation::default()
            .with_resource_type(resource.resource_type.to_code())
            .with_resource_name(str_bytes(&resource.name))
            .with_resource_pattern_type(resource.pattern_type.to_code())
            .with_principal(str_bytes(&entry.principal))
            .with_host(str_bytes(&entry.host))
            .with_operation(entry.operation.to_code())
            .with_permission_type(entry.permission_type.to_code());
        let request = CreateAclsRequest::default().with_creations(vec![creation]);

        let response: CreateAclsResponse =
            self.bootstrap
                .send(ApiKey::CreateAcls, CREATE_ACLS_VERSION, &request)?;
        for result in &response.results {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
        }
        info!(
            principal = %entry.principal,
            resource = %resource.name,
            operation = %entry.operation,
            permission = %entry.permission_type,
            "Created ACL"
        );
        Ok(())
    }

    fn delete_acls(&mut self, filter: &AclFilter) -> Result<usize> {
        let (resource_name, principal, host) = acl_filter_fields(filter);
        let delete_filter = DeleteAclsFilter::default()
            .with_resource_type_filter(filter.resource_type.to_code())
            .with_resource_name_filter(resource_name)
            .with_pattern_type_filter(filter.pattern_type.to_code())
            .with_principal_filter(principal)
            .with_host_filter(host)
            .with_operation(filter.operation.to_code())
            .with_permission_type(filter.permission_type.to_code());
        let request = DeleteAclsRequest::default().with_filters(vec![delete_filter]);

        let response: DeleteAclsResponse =
            self.bootstrap
                .send(ApiKey::DeleteAcls, DELETE_ACLS_VERSION, &request)?;

        let mut removed = 0;
        for result in &response.filter_results {
            check_error_code(result.error_code, optional_message(&result.error_message))?;
            for matching in &result.matching_acls {
                check_error_code(matching.error_code, optional_message(&matching.error_message))?;
            }
            removed += result.matching_acls.len();
        }
        info!(removed, "Deleted ACLs");
        Ok(removed)
    }
}

/// CreateTopics request for one topic; a partition count of 0 asks for the broker default
fn create_topics_request(name: &str, detail: &TopicDetail) -> CreateTopicsRequest {
    let configs = detail
        .configs
        .iter()
        .map(|(k, v)| {
            CreatableTopicConfig::default()
                .with_name(str_bytes(k))
                .with_value(Some(str_bytes(v)))
        })
        .collect();
    let partitions = if detail.partitions > 0 { detail.partitions } else { -1 };
    let topic = CreatableTopic::default()
        .with_name(topic_name(name))
        .with_num_partitions(partitions)
        .with_replication_factor(detail.replication_factor)
        .with_configs(configs);
    CreateTopicsRequest::default()
        .with_topics(vec![topic])
        .with_timeout_ms(OPERATION_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_topics_request_carries_configs() {
        let detail = TopicDetail {
            partitions: 0,
            replication_factor: 2,
            configs: [("retention.ms".to_string(), "1000".to_string())].into(),
        };
        let request = create_topics_request("orders", &detail);

        let topic = &request.topics[0];
        assert_eq!(topic.name.as_str(), "orders");
        assert_eq!(topic.num_partitions, -1);
        assert_eq!(topic.replication_factor, 2);
        assert_eq!(topic.configs[0].name.as_str(), "retention.ms");
        assert_eq!(topic.configs[0].value.as_ref().map(|v| v.as_str()), Some("1000"));
    }

    #[test]
    fn test_filter_fields_pass_through() {
        let mut filter = AclFilter::match_all();
        assert_eq!(acl_filter_fields(&filter), (None, None, None));

        filter.resource_name = Some("orders".into());
        filter.host = Some("10.0.0.1".into());
        let (name, principal, host) = acl_filter_fields(&filter);
        assert_eq!(name.as_ref().map(|s| s.as_str()), Some("orders"));
        assert!(principal.is_none());
        assert_eq!(host.as_ref().map(|s| s.as_str()), Some("10.0.0.1"));
    }

    #[test]
    fn test_connect_fails_without_reachable_broker() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = ConnectionConfig {
            brokers: vec![address],
            connect_timeout: std::time::Duration::from_millis(200),
            ..ConnectionConfig::default()
        };
        assert!(KafkaAdmin::connect(config).is_err());
    }
}
