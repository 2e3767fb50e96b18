//! Desired-state document
//!
//! The spec manifest lists topics, ACLs and consumer groups plus an optional
//! connection block. Values are kept close to what the operator wrote; the
//! reconcilers normalize them when they act on an item.

mod loader;
mod template;

pub use loader::{SpecFormat, SpecLoader};
pub use template::{render_template, TemplateVars};

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// State value that requests removal
pub const STATE_ABSENT: &str = "absent";
/// State value that requests existence
pub const STATE_PRESENT: &str = "present";
/// Config value that requests removal of a topic-level override
pub const DEFAULT_CONFIG_VALUE: &str = "default";

/// Root of a spec manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub acls: Vec<Acl>,
    #[serde(
        default,
        rename = "consumer-groups",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub consumer_groups: Vec<ConsumerGroup>,
    #[serde(default, skip_serializing_if = "Connection::is_empty")]
    pub connection: Connection,
}

impl Spec {
    /// Add an ACL, folding it into an existing principal and resource when possible
    ///
    /// Permissions sharing a resource with one already listed for the same
    /// principal have their allow/deny tokens appended to that entry.
    pub fn add_acl(&mut self, acl: Acl) {
        let Some(existing) = self
            .acls
            .iter_mut()
            .find(|a| a.principal == acl.principal)
        else {
            self.acls.push(acl);
            return;
        };

        for permission in acl.permissions {
            match existing
                .permissions
                .iter_mut()
                .find(|p| p.resource == permission.resource)
            {
                Some(current) => {
                    current.allow.extend(permission.allow);
                    current.deny.extend(permission.deny);
                }
                None => existing.permissions.push(permission),
            }
        }
    }

    /// Returns true if the manifest declares nothing to reconcile
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.acls.is_empty() && self.consumer_groups.is_empty()
    }
}

/// A topic declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub partitions: i32,
    #[serde(default)]
    pub replication_factor: i32,
    #[serde(default, deserialize_with = "scalar_map")]
    pub configs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, rename = "patternType", skip_serializing_if = "String::is_empty")]
    pub pattern_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<String>,
}

impl Topic {
    /// Create a topic declaration with the given shape
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
            ..Default::default()
        }
    }

    /// Set a config override
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configs.insert(key.into(), value.into());
        self
    }

    pub fn is_absent(&self) -> bool {
        is_absent(&self.state)
    }
}

/// ACLs granted to or removed from one principal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default)]
    pub principal: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Allow/deny rules on a single resource
///
/// Each rule is an `OPERATION:HOST` token; the host part is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub resource: Resource,
    #[serde(default, rename = "allow_operations", skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    #[serde(default, rename = "deny_operations", skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
}

impl Permission {
    pub fn is_absent(&self) -> bool {
        is_absent(&self.state)
    }
}

/// Resource an ACL applies to
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default, rename = "patternType")]
    pub pattern_type: String,
}

impl Resource {
    pub fn new(
        resource_type: impl Into<String>,
        pattern: impl Into<String>,
        pattern_type: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            pattern: pattern.into(),
            pattern_type: pattern_type.into(),
        }
    }
}

/// A single allow or deny rule expanded from a [`Permission`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleAcl {
    pub permission_type: String,
    pub principal: String,
    pub resource: Resource,
    pub operation: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub state: String,
}

impl SingleAcl {
    pub fn is_absent(&self) -> bool {
        is_absent(&self.state)
    }
}

/// A consumer group to delete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, rename = "patternType", skip_serializing_if = "String::is_empty")]
    pub pattern_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<String>,
}

impl ConsumerGroup {
    pub fn is_absent(&self) -> bool {
        is_absent(&self.state)
    }
}

/// Broker connection overrides carried by the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub broker: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mechanism: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl Connection {
    pub fn is_empty(&self) -> bool {
        self.broker.is_empty()
            && self.protocol.is_empty()
            && self.mechanism.is_empty()
            && self.username.is_empty()
            && self.password.is_empty()
    }
}

/// Split an `OPERATION:HOST` rule at its first colon
///
/// A rule without a colon has an empty host.
pub fn split_rule(rule: &str) -> (&str, &str) {
    rule.split_once(':').unwrap_or((rule, ""))
}

fn is_absent(state: &str) -> bool {
    state.eq_ignore_ascii_case(STATE_ABSENT)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// Config maps accept numbers and booleans as written in YAML
fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Scalar>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.into_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
topics:
  - name: orders
    partitions: 3
    replication_factor: 1
    configs:
      retention.ms: 86400000
      cleanup.policy: compact
  - name: tmp_
    state: absent
    patternType: prefixed
acls:
  - principal: User:alice
    permissions:
      - resource:
          type: topic
          pattern: orders
          patternType: LITERAL
        allow_operations: ["READ:*", "DESCRIBE"]
        deny_operations: ["WRITE:10.0.0.1"]
consumer-groups:
  - name: "grou[a-z]"
    patternType: match
    state: absent
connection:
  broker: kafka1:9092
  protocol: SASL_SSL
"#;

    #[test]
    fn test_parse_sample_manifest() {
        let spec: Spec = serde_yaml::from_str(SAMPLE_YAML).unwrap();

        assert_eq!(spec.topics.len(), 2);
        let orders = &spec.topics[0];
        assert_eq!(orders.name, "orders");
        assert_eq!(orders.partitions, 3);
        assert_eq!(orders.replication_factor, 1);
        assert_eq!(orders.configs.get("retention.ms").unwrap(), "86400000");
        assert_eq!(orders.configs.get("cleanup.policy").unwrap(), "compact");
        assert!(!orders.is_absent());
        assert!(spec.topics[1].is_absent());
        assert_eq!(spec.topics[1].pattern_type, "prefixed");

        let permission = &spec.acls[0].permissions[0];
        assert_eq!(permission.resource.resource_type, "topic");
        assert_eq!(permission.allow, vec!["READ:*", "DESCRIBE"]);
        assert_eq!(permission.deny, vec!["WRITE:10.0.0.1"]);

        assert_eq!(spec.consumer_groups[0].name, "grou[a-z]");
        assert!(spec.consumer_groups[0].is_absent());
        assert_eq!(spec.connection.broker, "kafka1:9092");
        assert_eq!(spec.connection.protocol, "SASL_SSL");
    }

    #[test]
    fn test_minimal_topic_defaults() {
        let spec: Spec = serde_yaml::from_str("topics:\n  - name: events\n").unwrap();
        let topic = &spec.topics[0];
        assert_eq!(topic.partitions, 0);
        assert_eq!(topic.replication_factor, 0);
        assert!(topic.configs.is_empty());
        assert!(topic.state.is_empty());
        assert!(spec.acls.is_empty());
        assert!(spec.connection.is_empty());
    }

    #[test]
    fn test_null_configs_are_empty() {
        let spec: Spec =
            serde_json::from_str(r#"{"topics":[{"name":"a","configs":null}]}"#).unwrap();
        assert!(spec.topics[0].configs.is_empty());
    }

    #[test]
    fn test_serialize_skips_empty_optional_fields() {
        let mut spec = Spec::default();
        spec.topics.push(Topic::new("orders", 3, 1));

        let yaml = serde_yaml::to_string(&spec).unwrap();
        assert!(yaml.contains("replication_factor: 1"));
        assert!(!yaml.contains("consumer-groups"));
        assert!(!yaml.contains("connection"));
        assert!(!yaml.contains("state"));
        assert!(!yaml.contains("matched"));
    }

    #[test]
    fn test_single_acl_json_shape() {
        let acl = SingleAcl {
            permission_type: "ALLOW".into(),
            principal: "User:alice".into(),
            resource: Resource::new("topic", "orders", "LITERAL"),
            operation: "READ".into(),
            host: String::new(),
            state: STATE_ABSENT.into(),
        };
        let json = serde_json::to_value(&acl).unwrap();
        assert_eq!(json["permission_type"], "ALLOW");
        assert_eq!(json["resource"]["type"], "topic");
        assert_eq!(json["resource"]["patternType"], "LITERAL");
        assert!(json.get("host").is_none());
        assert!(acl.is_absent());
    }

    #[test]
    fn test_split_rule() {
        assert_eq!(split_rule("READ:*"), ("READ", "*"));
        assert_eq!(split_rule("WRITE"), ("WRITE", ""));
        assert_eq!(split_rule("READ:"), ("READ", ""));
        assert_eq!(split_rule("READ:fe80::1"), ("READ", "fe80::1"));
    }

    #[test]
    fn test_add_acl_merges_by_principal_and_resource() {
        let resource = Resource::new("topic", "orders", "LITERAL");
        let mut spec = Spec::default();

        spec.add_acl(Acl {
            principal: "User:alice".into(),
            permissions: vec![Permission {
                resource: resource.clone(),
                allow: vec!["READ:*".into()],
                ..Default::default()
            }],
        });
        spec.add_acl(Acl {
            principal: "User:alice".into(),
            permissions: vec![Permission {
                resource: resource.clone(),
                deny: vec!["WRITE:*".into()],
                ..Default::default()
            }],
        });
        spec.add_acl(Acl {
            principal: "User:alice".into(),
            permissions: vec![Permission {
                resource: Resource::new("group", "billing", "PREFIXED"),
                allow: vec!["READ:*".into()],
                ..Default::default()
            }],
        });
        spec.add_acl(Acl {
            principal: "User:bob".into(),
            permissions: vec![Permission {
                resource,
                allow: vec!["DESCRIBE:*".into()],
                ..Default::default()
            }],
        });

        assert_eq!(spec.acls.len(), 2);
        let alice = &spec.acls[0];
        assert_eq!(alice.permissions.len(), 2);
        assert_eq!(alice.permissions[0].allow, vec!["READ:*"]);
        assert_eq!(alice.permissions[0].deny, vec!["WRITE:*"]);
        assert_eq!(spec.acls[1].principal, "User:bob");
    }
}
