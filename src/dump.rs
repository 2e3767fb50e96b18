//! Export live cluster state as a spec manifest
//!
//! The output can be applied back to the same cluster without changes.

use crate::acl::AclPermissionType;
use crate::admin::{AclFilter, ClusterAdmin};
use crate::error::{OpsError, Result};
use crate::pattern::is_internal;
use crate::spec::{Acl, Permission, Resource, Spec, Topic};
use serde::Serialize;
use tracing::debug;

/// Manifest format for dumps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DumpFormat {
    #[default]
    Yaml,
    Json,
}

/// Read topics and ACLs from the cluster into a [`Spec`]
///
/// Internal topics are left out. ACLs sharing principal and resource are
/// folded into one permission.
pub fn dump_cluster<A: ClusterAdmin + ?Sized>(admin: &mut A) -> Result<Spec> {
    let mut spec = Spec::default();

    for (name, detail) in admin.list_topics()? {
        if is_internal(&name) {
            continue;
        }
        spec.topics.push(Topic {
            configs: detail.configs,
            ..Topic::new(name, detail.partitions, i32::from(detail.replication_factor))
        });
    }

    for group in admin.list_acls(&AclFilter::match_all())? {
        let resource = Resource::new(
            group.resource.resource_type.as_str(),
            group.resource.name.clone(),
            group.resource.pattern_type.as_str(),
        );
        for entry in group.acls {
            let token = format!("{}:{}", entry.operation, entry.host);
            let mut permission = Permission {
                resource: resource.clone(),
                ..Default::default()
            };
            match entry.permission_type {
                AclPermissionType::Deny => permission.deny.push(token),
                _ => permission.allow.push(token),
            }
            spec.add_acl(Acl {
                principal: entry.principal,
                permissions: vec![permission],
            });
        }
    }

    debug!(topics = spec.topics.len(), principals = spec.acls.len(), "Dumped cluster");
    Ok(spec)
}

/// Render a spec as YAML, or as JSON indented by four spaces
pub fn render(spec: &Spec, format: DumpFormat) -> Result<String> {
    match format {
        DumpFormat::Yaml => serde_yaml::to_string(spec)
            .map_err(|e| OpsError::Parse(format!("Failed to export to YAML: {}", e))),
        DumpFormat::Json => {
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            spec.serialize(&mut serializer)?;
            String::from_utf8(out).map_err(|e| OpsError::Parse(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AclOperation, AclPatternType, AclResourceType};
    use crate::admin::{AclEntry, AclResource, InMemoryCluster};

    fn cluster() -> InMemoryCluster {
        let resource = AclResource {
            resource_type: AclResourceType::Topic,
            name: "orders".into(),
            pattern_type: AclPatternType::Literal,
        };
        let entry = |operation, permission_type| AclEntry {
            principal: "User:alice".into(),
            host: "*".into(),
            operation,
            permission_type,
        };
        InMemoryCluster::new(1)
            .with_topic("orders", 3, 1)
            .with_topic_config("orders", "retention.ms", "1000")
            .with_topic("__consumer_offsets", 50, 1)
            .with_acl(resource.clone(), entry(AclOperation::Read, AclPermissionType::Allow))
            .with_acl(resource, entry(AclOperation::Write, AclPermissionType::Deny))
    }

    #[test]
    fn test_dump_folds_acls_and_skips_internal_topics() {
        let spec = dump_cluster(&mut cluster()).unwrap();

        assert_eq!(spec.topics.len(), 1);
        assert_eq!(spec.topics[0].name, "orders");
        assert_eq!(spec.topics[0].configs.get("retention.ms").unwrap(), "1000");

        assert_eq!(spec.acls.len(), 1);
        let permission = &spec.acls[0].permissions[0];
        assert_eq!(permission.resource, Resource::new("topic", "orders", "LITERAL"));
        assert_eq!(permission.allow, vec!["READ:*"]);
        assert_eq!(permission.deny, vec!["WRITE:*"]);
    }

    #[test]
    fn test_render_json_uses_four_spaces() {
        let mut spec = Spec::default();
        spec.topics.push(Topic::new("orders", 3, 1));
        let json = render(&spec, DumpFormat::Json).unwrap();

        assert!(json.starts_with("{\n    \"topics\": ["));
        let parsed: Spec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_render_yaml_parses_back() {
        let spec = dump_cluster(&mut cluster()).unwrap();
        let yaml = render(&spec, DumpFormat::Yaml).unwrap();
        let parsed: Spec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, spec);
    }
}
