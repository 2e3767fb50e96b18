//! ACL phase
//!
//! Declared ACLs are grouped by principal and resource. Every allow/deny
//! token is expanded into a [`SingleAcl`] and aligned on its own: present
//! rules are created when no identical entry exists, absent rules become a
//! delete filter.

use super::{ItemReport, ResourceKind};
use crate::acl::{AclOperation, AclPatternType, AclPermissionType, AclResourceType};
use crate::admin::{AclEntry, AclFilter, AclResource, ClusterAdmin};
use crate::error::{OpsError, Result};
use crate::spec::{split_rule, Acl, Permission, Resource, SingleAcl, STATE_ABSENT, STATE_PRESENT};
use tracing::{debug, warn};

/// Resource name used for cluster ACLs that do not name one
pub const CLUSTER_RESOURCE_NAME: &str = "kafka-cluster";

const ANY_HOST: &str = "*";
const ANY_PRINCIPAL: &str = "*";

/// Expand a permission into one rule per allow token, then one per deny token
pub fn expand_permission(principal: &str, permission: &Permission) -> Vec<SingleAcl> {
    let mut resource = permission.resource.clone();
    if resource.pattern.is_empty() && resource.resource_type.eq_ignore_ascii_case("cluster") {
        resource.pattern = CLUSTER_RESOURCE_NAME.to_string();
    }
    if resource.pattern_type.is_empty() {
        resource.pattern_type = AclPatternType::Literal.as_str().to_string();
    }

    let state = if permission.is_absent() {
        STATE_ABSENT
    } else {
        STATE_PRESENT
    };

    let allow = permission
        .allow
        .iter()
        .map(|rule| (AclPermissionType::Allow, rule));
    let deny = permission
        .deny
        .iter()
        .map(|rule| (AclPermissionType::Deny, rule));

    allow
        .chain(deny)
        .map(|(permission_type, rule)| {
            let (operation, host) = split_rule(rule);
            let host = if host.is_empty() && state == STATE_PRESENT {
                ANY_HOST
            } else {
                host
            };
            SingleAcl {
                permission_type: permission_type.as_str().to_string(),
                principal: principal.to_string(),
                resource: resource.clone(),
                operation: operation.to_uppercase(),
                host: host.to_string(),
                state: state.to_string(),
            }
        })
        .collect()
}

/// Reconciles expanded ACL rules one at a time
///
/// The live ACL set is listed once when the phase starts; entries created by
/// the phase are added to it.
pub struct AclPhase<'a, A: ClusterAdmin + ?Sized> {
    admin: &'a mut A,
    rules: std::vec::IntoIter<SingleAcl>,
    live: Vec<(AclResource, AclEntry)>,
}

impl<'a, A: ClusterAdmin + ?Sized> AclPhase<'a, A> {
    /// Start the phase; fails if the ACLs cannot be listed
    pub fn new(admin: &'a mut A, acls: &[Acl]) -> Result<Self> {
        let live: Vec<(AclResource, AclEntry)> = admin
            .list_acls(&AclFilter::match_all())
            .map_err(|e| OpsError::RunAborted(format!("Can't list ACLs: {}", e)))?
            .into_iter()
            .flat_map(|group| {
                let resource = group.resource;
                group
                    .acls
                    .into_iter()
                    .map(move |entry| (resource.clone(), entry))
            })
            .collect();

        let rules: Vec<SingleAcl> = acls
            .iter()
            .flat_map(|acl| {
                acl.permissions
                    .iter()
                    .flat_map(|permission| expand_permission(&acl.principal, permission))
            })
            .collect();

        debug!(live = live.len(), rules = rules.len(), "Starting ACL phase");
        Ok(Self {
            admin,
            rules: rules.into_iter(),
            live,
        })
    }

    fn reconcile(&mut self, rule: SingleAcl) -> ItemReport {
        let task = task_description(&rule);

        if rule.principal.is_empty() {
            return ItemReport::failed(ResourceKind::Acl, task, "Principal not defined", &rule);
        }
        let resource_type = AclResourceType::parse(&rule.resource.resource_type);
        if resource_type == AclResourceType::Unknown {
            let message = format!("Wrong resource type: {}", rule.resource.resource_type);
            return ItemReport::failed(ResourceKind::Acl, task, message, &rule);
        }

        let resource = AclResource {
            resource_type,
            name: rule.resource.pattern.clone(),
            pattern_type: AclPatternType::parse(&rule.resource.pattern_type),
        };
        let operation = AclOperation::parse(&rule.operation);
        let permission_type = AclPermissionType::parse(&rule.permission_type);

        if rule.is_absent() {
            self.remove(rule, task, resource, operation, permission_type)
        } else {
            let entry = AclEntry {
                principal: rule.principal.clone(),
                host: rule.host.clone(),
                operation,
                permission_type,
            };
            self.create(rule, task, resource, entry)
        }
    }

    fn remove(
        &mut self,
        rule: SingleAcl,
        task: String,
        resource: AclResource,
        operation: AclOperation,
        permission_type: AclPermissionType,
    ) -> ItemReport {
        let filter = AclFilter {
            resource_type: resource.resource_type,
            resource_name: Some(resource.name),
            pattern_type: resource.pattern_type,
            principal: Some(rule.principal.clone()).filter(|p| p != ANY_PRINCIPAL),
            host: Some(rule.host.clone()).filter(|h| !h.is_empty()),
            operation,
            permission_type,
        };

        match self.admin.delete_acls(&filter) {
            Ok(0) => ItemReport::ok(ResourceKind::Acl, task, &rule),
            Ok(removed) => {
                debug!(principal = %rule.principal, removed, "Removed ACLs");
                self.live.retain(|(r, e)| !filter.matches(r, e));
                ItemReport::changed(ResourceKind::Acl, task, &rule)
            }
            Err(e) => {
                warn!(principal = %rule.principal, error = %e, "Failed to remove ACL");
                ItemReport::failed(ResourceKind::Acl, task, e.to_string(), &rule)
            }
        }
    }

    fn create(
        &mut self,
        rule: SingleAcl,
        task: String,
        resource: AclResource,
        entry: AclEntry,
    ) -> ItemReport {
        if self.live.iter().any(|(r, e)| r == &resource && e == &entry) {
            return ItemReport::ok(ResourceKind::Acl, task, &rule);
        }

        match self.admin.create_acl(&resource, &entry) {
            Ok(()) => {
                debug!(principal = %entry.principal, resource = %resource.name, "Created ACL");
                self.live.push((resource, entry));
                ItemReport::changed(ResourceKind::Acl, task, &rule)
            }
            Err(e) => {
                warn!(principal = %rule.principal, error = %e, "Failed to create ACL");
                ItemReport::failed(ResourceKind::Acl, task, e.to_string(), &rule)
            }
        }
    }
}

impl<A: ClusterAdmin + ?Sized> Iterator for AclPhase<'_, A> {
    type Item = ItemReport;

    fn next(&mut self) -> Option<ItemReport> {
        let rule = self.rules.next()?;
        Some(self.reconcile(rule))
    }
}

fn task_description(rule: &SingleAcl) -> String {
    let action = if rule.is_absent() { "Remove" } else { "Create" };
    let Resource {
        resource_type,
        pattern,
        pattern_type,
    } = &rule.resource;
    format!(
        "{} ACL ({} {}@{} to {} {}:{}:{})",
        action,
        rule.permission_type,
        rule.principal,
        rule.host,
        rule.operation,
        resource_type,
        pattern_type.to_uppercase(),
        pattern
    )
}
