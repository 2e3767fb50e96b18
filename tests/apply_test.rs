//! End-to-end apply tests against the in-memory cluster
//!
//! Each test loads a manifest, runs the reconciler and checks both the
//! reported outcomes and the calls that reached the cluster.

use kafka_ops::acl::{AclOperation, AclPatternType, AclPermissionType, AclResourceType};
use kafka_ops::admin::{AclEntry, AclResource, AdminCall, TopicDetail};
use kafka_ops::{
    dump_cluster, ApplyOptions, InMemoryCluster, ItemReport, ItemStatus, KafkaErrorCode,
    Reconciler, RunSummary, Spec, SpecLoader,
};

fn load(yaml: &str) -> Spec {
    SpecLoader::new().load_str(yaml).unwrap()
}

fn apply(cluster: &mut InMemoryCluster, spec: &Spec) -> (RunSummary, Vec<ItemReport>) {
    apply_with(cluster, spec, ApplyOptions::default())
}

fn apply_with(
    cluster: &mut InMemoryCluster,
    spec: &Spec,
    options: ApplyOptions,
) -> (RunSummary, Vec<ItemReport>) {
    let mut reports: Vec<ItemReport> = Vec::new();
    let summary = Reconciler::new(cluster, options)
        .run(spec, &mut reports)
        .unwrap();
    (summary, reports)
}

fn alice_reads_orders() -> (AclResource, AclEntry) {
    (
        AclResource {
            resource_type: AclResourceType::Topic,
            name: "orders".into(),
            pattern_type: AclPatternType::Literal,
        },
        AclEntry {
            principal: "User:alice".into(),
            host: "*".into(),
            operation: AclOperation::Read,
            permission_type: AclPermissionType::Allow,
        },
    )
}

#[test]
fn test_matching_topic_is_ok() {
    let mut cluster = InMemoryCluster::new(1)
        .with_topic("orders", 3, 1)
        .with_topic_config("orders", "retention.ms", "1000");
    let spec = load(
        r#"
topics:
  - name: orders
    partitions: 3
    replication_factor: 1
    configs:
      retention.ms: 1000
"#,
    );

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(reports[0].status, ItemStatus::Ok);
    assert_eq!(
        summary,
        RunSummary {
            ok: 1,
            changed: 0,
            failed: 0
        }
    );
    assert!(cluster.mutations().is_empty());
}

#[test]
fn test_missing_topic_is_created_as_declared() {
    let mut cluster = InMemoryCluster::new(1);
    let spec = load("topics:\n  - name: orders\n    partitions: 3\n    replication_factor: 1\n");

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(reports[0].status, ItemStatus::Changed);
    assert_eq!(summary.changed, 1);
    assert!(cluster.mutations().contains(&&AdminCall::CreateTopic {
        name: "orders".into(),
        detail: TopicDetail {
            partitions: 3,
            replication_factor: 1,
            configs: Default::default(),
        },
    }));
}

#[test]
fn test_prefixed_deletion_leaves_other_topics() {
    let mut cluster = InMemoryCluster::new(1)
        .with_topic("tmp_a", 1, 1)
        .with_topic("tmp_b", 1, 1)
        .with_topic("orders", 1, 1);
    let spec = load("topics:\n  - name: tmp_\n    state: absent\n    patternType: prefixed\n");

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(
        reports[0].detail["matched"],
        serde_json::json!(["tmp_a", "tmp_b"])
    );
    assert_eq!(summary.changed, 2);
    assert_eq!(cluster.topics().keys().collect::<Vec<_>>(), vec!["orders"]);
}

#[test]
fn test_second_apply_changes_nothing() {
    let mut cluster = InMemoryCluster::new(3)
        .with_topic("orders", 3, 2)
        .with_group("legacy-reader");
    let spec = load(
        r#"
topics:
  - name: orders
    partitions: 6
    configs:
      cleanup.policy: compact
  - name: events
    partitions: 1
acls:
  - principal: User:alice
    permissions:
      - resource:
          type: topic
          pattern: orders
        allow_operations: ["READ", "DESCRIBE:*"]
consumer-groups:
  - name: legacy-
    patternType: prefixed
    state: absent
"#,
    );

    let (first, _) = apply(&mut cluster, &spec);
    assert_eq!(first.changed, 5);
    assert_eq!(first.failed, 0);

    let (second, reports) = apply(&mut cluster, &spec);
    assert_eq!(second.changed, 0);
    assert_eq!(second.failed, 0);
    assert!(reports.iter().all(|r| r.status == ItemStatus::Ok));
}

#[test]
fn test_absent_acl_that_does_not_exist_is_ok() {
    let mut cluster = InMemoryCluster::new(1);
    let spec = load(
        r#"
acls:
  - principal: User:alice
    permissions:
      - resource:
          type: topic
          pattern: orders
          patternType: LITERAL
        allow_operations: ["READ"]
        state: absent
"#,
    );

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(reports[0].status, ItemStatus::Ok);
    assert_eq!(summary.changed, 0);
}

#[test]
fn test_empty_principal_never_reaches_cluster() {
    let mut cluster = InMemoryCluster::new(1);
    let spec = load(
        r#"
acls:
  - permissions:
      - resource:
          type: topic
          pattern: orders
        allow_operations: ["READ"]
        deny_operations: ["WRITE"]
"#,
    );

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(summary.failed, 2);
    assert!(reports.iter().all(|r| r.message == "Principal not defined"));
    assert!(cluster.mutations().is_empty());
}

#[test]
fn test_identical_live_acl_is_ok() {
    let (resource, entry) = alice_reads_orders();
    let mut cluster = InMemoryCluster::new(1).with_acl(resource, entry);
    let spec = load(
        r#"
acls:
  - principal: User:alice
    permissions:
      - resource:
          type: TOPIC
          pattern: orders
          patternType: literal
        allow_operations: ["READ:*"]
"#,
    );

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(reports[0].status, ItemStatus::Ok);
    assert_eq!(summary.ok, 1);
    assert!(cluster.mutations().is_empty());
}

#[test]
fn test_consumer_group_regex_deletion() {
    let mut cluster = InMemoryCluster::new(1)
        .with_group("my_group")
        .with_group("other");
    let spec = load(
        r#"
consumer-groups:
  - name: "grou[a-z]"
    patternType: match
    state: absent
"#,
    );

    let (summary, reports) = apply(&mut cluster, &spec);

    assert_eq!(reports[0].status, ItemStatus::Changed);
    assert_eq!(reports[0].detail["matched"], serde_json::json!(["my_group"]));
    assert_eq!(summary.changed, 1);
    assert!(cluster.groups().contains("other"));
    assert!(!cluster.groups().contains("my_group"));
}

#[test]
fn test_dump_applies_back_without_changes() {
    let (resource, entry) = alice_reads_orders();
    let mut cluster = InMemoryCluster::new(3)
        .with_topic("orders", 6, 2)
        .with_topic_config("orders", "retention.ms", "86400000")
        .with_topic("events", 1, 1)
        .with_topic("__consumer_offsets", 50, 3)
        .with_acl(resource.clone(), entry.clone())
        .with_acl(
            resource,
            AclEntry {
                host: "10.0.0.1".into(),
                operation: AclOperation::Write,
                permission_type: AclPermissionType::Deny,
                ..entry
            },
        )
        .with_acl(
            AclResource {
                resource_type: AclResourceType::Cluster,
                name: "kafka-cluster".into(),
                pattern_type: AclPatternType::Literal,
            },
            AclEntry {
                principal: "User:admin".into(),
                host: "*".into(),
                operation: AclOperation::Alter,
                permission_type: AclPermissionType::Allow,
            },
        );

    let spec = dump_cluster(&mut cluster).unwrap();
    cluster.clear_calls();

    let (summary, _) = apply(&mut cluster, &spec);

    assert_eq!(summary.changed, 0);
    assert_eq!(summary.failed, 0);
    assert!(cluster.mutations().is_empty());
}

#[test]
fn test_failures_make_the_run_unsuccessful() {
    let mut cluster = InMemoryCluster::new(1).fail_when(|call| match call {
        AdminCall::CreateTopic { name, .. } if name == "locked" => {
            Some(KafkaErrorCode::TopicAuthorizationFailed)
        }
        _ => None,
    });
    let spec = load("topics:\n  - name: locked\n  - name: open\n");

    let (summary, reports) = apply(&mut cluster, &spec);

    assert!(reports[0].is_error());
    assert_eq!(reports[1].status, ItemStatus::Changed);
    assert!(!summary.is_success());
}

#[test]
fn test_stop_on_error_stops_the_run() {
    let mut cluster = InMemoryCluster::new(1)
        .with_group("billing")
        .fail_when(|call| {
            matches!(call, AdminCall::CreateTopic { .. })
                .then_some(KafkaErrorCode::PolicyViolation)
        });
    let spec = load(
        r#"
topics:
  - name: a
  - name: b
consumer-groups:
  - name: billing
    state: absent
"#,
    );

    let (summary, reports) = apply_with(
        &mut cluster,
        &spec,
        ApplyOptions {
            stop_on_error: true,
        },
    );

    assert_eq!(reports.len(), 1);
    assert_eq!(summary.failed, 1);
    assert!(cluster.groups().contains("billing"));
}

#[test]
fn test_stop_on_error_stops_inside_the_acl_phase() {
    let mut cluster = InMemoryCluster::new(1).fail_when(|call| {
        matches!(call, AdminCall::CreateAcl(..))
            .then_some(KafkaErrorCode::ClusterAuthorizationFailed)
    });
    let spec = load(
        r#"
acls:
  - principal: User:alice
    permissions:
      - resource:
          type: topic
          pattern: orders
        allow_operations: ["READ", "WRITE"]
        deny_operations: ["DELETE"]
      - resource:
          type: group
          pattern: billing
        allow_operations: ["READ"]
  - principal: User:bob
    permissions:
      - resource:
          type: topic
          pattern: payments
        allow_operations: ["READ", "DESCRIBE"]
      - resource:
          type: topic
          pattern: legacy
        allow_operations: ["WRITE"]
        state: absent
"#,
    );

    let (summary, reports) = apply_with(
        &mut cluster,
        &spec,
        ApplyOptions {
            stop_on_error: true,
        },
    );

    assert_eq!(reports.len(), 1);
    assert_eq!(summary.failed, 1);
    let acl_mutations: Vec<_> = cluster
        .calls()
        .iter()
        .filter(|c| matches!(c, AdminCall::CreateAcl(..) | AdminCall::DeleteAcls(_)))
        .collect();
    assert_eq!(acl_mutations.len(), 1);
}
