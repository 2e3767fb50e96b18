//! Property-based tests for matching, enumeration tables and apply idempotence
//!
//! Uses proptest to generate random inputs and verify invariants hold
//! across a wide range of scenarios that unit tests might miss.

use kafka_ops::acl::{AclOperation, AclPatternType, AclPermissionType, AclResourceType};
use kafka_ops::spec::{Acl, ConsumerGroup, Permission, Resource, Topic};
use kafka_ops::{ApplyOptions, InMemoryCluster, ItemReport, Matcher, NamePattern, Reconciler, Spec};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Strategy for resource names drawn from a small alphabet so prefixes collide
fn name() -> impl Strategy<Value = String> {
    "[ab_]{1,6}"
}

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(name(), 0..12)
}

fn topic() -> impl Strategy<Value = Topic> {
    (
        name(),
        0..8i32,
        0..4i32,
        prop::collection::btree_map("[a-c]\\.ms", "[0-9]{1,4}|default", 0..3),
    )
        .prop_map(|(name, partitions, replication_factor, configs)| Topic {
            configs,
            ..Topic::new(name, partitions, replication_factor)
        })
}

fn acl() -> impl Strategy<Value = Acl> {
    let operations = prop::sample::subsequence(vec!["READ", "WRITE:*", "DESCRIBE:10.0.0.1"], 1..3);
    (
        "User:[a-c]",
        prop::sample::select(vec!["topic", "group", "cluster"]),
        name(),
        prop::sample::select(vec!["", "LITERAL", "prefixed"]),
        operations,
    )
        .prop_map(|(principal, resource_type, pattern, pattern_type, allow)| Acl {
            principal,
            permissions: vec![Permission {
                resource: Resource::new(resource_type, pattern, pattern_type),
                allow: allow.into_iter().map(String::from).collect(),
                ..Default::default()
            }],
        })
}

fn run(cluster: &mut InMemoryCluster, spec: &Spec) -> Vec<ItemReport> {
    let mut reports: Vec<ItemReport> = Vec::new();
    Reconciler::new(cluster, ApplyOptions::default())
        .run(spec, &mut reports)
        .unwrap();
    reports
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: prefixed selection equals filtering by `starts_with`
    #[test]
    fn prefixed_selects_exactly_the_prefix_matches(prefix in name(), live in names()) {
        let matcher = Matcher::new(&prefix, NamePattern::Prefixed).unwrap();
        let expected: Vec<String> = live.iter().filter(|n| n.starts_with(&prefix)).cloned().collect();
        prop_assert_eq!(matcher.select(&live), expected);
    }

    /// Property: literal selection yields the name itself or nothing
    #[test]
    fn literal_selects_at_most_the_name(declared in name(), live in names()) {
        let matcher = Matcher::new(&declared, NamePattern::Literal).unwrap();
        let selected = matcher.select(&live);
        if live.contains(&declared) {
            prop_assert_eq!(selected, vec![declared]);
        } else {
            prop_assert!(selected.is_empty());
        }
    }

    /// Property: an escaped literal used as a regex matches the same names as a substring test
    #[test]
    fn escaped_regex_is_substring_match(needle in name(), live in names()) {
        let matcher = Matcher::new(&regex::escape(&needle), NamePattern::Match).unwrap();
        let expected: Vec<String> = live.iter().filter(|n| n.contains(&needle)).cloned().collect();
        prop_assert_eq!(matcher.select(&live), expected);
    }

    /// Property: arbitrary strings never parse into a valid member unless they spell one
    #[test]
    fn unknown_strings_parse_to_unknown(s in "[A-Za-z_-]{0,20}") {
        let op = AclOperation::parse(&s);
        prop_assert_eq!(op == AclOperation::Unknown, !AclOperation::ALL.iter().any(|m| m.as_str().eq_ignore_ascii_case(&s)));
        let rt = AclResourceType::parse(&s);
        prop_assert_eq!(rt == AclResourceType::Unknown, !AclResourceType::ALL.iter().any(|m| m.as_str().eq_ignore_ascii_case(&s)));
        let pt = AclPatternType::parse(&s);
        prop_assert_eq!(pt == AclPatternType::Unknown, !AclPatternType::ALL.iter().any(|m| m.as_str().eq_ignore_ascii_case(&s)));
        let perm = AclPermissionType::parse(&s);
        prop_assert_eq!(perm == AclPermissionType::Unknown, !AclPermissionType::ALL.iter().any(|m| m.as_str().eq_ignore_ascii_case(&s)));
    }

    /// Property: applying the same manifest twice changes nothing the second time
    #[test]
    fn second_apply_is_a_no_op(
        brokers in 1usize..4,
        topics in prop::collection::vec(topic(), 0..6),
        acls in prop::collection::vec(acl(), 0..4),
        live_groups in names(),
        group_prefix in name(),
    ) {
        // Duplicate topic names are undefined; keep the first declaration
        let mut seen = BTreeSet::new();
        let topics: Vec<Topic> = topics
            .into_iter()
            .filter(|t| seen.insert(t.name.clone()))
            .map(|mut t| {
                t.replication_factor = t.replication_factor.min(brokers as i32);
                t
            })
            .collect();

        let mut cluster = live_groups
            .iter()
            .fold(InMemoryCluster::new(brokers), |c, g| c.with_group(g));
        let spec = Spec {
            topics,
            acls,
            consumer_groups: vec![ConsumerGroup {
                name: group_prefix,
                state: "absent".into(),
                pattern_type: "prefixed".into(),
                matched: Vec::new(),
            }],
            ..Default::default()
        };

        let first = run(&mut cluster, &spec);
        prop_assert!(first.iter().all(|r| !r.is_error()), "first run failed: {:?}", first);

        cluster.clear_calls();
        let second = run(&mut cluster, &spec);
        prop_assert!(second.iter().all(|r| r.changes == 0 && r.failures == 0));
        prop_assert!(cluster.mutations().is_empty());
    }
}

#[test]
fn enumeration_tables_are_total() {
    for op in AclOperation::ALL {
        assert_eq!(AclOperation::parse(op.as_str()), op);
        assert_eq!(AclOperation::from_code(op.to_code()), op);
    }
    for rt in AclResourceType::ALL {
        assert_eq!(AclResourceType::parse(rt.as_str()), rt);
        assert_eq!(AclResourceType::from_code(rt.to_code()), rt);
    }
    for pt in AclPatternType::ALL {
        assert_eq!(AclPatternType::parse(pt.as_str()), pt);
        assert_eq!(AclPatternType::from_code(pt.to_code()), pt);
    }
    for perm in AclPermissionType::ALL {
        assert_eq!(AclPermissionType::parse(perm.as_str()), perm);
        assert_eq!(AclPermissionType::from_code(perm.to_code()), perm);
    }

    let names: BTreeMap<&str, usize> = AclOperation::ALL
        .iter()
        .map(|op| (op.as_str(), 0))
        .collect();
    assert_eq!(names.len(), AclOperation::ALL.len());
}
