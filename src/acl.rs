//! ACL enumerations
//!
//! The four enumerations that describe an access-control entry on the wire:
//! operation, resource type, resource pattern type and permission type.
//! Each has one canonical string form and one Kafka protocol code per member.
//! Parsing is case-insensitive; anything unrecognized becomes `Unknown`,
//! which renders as `INVALID`.

use std::fmt;

/// String rendered for the `Unknown` sentinel of every enumeration
pub const INVALID: &str = "INVALID";

/// Operations an ACL can allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclOperation {
    Unknown,
    Any,
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
}

impl AclOperation {
    /// Every member except `Unknown`, in protocol code order
    pub const ALL: [AclOperation; 12] = [
        AclOperation::Any,
        AclOperation::All,
        AclOperation::Read,
        AclOperation::Write,
        AclOperation::Create,
        AclOperation::Delete,
        AclOperation::Alter,
        AclOperation::Describe,
        AclOperation::ClusterAction,
        AclOperation::DescribeConfigs,
        AclOperation::AlterConfigs,
        AclOperation::IdempotentWrite,
    ];

    /// Parse from string representation
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ANY" => AclOperation::Any,
            "ALL" => AclOperation::All,
            "READ" => AclOperation::Read,
            "WRITE" => AclOperation::Write,
            "CREATE" => AclOperation::Create,
            "DELETE" => AclOperation::Delete,
            "ALTER" => AclOperation::Alter,
            "DESCRIBE" => AclOperation::Describe,
            "CLUSTER_ACTION" => AclOperation::ClusterAction,
            "DESCRIBE_CONFIGS" => AclOperation::DescribeConfigs,
            "ALTER_CONFIGS" => AclOperation::AlterConfigs,
            "IDEMPOTENT_WRITE" => AclOperation::IdempotentWrite,
            _ => AclOperation::Unknown,
        }
    }

    /// Canonical upper-case name
    pub fn as_str(self) -> &'static str {
        match self {
            AclOperation::Unknown => INVALID,
            AclOperation::Any => "ANY",
            AclOperation::All => "ALL",
            AclOperation::Read => "READ",
            AclOperation::Write => "WRITE",
            AclOperation::Create => "CREATE",
            AclOperation::Delete => "DELETE",
            AclOperation::Alter => "ALTER",
            AclOperation::Describe => "DESCRIBE",
            AclOperation::ClusterAction => "CLUSTER_ACTION",
            AclOperation::DescribeConfigs => "DESCRIBE_CONFIGS",
            AclOperation::AlterConfigs => "ALTER_CONFIGS",
            AclOperation::IdempotentWrite => "IDEMPOTENT_WRITE",
        }
    }

    /// Convert from Kafka protocol operation code
    pub fn from_code(code: i8) -> Self {
        match code {
            1 => AclOperation::Any,
            2 => AclOperation::All,
            3 => AclOperation::Read,
            4 => AclOperation::Write,
            5 => AclOperation::Create,
            6 => AclOperation::Delete,
            7 => AclOperation::Alter,
            8 => AclOperation::Describe,
            9 => AclOperation::ClusterAction,
            10 => AclOperation::DescribeConfigs,
            11 => AclOperation::AlterConfigs,
            12 => AclOperation::IdempotentWrite,
            _ => AclOperation::Unknown,
        }
    }

    /// Convert to Kafka protocol operation code
    pub fn to_code(self) -> i8 {
        match self {
            AclOperation::Unknown => 0,
            AclOperation::Any => 1,
            AclOperation::All => 2,
            AclOperation::Read => 3,
            AclOperation::Write => 4,
            AclOperation::Create => 5,
            AclOperation::Delete => 6,
            AclOperation::Alter => 7,
            AclOperation::Describe => 8,
            AclOperation::ClusterAction => 9,
            AclOperation::DescribeConfigs => 10,
            AclOperation::AlterConfigs => 11,
            AclOperation::IdempotentWrite => 12,
        }
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource types that can be protected by ACLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclResourceType {
    Unknown,
    Any,
    Topic,
    Group,
    Cluster,
    TransactionalId,
}

impl AclResourceType {
    /// Every member except `Unknown`, in protocol code order
    pub const ALL: [AclResourceType; 5] = [
        AclResourceType::Any,
        AclResourceType::Topic,
        AclResourceType::Group,
        AclResourceType::Cluster,
        AclResourceType::TransactionalId,
    ];

    /// Parse from string representation
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "any" => AclResourceType::Any,
            "topic" => AclResourceType::Topic,
            "group" => AclResourceType::Group,
            "cluster" => AclResourceType::Cluster,
            "transactional-id" => AclResourceType::TransactionalId,
            _ => AclResourceType::Unknown,
        }
    }

    /// Canonical lower-case name
    pub fn as_str(self) -> &'static str {
        match self {
            AclResourceType::Unknown => INVALID,
            AclResourceType::Any => "any",
            AclResourceType::Topic => "topic",
            AclResourceType::Group => "group",
            AclResourceType::Cluster => "cluster",
            AclResourceType::TransactionalId => "transactional-id",
        }
    }

    /// Convert from Kafka protocol resource type code
    pub fn from_code(code: i8) -> Self {
        match code {
            1 => AclResourceType::Any,
            2 => AclResourceType::Topic,
            3 => AclResourceType::Group,
            4 => AclResourceType::Cluster,
            5 => AclResourceType::TransactionalId,
            _ => AclResourceType::Unknown,
        }
    }

    /// Convert to Kafka protocol resource type code
    pub fn to_code(self) -> i8 {
        match self {
            AclResourceType::Unknown => 0,
            AclResourceType::Any => 1,
            AclResourceType::Topic => 2,
            AclResourceType::Group => 3,
            AclResourceType::Cluster => 4,
            AclResourceType::TransactionalId => 5,
        }
    }
}

impl fmt::Display for AclResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an ACL resource name is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclPatternType {
    Unknown,
    Any,
    Match,
    Literal,
    Prefixed,
}

impl AclPatternType {
    /// Every member except `Unknown`, in protocol code order
    pub const ALL: [AclPatternType; 4] = [
        AclPatternType::Any,
        AclPatternType::Match,
        AclPatternType::Literal,
        AclPatternType::Prefixed,
    ];

    /// Parse from string representation
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ANY" => AclPatternType::Any,
            "MATCH" => AclPatternType::Match,
            "LITERAL" => AclPatternType::Literal,
            "PREFIXED" => AclPatternType::Prefixed,
            _ => AclPatternType::Unknown,
        }
    }

    /// Canonical upper-case name
    pub fn as_str(self) -> &'static str {
        match self {
            AclPatternType::Unknown => INVALID,
            AclPatternType::Any => "ANY",
            AclPatternType::Match => "MATCH",
            AclPatternType::Literal => "LITERAL",
            AclPatternType::Prefixed => "PREFIXED",
        }
    }

    /// Convert from Kafka protocol pattern type code
    pub fn from_code(code: i8) -> Self {
        match code {
            1 => AclPatternType::Any,
            2 => AclPatternType::Match,
            3 => AclPatternType::Literal,
            4 => AclPatternType::Prefixed,
            _ => AclPatternType::Unknown,
        }
    }

    /// Convert to Kafka protocol pattern type code
    pub fn to_code(self) -> i8 {
        match self {
            AclPatternType::Unknown => 0,
            AclPatternType::Any => 1,
            AclPatternType::Match => 2,
            AclPatternType::Literal => 3,
            AclPatternType::Prefixed => 4,
        }
    }
}

impl fmt::Display for AclPatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission type (Allow or Deny)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclPermissionType {
    Unknown,
    Any,
    Deny,
    Allow,
}

impl AclPermissionType {
    /// Every member except `Unknown`, in protocol code order
    pub const ALL: [AclPermissionType; 3] = [
        AclPermissionType::Any,
        AclPermissionType::Deny,
        AclPermissionType::Allow,
    ];

    /// Parse from string representation
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ANY" => AclPermissionType::Any,
            "DENY" => AclPermissionType::Deny,
            "ALLOW" => AclPermissionType::Allow,
            _ => AclPermissionType::Unknown,
        }
    }

    /// Canonical upper-case name
    pub fn as_str(self) -> &'static str {
        match self {
            AclPermissionType::Unknown => INVALID,
            AclPermissionType::Any => "ANY",
            AclPermissionType::Deny => "DENY",
            AclPermissionType::Allow => "ALLOW",
        }
    }

    /// Convert from Kafka protocol permission type code
    pub fn from_code(code: i8) -> Self {
        match code {
            1 => AclPermissionType::Any,
            2 => AclPermissionType::Deny,
            3 => AclPermissionType::Allow,
            _ => AclPermissionType::Unknown,
        }
    }

    /// Convert to Kafka protocol permission type code
    pub fn to_code(self) -> i8 {
        match self {
            AclPermissionType::Unknown => 0,
            AclPermissionType::Any => 1,
            AclPermissionType::Deny => 2,
            AclPermissionType::Allow => 3,
        }
    }
}

impl fmt::Display for AclPermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
