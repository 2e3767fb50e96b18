//! Kafka protocol error codes returned by admin APIs

/// Kafka protocol error codes
/// See: <https://kafka.apache.org/protocol.html#protocol_error_codes>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum KafkaErrorCode {
    /// No error
    None = 0,
    /// Unknown server error
    UnknownServerError = -1,
    /// Unknown topic or partition
    UnknownTopicOrPartition = 3,
    /// Request timed out
    RequestTimedOut = 7,
    /// Broker not available
    BrokerNotAvailable = 8,
    /// Coordinator load in progress
    CoordinatorLoadInProgress = 14,
    /// Coordinator not available
    CoordinatorNotAvailable = 15,
    /// Not coordinator for group
    NotCoordinator = 16,
    /// Invalid topic
    InvalidTopicException = 17,
    /// Invalid group id
    InvalidGroupId = 24,
    /// Topic authorization failed
    TopicAuthorizationFailed = 29,
    /// Group authorization failed
    GroupAuthorizationFailed = 30,
    /// Cluster authorization failed
    ClusterAuthorizationFailed = 31,
    /// Unsupported SASL mechanism
    UnsupportedSaslMechanism = 33,
    /// Illegal SASL state
    IllegalSaslState = 34,
    /// Unsupported version
    UnsupportedVersion = 35,
    /// Topic already exists
    TopicAlreadyExists = 36,
    /// Invalid partitions
    InvalidPartitions = 37,
    /// Invalid replication factor
    InvalidReplicationFactor = 38,
    /// Invalid replica assignment
    InvalidReplicaAssignment = 39,
    /// Invalid config
    InvalidConfig = 40,
    /// Not controller
    NotController = 41,
    /// Invalid request
    InvalidRequest = 42,
    /// Policy violation
    PolicyViolation = 44,
    /// Security disabled
    SecurityDisabled = 54,
    /// SASL authentication failed
    SaslAuthenticationFailed = 58,
    /// Non-empty group
    NonEmptyGroup = 68,
    /// Group id not found
    GroupIdNotFound = 69,
}

impl KafkaErrorCode {
    /// Look up a code returned by the broker
    pub fn from_i16(code: i16) -> Option<Self> {
        use KafkaErrorCode::*;
        let known = [
            None,
            UnknownServerError,
            UnknownTopicOrPartition,
            RequestTimedOut,
            BrokerNotAvailable,
            CoordinatorLoadInProgress,
            CoordinatorNotAvailable,
            NotCoordinator,
            InvalidTopicException,
            InvalidGroupId,
            TopicAuthorizationFailed,
            GroupAuthorizationFailed,
            ClusterAuthorizationFailed,
            UnsupportedSaslMechanism,
            IllegalSaslState,
            UnsupportedVersion,
            TopicAlreadyExists,
            InvalidPartitions,
            InvalidReplicationFactor,
            InvalidReplicaAssignment,
            InvalidConfig,
            NotController,
            InvalidRequest,
            PolicyViolation,
            SecurityDisabled,
            SaslAuthenticationFailed,
            NonEmptyGroup,
            GroupIdNotFound,
        ];
        known.into_iter().find(|c| c.as_i16() == code)
    }

    /// Human readable description of a raw error code
    pub fn describe(code: i16) -> String {
        match Self::from_i16(code) {
            Some(known) => known.description().to_string(),
            Option::None => format!("Kafka error code {}", code),
        }
    }

    /// Short description matching the broker's wording
    pub fn description(&self) -> &'static str {
        match self {
            KafkaErrorCode::None => "Success",
            KafkaErrorCode::UnknownServerError => {
                "The server experienced an unexpected error when processing the request"
            }
            KafkaErrorCode::UnknownTopicOrPartition => {
                "This server does not host this topic-partition"
            }
            KafkaErrorCode::RequestTimedOut => "The request timed out",
            KafkaErrorCode::BrokerNotAvailable => "The broker is not available",
            KafkaErrorCode::CoordinatorLoadInProgress => {
                "The coordinator is loading and hence can't process requests"
            }
            KafkaErrorCode::CoordinatorNotAvailable => "The coordinator is not available",
            KafkaErrorCode::NotCoordinator => "This is not the correct coordinator",
            KafkaErrorCode::InvalidTopicException => "The request attempted to perform an operation on an invalid topic",
            KafkaErrorCode::InvalidGroupId => "The configured groupId is invalid",
            KafkaErrorCode::TopicAuthorizationFailed => "Topic authorization failed",
            KafkaErrorCode::GroupAuthorizationFailed => "Group authorization failed",
            KafkaErrorCode::ClusterAuthorizationFailed => "Cluster authorization failed",
            KafkaErrorCode::UnsupportedSaslMechanism => {
                "The broker does not support the requested SASL mechanism"
            }
            KafkaErrorCode::IllegalSaslState => {
                "Request is not valid given the current SASL state"
            }
            KafkaErrorCode::UnsupportedVersion => "The version of API is not supported",
            KafkaErrorCode::TopicAlreadyExists => "Topic with this name already exists",
            KafkaErrorCode::InvalidPartitions => {
                "Number of partitions is below 1 or cannot be decreased"
            }
            KafkaErrorCode::InvalidReplicationFactor => {
                "Replication factor is below 1 or larger than the number of available brokers"
            }
            KafkaErrorCode::InvalidReplicaAssignment => "Replica assignment is invalid",
            KafkaErrorCode::InvalidConfig => "Configuration is invalid",
            KafkaErrorCode::NotController => "This is not the correct controller for this cluster",
            KafkaErrorCode::InvalidRequest => {
                "This most likely occurs because of a request being malformed by the client library or the message was sent to an incompatible broker"
            }
            KafkaErrorCode::PolicyViolation => "Request parameters do not satisfy the configured policy",
            KafkaErrorCode::SecurityDisabled => "Security features are disabled",
            KafkaErrorCode::SaslAuthenticationFailed => "SASL Authentication failed",
            KafkaErrorCode::NonEmptyGroup => "The group is not empty",
            KafkaErrorCode::GroupIdNotFound => "The group id does not exist",
        }
    }

    /// Convert to the i16 error code used in Kafka protocol
    pub fn as_i16(&self) -> i16 {
        *self as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_i16_roundtrip() {
        for code in [-1i16, 0, 3, 36, 37, 38, 58, 69] {
            let known = KafkaErrorCode::from_i16(code).unwrap();
            assert_eq!(known.as_i16(), code);
        }
        assert_eq!(KafkaErrorCode::from_i16(9999), None);
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(KafkaErrorCode::describe(9999), "Kafka error code 9999");
        assert_eq!(
            KafkaErrorCode::describe(36),
            "Topic with this name already exists"
        );
    }
}
