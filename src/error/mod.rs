//! Error types for kafka-ops
//!
//! One error enum covers the whole crate. Broker-side failures keep the Kafka
//! error code so callers can tell "already exists" apart from transport trouble.

use thiserror::Error;

mod kafka_error_code;

pub use kafka_error_code::KafkaErrorCode;

/// Result type alias for kafka-ops operations
pub type Result<T> = std::result::Result<T, OpsError>;

/// Main error type for kafka-ops
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{message}")]
    Broker { code: i16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cluster read the whole run depends on failed
    #[error("{0}")]
    RunAborted(String),
}

impl OpsError {
    /// Create a protocol error with operation context
    pub fn protocol(operation: &str, detail: impl std::fmt::Display) -> Self {
        OpsError::Protocol(format!("{}: {}", operation, detail))
    }

    /// Build a broker error from a response error code and optional message
    ///
    /// Falls back to the code table description when the broker sent no text.
    pub fn broker(code: i16, message: Option<&str>) -> Self {
        let message = match message {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => KafkaErrorCode::describe(code),
        };
        OpsError::Broker { code, message }
    }

    /// Kafka error code carried by this error, if any
    pub fn kafka_code(&self) -> Option<KafkaErrorCode> {
        match self {
            OpsError::Broker { code, .. } => KafkaErrorCode::from_i16(*code),
            _ => None,
        }
    }

    /// Message without the category prefix, as shown in per-item results
    pub fn message(&self) -> String {
        match self {
            OpsError::Config(m) | OpsError::Parse(m) | OpsError::Template(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the error is a misconfiguration of the manifest or flags
    pub fn is_config(&self) -> bool {
        matches!(self, OpsError::Config(_))
    }
}

/// Turn a response error code into a `Result`
pub fn check_error_code(code: i16, message: Option<&str>) -> Result<()> {
    if code == KafkaErrorCode::None.as_i16() {
        Ok(())
    } else {
        Err(OpsError::broker(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_uses_server_message() {
        let err = OpsError::broker(36, Some("Topic 'orders' already exists."));
        assert_eq!(err.to_string(), "Topic 'orders' already exists.");
        assert_eq!(err.kafka_code(), Some(KafkaErrorCode::TopicAlreadyExists));
    }

    #[test]
    fn test_broker_error_falls_back_to_code_table() {
        let err = OpsError::broker(37, None);
        assert_eq!(err.to_string(), "Number of partitions is below 1 or cannot be decreased");

        let err = OpsError::broker(37, Some(""));
        assert_eq!(err.to_string(), "Number of partitions is below 1 or cannot be decreased");
    }

    #[test]
    fn test_check_error_code() {
        assert!(check_error_code(0, None).is_ok());
        assert!(matches!(
            check_error_code(3, None),
            Err(OpsError::Broker { code: 3, .. })
        ));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            OpsError::Config("Principal not defined".into()).to_string(),
            "Configuration error: Principal not defined"
        );
        assert_eq!(
            OpsError::protocol("decode header", "short buffer").to_string(),
            "Protocol error: decode header: short buffer"
        );
        assert_eq!(
            OpsError::Config("Principal not defined".into()).message(),
            "Principal not defined"
        );
        assert!(OpsError::Config(String::new()).is_config());
        assert!(!OpsError::Tls(String::new()).is_config());
    }
}
