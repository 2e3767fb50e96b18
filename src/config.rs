//! Connection settings
//!
//! Settings are merged from three places, first match wins: the manifest's
//! `connection` block, command-line flags (which clap already folds together
//! with their environment variables), and the defaults below.

use crate::error::{OpsError, Result};
use crate::spec::Connection;
use std::fmt;
use std::time::Duration;

/// Default bootstrap broker
pub const DEFAULT_BROKER: &str = "localhost:9092";

/// Default security protocol
pub const DEFAULT_PROTOCOL: &str = "plaintext";

/// Default SASL mechanism
pub const DEFAULT_MECHANISM: &str = "scram-sha-256";

/// Client id sent with every request
pub const DEFAULT_CLIENT_ID: &str = "kafka-ops";

/// Default TCP connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How the client talks to brokers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(SecurityProtocol::Plaintext),
            "ssl" => Ok(SecurityProtocol::Ssl),
            "sasl_plaintext" => Ok(SecurityProtocol::SaslPlaintext),
            "sasl_ssl" => Ok(SecurityProtocol::SaslSsl),
            other => Err(OpsError::Config(format!(
                "Unsupported security protocol: {}. Supported: plaintext, ssl, sasl_plaintext, sasl_ssl",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }

    pub fn uses_tls(self) -> bool {
        matches!(self, SecurityProtocol::Ssl | SecurityProtocol::SaslSsl)
    }

    pub fn uses_sasl(self) -> bool {
        matches!(self, SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl)
    }
}

impl fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SCRAM hash function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScramMechanism {
    Sha256,
    Sha512,
}

impl ScramMechanism {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "scram-sha-256" => Ok(ScramMechanism::Sha256),
            "scram-sha-512" => Ok(ScramMechanism::Sha512),
            _ => Err(OpsError::Config(
                "The only supported SASL mechanisms: scram-sha-256, scram-sha-512".to_string(),
            )),
        }
    }

    /// Mechanism name as sent in the SASL handshake
    pub fn wire_name(self) -> &'static str {
        match self {
            ScramMechanism::Sha256 => "SCRAM-SHA-256",
            ScramMechanism::Sha512 => "SCRAM-SHA-512",
        }
    }
}

/// SASL username and password
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub mechanism: ScramMechanism,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub broker: Option<String>,
    pub protocol: Option<String>,
    pub mechanism: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Resolved settings for the wire client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Bootstrap brokers in the order they are tried
    pub brokers: Vec<String>,
    pub protocol: SecurityProtocol,
    /// Present only when the protocol enables SASL
    pub credentials: Option<Credentials>,
    pub client_id: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKER.to_string()],
            protocol: SecurityProtocol::Plaintext,
            credentials: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ConnectionConfig {
    /// Merge the manifest's connection block over command-line values
    pub fn resolve(manifest: &Connection, args: &ConnectionArgs) -> Result<Self> {
        fn pick(manifest: &str, arg: &Option<String>, default: &str) -> String {
            if !manifest.is_empty() {
                return manifest.to_string();
            }
            match arg {
                Some(value) if !value.is_empty() => value.clone(),
                _ => default.to_string(),
            }
        }

        let broker = pick(&manifest.broker, &args.broker, DEFAULT_BROKER);
        let protocol = SecurityProtocol::parse(&pick(
            &manifest.protocol,
            &args.protocol,
            DEFAULT_PROTOCOL,
        ))?;

        let credentials = if protocol.uses_sasl() {
            let mechanism =
                ScramMechanism::parse(&pick(&manifest.mechanism, &args.mechanism, DEFAULT_MECHANISM))?;
            Some(Credentials {
                mechanism,
                username: pick(&manifest.username, &args.username, ""),
                password: pick(&manifest.password, &args.password, ""),
            })
        } else {
            None
        };

        let brokers: Vec<String> = broker
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();
        if brokers.is_empty() {
            return Err(OpsError::Config("No broker address given".to_string()));
        }

        Ok(Self {
            brokers,
            protocol,
            credentials,
            ..Self::default()
        })
    }
}

/// Switches that change how a run proceeds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Stop at the first failed item
    pub stop_on_error: bool,
}
