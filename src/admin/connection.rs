//! One blocking connection to one broker

use super::scram::ScramClient;
use super::tls::{self, TlsStream};
use crate::config::{ConnectionConfig, Credentials};
use crate::error::{check_error_code, OpsError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::{
    ApiKey, RequestHeader, ResponseHeader, SaslAuthenticateRequest, SaslAuthenticateResponse,
    SaslHandshakeRequest, SaslHandshakeResponse,
};
use kafka_protocol::protocol::{Decodable, Encodable, StrBytes};
use rustls::ClientConfig;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use tracing::{debug, info};

/// Every request we send uses a non-flexible version, so headers are fixed
const REQUEST_HEADER_VERSION: i16 = 1;
const RESPONSE_HEADER_VERSION: i16 = 0;

/// Refuse absurd frame sizes from a confused peer
const MAX_RESPONSE_SIZE: usize = 100 * 1024 * 1024;

const SASL_HANDSHAKE_VERSION: i16 = 1;
const SASL_AUTHENTICATE_VERSION: i16 = 1;

enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::Tls(s) => s.flush(),
        }
    }
}

pub(crate) struct BrokerConnection {
    address: String,
    transport: Transport,
    correlation_id: i32,
    client_id: String,
}

impl BrokerConnection {
    /// Connect, start TLS when configured, then authenticate when configured
    pub(crate) fn open(
        address: &str,
        config: &ConnectionConfig,
        tls_config: Option<&Arc<ClientConfig>>,
    ) -> Result<Self> {
        let socket = connect_socket(address, config)?;

        let transport = match tls_config {
            Some(tls_config) => {
                let stream = tls::wrap(tls_config.clone(), host_of(address), socket)?;
                Transport::Tls(Box::new(stream))
            }
            None => Transport::Plain(socket),
        };

        let mut connection = Self {
            address: address.to_string(),
            transport,
            correlation_id: 0,
            client_id: config.client_id.clone(),
        };

        if let Some(credentials) = &config.credentials {
            connection.authenticate(credentials)?;
        }

        debug!(broker = %address, protocol = %config.protocol, "Connected to broker");
        Ok(connection)
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    /// Send one request and wait for its response
    pub(crate) fn send<Req: Encodable, Resp: Decodable>(
        &mut self,
        api_key: ApiKey,
        api_version: i16,
        request: &Req,
    ) -> Result<Resp> {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        let correlation_id = self.correlation_id;

        let header = RequestHeader::default()
            .with_request_api_key(api_key as i16)
            .with_request_api_version(api_version)
            .with_correlation_id(correlation_id)
            .with_client_id(Some(StrBytes::from_string(self.client_id.clone())));

        let mut body = BytesMut::new();
        header
            .encode(&mut body, REQUEST_HEADER_VERSION)
            .map_err(|e| OpsError::protocol("encode header", e))?;
        request
            .encode(&mut body, api_version)
            .map_err(|e| OpsError::protocol("encode request", e))?;

        let mut frame = BytesMut::with_capacity(4 + body.len());
        frame.put_i32(body.len() as i32);
        frame.extend_from_slice(&body);

        debug!(
            broker = %self.address,
            api = ?api_key,
            version = api_version,
            correlation_id,
            "Sending request"
        );
        self.transport.write_all(&frame)?;
        self.transport.flush()?;

        let mut len_buf = [0u8; 4];
        self.transport.read_exact(&mut len_buf)?;
        let len = i32::from_be_bytes(len_buf);
        if len < 0 || len as usize > MAX_RESPONSE_SIZE {
            return Err(OpsError::protocol(
                "read response",
                format!("invalid frame size {}", len),
            ));
        }

        let mut payload = vec![0u8; len as usize];
        self.transport.read_exact(&mut payload)?;
        let mut payload = Bytes::from(payload);

        let response_header = ResponseHeader::decode(&mut payload, RESPONSE_HEADER_VERSION)
            .map_err(|e| OpsError::protocol("decode header", e))?;
        if response_header.correlation_id != correlation_id {
            return Err(OpsError::protocol(
                "decode header",
                format!(
                    "correlation id mismatch: sent {}, received {}",
                    correlation_id, response_header.correlation_id
                ),
            ));
        }

        Resp::decode(&mut payload, api_version).map_err(|e| OpsError::protocol("decode response", e))
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let mechanism = credentials.mechanism.wire_name();

        let handshake: SaslHandshakeResponse = self.send(
            ApiKey::SaslHandshake,
            SASL_HANDSHAKE_VERSION,
            &SaslHandshakeRequest::default().with_mechanism(StrBytes::from_static_str(mechanism)),
        )?;
        if handshake.error_code != 0 {
            let offered: Vec<&str> = handshake.mechanisms.iter().map(|m| m.as_str()).collect();
            return Err(OpsError::AuthenticationFailed(format!(
                "broker does not accept {} (offered: {})",
                mechanism,
                offered.join(", ")
            )));
        }

        let mut scram = ScramClient::new(credentials);
        let server_first = self.sasl_round(scram.client_first())?;
        let client_final = scram.client_final(&server_first)?;
        let server_final = self.sasl_round(client_final)?;
        scram.verify_server_final(&server_final)?;

        info!(broker = %self.address, user = %scram.username(), mechanism, "SASL authentication succeeded");
        Ok(())
    }

    fn sasl_round(&mut self, message: Vec<u8>) -> Result<Bytes> {
        let response: SaslAuthenticateResponse = self.send(
            ApiKey::SaslAuthenticate,
            SASL_AUTHENTICATE_VERSION,
            &SaslAuthenticateRequest::default().with_auth_bytes(Bytes::from(message)),
        )?;
        check_error_code(
            response.error_code,
            response.error_message.as_ref().map(|m| m.as_str()),
        )
        .map_err(|e| OpsError::AuthenticationFailed(e.to_string()))?;
        Ok(response.auth_bytes)
    }
}

fn connect_socket(address: &str, config: &ConnectionConfig) -> Result<TcpStream> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| OpsError::Config(format!("cannot resolve broker {}: {}", address, e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(socket) => {
                socket.set_read_timeout(Some(config.request_timeout))?;
                socket.set_write_timeout(Some(config.request_timeout))?;
                socket.set_nodelay(true)?;
                return Ok(socket);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(e) => OpsError::Io(e),
        None => OpsError::Config(format!("broker {} resolved to no addresses", address)),
    })
}

/// Host part of a `host:port` address, without IPv6 brackets
fn host_of(address: &str) -> &str {
    let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use kafka_protocol::messages::{MetadataRequest, MetadataResponse};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("kafka1:9092"), "kafka1");
        assert_eq!(host_of("[::1]:9092"), "::1");
        assert_eq!(host_of("kafka1"), "kafka1");
    }

    #[test]
    fn test_unresolvable_broker() {
        let err = connect_socket("no-port-here", &ConnectionConfig::default()).unwrap_err();
        assert!(err.is_config());
    }

    /// Echo one request back as a minimal Metadata v1 response
    #[test]
    fn test_send_round_trip_against_fake_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut len_buf = [0u8; 4];
            socket.read_exact(&mut len_buf).unwrap();
            let mut request = vec![0u8; i32::from_be_bytes(len_buf) as usize];
            socket.read_exact(&mut request).unwrap();

            let mut request = Bytes::from(request);
            let header = RequestHeader::decode(&mut request, REQUEST_HEADER_VERSION).unwrap();
            assert_eq!(header.request_api_key, ApiKey::Metadata as i16);

            let mut body = BytesMut::new();
            ResponseHeader::default()
                .with_correlation_id(header.correlation_id)
                .encode(&mut body, RESPONSE_HEADER_VERSION)
                .unwrap();
            MetadataResponse::default()
                .with_controller_id(kafka_protocol::messages::BrokerId(7))
                .encode(&mut body, 1)
                .unwrap();

            let mut frame = BytesMut::new();
            frame.put_i32(body.len() as i32);
            frame.extend_from_slice(&body);
            socket.write_all(&frame).unwrap();
        });

        let mut connection =
            BrokerConnection::open(&address, &ConnectionConfig::default(), None).unwrap();
        let response: MetadataResponse = connection
            .send(ApiKey::Metadata, 1, &MetadataRequest::default().with_topics(None))
            .unwrap();
        assert_eq!(response.controller_id.0, 7);
        assert_eq!(connection.address(), address);

        server.join().unwrap();
    }
}
