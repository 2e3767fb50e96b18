//! SCRAM client exchange (RFC 5802), without channel binding

use crate::config::{Credentials, ScramMechanism};
use crate::error::{OpsError, Result};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine,
};
use hmac::{digest::KeyInit, Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

/// GS2 header for "no channel binding, no authzid"
const GS2_HEADER: &str = "n,,";

/// Client side of one SCRAM authentication
pub(crate) struct ScramClient {
    mechanism: ScramMechanism,
    username: String,
    password: Zeroizing<String>,
    nonce: String,
    client_first_bare: String,
    expected_server_signature: Option<Vec<u8>>,
}

impl ScramClient {
    pub(crate) fn new(credentials: &Credentials) -> Self {
        let mut nonce_bytes = [0u8; 24];
        rand::thread_rng().fill(&mut nonce_bytes);
        Self::with_nonce(credentials, URL_SAFE_NO_PAD.encode(nonce_bytes))
    }

    fn with_nonce(credentials: &Credentials, nonce: String) -> Self {
        let client_first_bare = format!("n={},r={}", escape_name(&credentials.username), nonce);
        Self {
            mechanism: credentials.mechanism,
            username: credentials.username.clone(),
            password: Zeroizing::new(credentials.password.clone()),
            nonce,
            client_first_bare,
            expected_server_signature: None,
        }
    }

    pub(crate) fn username(&self) -> &str {
        &self.username
    }

    /// The client-first message
    pub(crate) fn client_first(&self) -> Vec<u8> {
        format!("{}{}", GS2_HEADER, self.client_first_bare).into_bytes()
    }

    /// Answer the server-first message with the client-final message
    pub(crate) fn client_final(&mut self, server_first: &[u8]) -> Result<Vec<u8>> {
        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| auth_error("server-first message is not UTF-8"))?;

        let mut server_nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            match attr.split_once('=') {
                Some(("r", v)) => server_nonce = Some(v),
                Some(("s", v)) => {
                    salt = Some(
                        BASE64
                            .decode(v)
                            .map_err(|_| auth_error("invalid salt in server-first message"))?,
                    )
                }
                Some(("i", v)) => {
                    iterations = Some(
                        v.parse::<u32>()
                            .map_err(|_| auth_error("invalid iteration count"))?,
                    )
                }
                Some(("m", _)) => return Err(auth_error("unsupported mandatory extension")),
                Some(("e", v)) => return Err(auth_error(v)),
                _ => {}
            }
        }

        let (Some(server_nonce), Some(salt), Some(iterations)) = (server_nonce, salt, iterations)
        else {
            return Err(auth_error("incomplete server-first message"));
        };
        if !server_nonce.starts_with(&self.nonce) || server_nonce.len() == self.nonce.len() {
            return Err(auth_error("server nonce does not extend the client nonce"));
        }
        if iterations == 0 {
            return Err(auth_error("invalid iteration count"));
        }

        let without_proof = format!("c={},r={}", BASE64.encode(GS2_HEADER), server_nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, without_proof
        );

        let (proof, server_signature) = match self.mechanism {
            ScramMechanism::Sha256 => {
                let mut salted = Zeroizing::new(vec![0u8; 32]);
                pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), &salt, iterations, &mut salted);
                let client_key = hmac::<Hmac<Sha256>>(&salted, b"Client Key")?;
                let stored_key = Sha256::digest(&client_key);
                let server_key = hmac::<Hmac<Sha256>>(&salted, b"Server Key")?;
                (
                    client_proof::<Hmac<Sha256>>(&client_key, &stored_key, &auth_message)?,
                    hmac::<Hmac<Sha256>>(&server_key, auth_message.as_bytes())?,
                )
            }
            ScramMechanism::Sha512 => {
                let mut salted = Zeroizing::new(vec![0u8; 64]);
                pbkdf2::pbkdf2_hmac::<Sha512>(self.password.as_bytes(), &salt, iterations, &mut salted);
                let client_key = hmac::<Hmac<Sha512>>(&salted, b"Client Key")?;
                let stored_key = Sha512::digest(&client_key);
                let server_key = hmac::<Hmac<Sha512>>(&salted, b"Server Key")?;
                (
                    client_proof::<Hmac<Sha512>>(&client_key, &stored_key, &auth_message)?,
                    hmac::<Hmac<Sha512>>(&server_key, auth_message.as_bytes())?,
                )
            }
        };

        self.expected_server_signature = Some(server_signature);
        Ok(format!("{},p={}", without_proof, BASE64.encode(proof)).into_bytes())
    }

    /// Check the server-final message
    pub(crate) fn verify_server_final(&self, server_final: &[u8]) -> Result<()> {
        let server_final = std::str::from_utf8(server_final)
            .map_err(|_| auth_error("server-final message is not UTF-8"))?;

        if let Some(error) = server_final.strip_prefix("e=") {
            return Err(auth_error(error));
        }
        let signature = server_final
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .ok_or_else(|| auth_error("missing server signature"))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|_| auth_error("invalid server signature encoding"))?;

        match &self.expected_server_signature {
            Some(expected) if constant_time_eq(expected, &signature) => Ok(()),
            Some(_) => Err(auth_error("server signature mismatch")),
            None => Err(auth_error("server-final message before client-final")),
        }
    }
}

fn auth_error(detail: &str) -> OpsError {
    OpsError::AuthenticationFailed(format!("SCRAM: {}", detail))
}

/// `saslname` escaping from RFC 5802
fn escape_name(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn client_proof<H: Mac + KeyInit>(
    client_key: &[u8],
    stored_key: &[u8],
    auth_message: &str,
) -> Result<Vec<u8>> {
    let client_signature = hmac::<H>(stored_key, auth_message.as_bytes())?;
    Ok(client_key
        .iter()
        .zip(client_signature.iter())
        .map(|(a, b)| a ^ b)
        .collect())
}

fn hmac<H: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <H as KeyInit>::new_from_slice(key)
        .map_err(|e| OpsError::AuthenticationFailed(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
