//! Session configuration
//!
//! `Configuration` is the caller-facing, text-only form (base64 keys, address
//! strings). It loads from the JSON request body used by HTTP gateways or from
//! a standard WireGuard `.conf` file. `resolve` validates and decodes it into
//! a `ResolvedConfig` before any network activity.

mod parser;

use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ipnet::Ipv4Net;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::crypto::{PresharedKey, PrivateKey, PublicKey};
use crate::error::ConfigError;

pub use parser::parse_wg_conf;

/// Default bound on each blocking receive
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller-supplied session parameters
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Our static private key, base64
    pub private_key: String,
    /// The peer's static public key, base64
    pub public_key: String,
    /// Optional preshared key, base64
    #[serde(default)]
    pub preshared_key: Option<String>,
    /// The peer's UDP endpoint, `host:port`
    pub endpoint: String,
    /// Our tunnel IPv4 address (a `/32`-style suffix is accepted)
    pub client_ip_address: String,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("public_key", &self.public_key)
            .field("endpoint", &self.endpoint)
            .field("client_ip_address", &self.client_ip_address)
            .finish_non_exhaustive()
    }
}

impl Configuration {
    /// Load from a JSON object with camelCase keys
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a standard WireGuard `.conf`
    pub fn parse_wg_conf(content: &str) -> Result<Self, ConfigError> {
        parser::parse_wg_conf(content)
    }

    /// Load from a file: `.json` as JSON, anything else as a WireGuard `.conf`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json(&content)
        } else {
            Self::parse_wg_conf(&content)
        }
    }

    /// Names of required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.private_key.trim().is_empty() {
            missing.push("privateKey");
        }
        if self.public_key.trim().is_empty() {
            missing.push("publicKey");
        }
        if self.endpoint.trim().is_empty() {
            missing.push("endpoint");
        }
        if self.client_ip_address.trim().is_empty() {
            missing.push("clientIpAddress");
        }
        missing
    }

    /// Decode and validate every field
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        if let Some(field) = self.missing_fields().first() {
            return Err(ConfigError::MissingField {
                field: field.to_string(),
            });
        }

        let private_key = PrivateKey::from_bytes(decode_key(&self.private_key, "PrivateKey")?);
        let peer_public_key = PublicKey::from_bytes(decode_key(&self.public_key, "PublicKey")?);
        let preshared_key = match self.preshared_key.as_deref().map(str::trim) {
            Some(psk) if !psk.is_empty() => {
                PresharedKey::from_bytes(decode_key(psk, "PresharedKey")?)
            }
            _ => PresharedKey::default(),
        };

        Ok(ResolvedConfig {
            private_key,
            peer_public_key,
            preshared_key,
            endpoint: validate_endpoint(&self.endpoint)?,
            client_ip: parse_client_ip(&self.client_ip_address)?,
        })
    }
}

/// Decoded keys and addresses, ready for a handshake
pub struct ResolvedConfig {
    /// Clamped static private key
    pub private_key: PrivateKey,
    pub peer_public_key: PublicKey,
    /// All-zero unless configured
    pub preshared_key: PresharedKey,
    /// Syntactically valid `host:port`, resolved at connect time
    pub endpoint: String,
    pub client_ip: Ipv4Addr,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("peer_public_key", &self.peer_public_key)
            .field("endpoint", &self.endpoint)
            .field("client_ip", &self.client_ip)
            .finish_non_exhaustive()
    }
}

/// Per-call tuning that is not part of the peer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bound on each of the two blocking receives
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Decode a standard-base64 key of exactly 32 bytes
pub(crate) fn decode_key(value: &str, field: &str) -> Result<[u8; 32], ConfigError> {
    let invalid = || ConfigError::InvalidKey {
        field: field.to_string(),
    };

    let bytes = Zeroizing::new(BASE64.decode(value.trim()).map_err(|_| invalid())?);
    bytes.as_slice().try_into().map_err(|_| invalid())
}

/// Accept `a.b.c.d` or `a.b.c.d/prefix`
fn parse_client_ip(value: &str) -> Result<Ipv4Addr, ConfigError> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    value
        .parse::<Ipv4Net>()
        .map(|net| net.addr())
        .map_err(|_| ConfigError::InvalidAddress {
            value: value.to_string(),
        })
}

/// Check `host:port` shape and a non-zero port
fn validate_endpoint(value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidEndpoint {
        value: value.to_string(),
    };

    let (host, port) = value.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if host.is_empty() || port == 0 {
        return Err(invalid());
    }
    Ok(value.to_string())
}
