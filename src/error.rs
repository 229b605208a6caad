//! Error types for the one-shot WireGuard client

use std::fmt;

use thiserror::Error;

/// Main error type for a one-shot session
#[derive(Error, Debug)]
pub enum OneshotError {
    /// Configuration errors (reported before any network activity)
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Cryptographic errors
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Network errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

/// Configuration parsing errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid config format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid base64 key: {field}")]
    InvalidKey { field: String },

    #[error("Invalid IPv4 address: {value}")]
    InvalidAddress { value: String },

    #[error("Invalid endpoint: {value}")]
    InvalidEndpoint { value: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cryptographic operation errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Diffie-Hellman produced an all-zero shared secret")]
    ZeroSharedSecret,

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed: invalid ciphertext or authentication tag")]
    Decryption,

    #[error("Secure random source unavailable: {reason}")]
    RandomSource { reason: String },
}

/// Protocol-level errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message type: {msg_type}")]
    InvalidMessageType { msg_type: u32 },

    #[error("Invalid message length: expected {expected}, got {got}")]
    InvalidMessageLength { expected: usize, got: usize },

    #[error("Invalid receiver index: expected {expected}, got {got}")]
    InvalidReceiverIndex { expected: u32, got: u32 },

    #[error("Peer answered with a cookie reply (under load); retry later")]
    CookieReplyReceived,

    #[error("Malformed packet: {reason}")]
    MalformedPacket { reason: String },

    #[error("Payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Handshake step not allowed in phase {phase}")]
    UnexpectedPhase { phase: String },
}

/// Which blocking receive an expired deadline belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Handshake,
    Transport,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Handshake => write!(f, "handshake"),
            Stage::Transport => write!(f, "transport"),
        }
    }
}

/// Network-level errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    #[error("Connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("DNS resolution failed for {host}")]
    DnsResolutionFailed { host: String },

    #[error("Endpoint {host} has no IPv4 address")]
    NoIpv4Endpoint { host: String },

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Receive failed: {reason}")]
    ReceiveFailed { reason: String },

    #[error("No reply during {stage} after {millis}ms")]
    Timeout { stage: Stage, millis: u64 },
}

impl OneshotError {
    /// Get a user-friendly error message with suggested action
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!(
                    "Config file not found: {}\n  Check the path and try again.",
                    path
                )
            }

            Self::Config(ConfigError::InvalidKey { field }) => {
                format!(
                    "Invalid {} in config. Expected 32-byte base64-encoded key.",
                    field
                )
            }

            Self::Network(NetworkError::Timeout { stage, millis }) => {
                format!(
                    "No {} reply within {}ms.\n  \
                    Check network connectivity and firewall rules for the peer's UDP port.",
                    stage, millis
                )
            }

            Self::Crypto(CryptoError::Decryption) => {
                "Reply failed authentication. The peer's public key or preshared key may be incorrect."
                    .to_string()
            }

            _ => format!("{}", self),
        }
    }

    /// Check if a caller may retry with a fresh session
    ///
    /// Only network failures qualify. Crypto and protocol failures mean the
    /// peer rejected or could not be authenticated, and a new attempt with the
    /// same configuration ends the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if the peer simply did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(NetworkError::Timeout { .. }))
    }

    /// Check if the peer's messages could not be authenticated
    ///
    /// A received message that is truncated, mistyped, addressed to another
    /// index or malformed inside counts the same as a failed AEAD open.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::Decryption | CryptoError::ZeroSharedSecret)
                | Self::Protocol(
                    ProtocolError::InvalidMessageType { .. }
                        | ProtocolError::InvalidMessageLength { .. }
                        | ProtocolError::InvalidReceiverIndex { .. }
                        | ProtocolError::MalformedPacket { .. }
                )
        )
    }

    /// Get the exit code for this error
    ///
    /// Authentication failures, framing errors of received replies included,
    /// share code 5 with the other crypto errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Network(NetworkError::Timeout { .. }) => 2,
            Self::Network(_) => 3,
            Self::Crypto(_) => 5,
            err if err.is_authentication_failure() => 5,
            Self::Protocol(_) => 4,
        }
    }
}

/// Result type alias for one-shot operations
pub type Result<T> = std::result::Result<T, OneshotError>;
