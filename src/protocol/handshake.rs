//! WireGuard handshake implementation
//!
//! Initiator side of the Noise IKpsk2 pattern. `InitiatorHandshake` is a
//! sans-io, single-pass state machine: it produces one initiation message,
//! consumes exactly one response and yields a `KeyPair`. `perform` drives it
//! over a connected UDP socket.
//!
//! Every secret the handshake holds is wiped once keys are derived and on any
//! failure. A handshake that failed cannot be resumed.

use std::fmt;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::net::UdpSocket;
use zeroize::Zeroize;

use crate::config::ResolvedConfig;
use crate::crypto::noise::{HandshakeState, TransportKeys};
use crate::crypto::{PresharedKey, PrivateKey, PublicKey, SharedSecret};
use crate::error::{CryptoError, NetworkError, OneshotError, ProtocolError, Result, Stage};
use crate::protocol::cookie::CookieGenerator;
use crate::protocol::messages::{self, MessageInitiation, MessageResponse, MessageType};
use crate::protocol::timestamp;
use crate::protocol::transport::KeyPair;

/// Large enough to detect (and reject) oversized replies by length
const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Progress of an initiator handshake
///
/// The order is strictly linear. `Failed` is terminal and carries the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePhase {
    Init,
    StaticMixed,
    EphemeralSent,
    StaticStaticMixed,
    TimestampSent,
    MessageSent,
    ResponseReceived,
    KeysDerived,
    Failed(String),
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(cause) => write!(f, "Failed({})", cause),
            other => write!(f, "{:?}", other),
        }
    }
}

/// State for an in-progress handshake (initiator side)
pub struct InitiatorHandshake {
    /// Our static private key
    static_private: PrivateKey,
    /// Our static public key
    static_public: PublicKey,
    /// Peer's static public key
    remote_static: PublicKey,
    /// Pre-shared key (all-zero if not used)
    preshared_key: PresharedKey,
    /// DH(static_private, remote_static), computed up front
    precomputed_ss: SharedSecret,
    /// Ephemeral private key, held between the two messages
    ephemeral: Option<PrivateKey>,
    /// Chaining key and transcript hash
    state: HandshakeState,
    /// MAC1/MAC2 state for the peer
    cookies: CookieGenerator,
    /// Our sender index
    local_index: u32,
    phase: HandshakePhase,
}

impl InitiatorHandshake {
    /// Start a handshake from a validated configuration with a random sender index
    pub fn new(config: &ResolvedConfig) -> Result<Self> {
        let mut index = [0u8; 4];
        OsRng
            .try_fill_bytes(&mut index)
            .map_err(|e| CryptoError::RandomSource {
                reason: e.to_string(),
            })?;

        Ok(Self::from_keys(
            config.private_key.clone(),
            config.peer_public_key,
            config.preshared_key.clone(),
            u32::from_le_bytes(index),
        ))
    }

    /// Start a handshake from explicit keys and sender index
    pub fn from_keys(
        static_private: PrivateKey,
        remote_static: PublicKey,
        preshared_key: PresharedKey,
        local_index: u32,
    ) -> Self {
        let static_public = static_private.public_key();
        let precomputed_ss = static_private.shared_secret(&remote_static);

        let mut handshake = Self {
            static_private,
            static_public,
            remote_static,
            preshared_key,
            precomputed_ss,
            ephemeral: None,
            state: HandshakeState::new(remote_static.as_bytes()),
            cookies: CookieGenerator::new(&remote_static),
            local_index,
            phase: HandshakePhase::Init,
        };
        // HandshakeState::new already hashed the responder's static key
        handshake.phase = HandshakePhase::StaticMixed;
        handshake
    }

    pub fn phase(&self) -> &HandshakePhase {
        &self.phase
    }

    pub fn local_index(&self) -> u32 {
        self.local_index
    }

    /// Build the 148-byte initiation message
    ///
    /// The caller is expected to transmit the returned bytes; the handshake
    /// then waits in `MessageSent` for the response.
    pub fn create_initiation(&mut self) -> Result<[u8; MessageInitiation::SIZE]> {
        self.expect_phase(HandshakePhase::StaticMixed)?;
        let result = self.build_initiation();
        result.map_err(|e| self.fail(e))
    }

    fn build_initiation(&mut self) -> Result<[u8; MessageInitiation::SIZE]> {
        // e
        let ephemeral = PrivateKey::generate()?;
        let ephemeral_public = ephemeral.public_key();
        self.state.mix_chain(ephemeral_public.as_bytes());
        self.state.mix_hash(ephemeral_public.as_bytes());
        self.phase = HandshakePhase::EphemeralSent;
        tracing::debug!("Ephemeral public: {:?}", ephemeral_public);

        // es
        let es = ephemeral.shared_secret(&self.remote_static);
        if es.is_zero() {
            return Err(CryptoError::ZeroSharedSecret.into());
        }
        let key = self.state.mix_key(es.as_bytes());
        drop(es);
        self.ephemeral = Some(ephemeral);

        // s
        let encrypted_static: [u8; 48] = self
            .state
            .encrypt_and_hash(&key, self.static_public.as_bytes())?
            .try_into()
            .map_err(|_| CryptoError::Encryption)?;

        // ss
        if self.precomputed_ss.is_zero() {
            return Err(CryptoError::ZeroSharedSecret.into());
        }
        let key = self.state.mix_key(self.precomputed_ss.as_bytes());
        self.phase = HandshakePhase::StaticStaticMixed;

        // TAI64N
        let encrypted_timestamp: [u8; 28] = self
            .state
            .encrypt_and_hash(&key, &timestamp::now())?
            .try_into()
            .map_err(|_| CryptoError::Encryption)?;
        self.phase = HandshakePhase::TimestampSent;

        let mut msg = MessageInitiation::new(
            self.local_index,
            ephemeral_public.to_bytes(),
            encrypted_static,
            encrypted_timestamp,
        )
        .to_bytes();
        self.cookies.add_macs(&mut msg)?;
        self.phase = HandshakePhase::MessageSent;

        tracing::debug!(
            "Built handshake initiation ({} bytes, sender index {})",
            msg.len(),
            self.local_index
        );
        Ok(msg)
    }

    /// Process the peer's reply and derive the transport key pair
    pub fn consume_response(&mut self, data: &[u8]) -> Result<KeyPair> {
        self.expect_phase(HandshakePhase::MessageSent)?;
        let result = self.process_response(data);
        match result {
            Ok(key_pair) => {
                self.wipe();
                self.phase = HandshakePhase::KeysDerived;
                Ok(key_pair)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn process_response(&mut self, data: &[u8]) -> Result<KeyPair> {
        if let Ok(MessageType::CookieReply) = messages::message_type(data) {
            return Err(ProtocolError::CookieReplyReceived.into());
        }

        let response = MessageResponse::from_bytes(data)?;
        if response.receiver != self.local_index {
            return Err(ProtocolError::InvalidReceiverIndex {
                expected: self.local_index,
                got: response.receiver,
            }
            .into());
        }
        self.phase = HandshakePhase::ResponseReceived;
        tracing::debug!(
            "Handshake response from sender index {}",
            response.sender
        );

        let ephemeral = self
            .ephemeral
            .take()
            .ok_or_else(|| ProtocolError::UnexpectedPhase {
                phase: self.phase.to_string(),
            })?;
        let remote_ephemeral = PublicKey::from_bytes(response.ephemeral);

        // e
        self.state.mix_hash(&response.ephemeral);
        self.state.mix_chain(&response.ephemeral);

        // ee
        let ee = ephemeral.shared_secret(&remote_ephemeral);
        drop(ephemeral);
        if ee.is_zero() {
            return Err(CryptoError::ZeroSharedSecret.into());
        }
        self.state.mix_chain(ee.as_bytes());
        drop(ee);

        // se
        let se = self.static_private.shared_secret(&remote_ephemeral);
        if se.is_zero() {
            return Err(CryptoError::ZeroSharedSecret.into());
        }
        self.state.mix_chain(se.as_bytes());
        drop(se);

        // psk
        let key = self
            .state
            .mix_key_and_hash(self.preshared_key.as_bytes());

        self.state
            .decrypt_and_hash(&key, &response.encrypted_empty)?;

        let keys = TransportKeys::derive_initiator(&self.state.chaining_key);
        Ok(KeyPair::new(&keys, self.local_index, response.sender))
    }

    fn expect_phase(&self, expected: HandshakePhase) -> Result<()> {
        if self.phase != expected {
            return Err(ProtocolError::UnexpectedPhase {
                phase: self.phase.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn fail(&mut self, err: OneshotError) -> OneshotError {
        tracing::warn!("Handshake failed in phase {}: {}", self.phase, err);
        self.wipe();
        self.phase = HandshakePhase::Failed(err.to_string());
        err
    }

    /// Zero every secret the handshake still holds
    fn wipe(&mut self) {
        self.static_private.zeroize();
        self.preshared_key.zeroize();
        self.precomputed_ss.zeroize();
        self.ephemeral.zeroize();
        self.state.zeroize();
        self.cookies.zeroize();
    }
}

/// Run a complete handshake over a connected socket
///
/// Sends one initiation and waits up to `timeout` for exactly one reply.
pub async fn perform(
    socket: &UdpSocket,
    config: &ResolvedConfig,
    timeout: Duration,
) -> Result<KeyPair> {
    let mut handshake = InitiatorHandshake::new(config)?;
    let initiation = handshake.create_initiation()?;

    socket
        .send(&initiation)
        .await
        .map_err(|e| NetworkError::SendFailed {
            reason: e.to_string(),
        })?;
    tracing::info!(
        "Sent handshake initiation (sender index {})",
        handshake.local_index()
    );

    let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
    let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| NetworkError::Timeout {
            stage: Stage::Handshake,
            millis: timeout.as_millis() as u64,
        })?
        .map_err(|e| NetworkError::ReceiveFailed {
            reason: e.to_string(),
        })?;

    let key_pair = handshake.consume_response(&buf[..len])?;
    tracing::info!(
        "Handshake complete (local index {}, remote index {})",
        key_pair.local_index,
        key_pair.remote_index
    );
    Ok(key_pair)
}
