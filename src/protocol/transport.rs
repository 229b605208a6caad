//! Transport data encryption for the single tunneled exchange
//!
//! Seals one synthetic IP/UDP datagram under the session's send key and opens
//! exactly one reply under its receive key. The counter is fixed at zero:
//! each key pair protects one message in each direction.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use chacha20poly1305::{aead::KeyInit, ChaCha20Poly1305, Key};
use tokio::net::UdpSocket;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aead;
use crate::crypto::noise::TransportKeys;
use crate::error::{NetworkError, OneshotError, ProtocolError, Stage};
use crate::protocol::messages::TransportHeader;
use crate::protocol::packet::{self, DatagramHeader};

/// Counter of the one transport message sent per session
pub const SEND_COUNTER: u64 = 0;

/// Receive buffer size for the reply datagram
pub const RECEIVE_BUFFER_SIZE: usize = 65535;

/// One direction of the tunnel: a ChaCha20-Poly1305 context and its key
///
/// The raw key is kept alongside the cipher so it can be wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TransportCipher {
    key: [u8; aead::KEY_LEN],
    #[zeroize(skip)]
    cipher: ChaCha20Poly1305,
}

impl TransportCipher {
    pub fn new(key: &[u8; aead::KEY_LEN]) -> Self {
        Self {
            key: *key,
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Seal with no associated data
    pub fn seal(&self, counter: u64, plaintext: &[u8]) -> Result<Vec<u8>, OneshotError> {
        Ok(aead::seal_with(&self.cipher, counter, plaintext, &[])?)
    }

    /// Open with no associated data
    pub fn open(&self, counter: u64, ciphertext: &[u8]) -> Result<Vec<u8>, OneshotError> {
        Ok(aead::open_with(&self.cipher, counter, ciphertext, &[])?)
    }
}

/// Transport state produced by a completed handshake
pub struct KeyPair {
    /// Outbound context (first KDF output for the initiator)
    pub send: TransportCipher,
    /// Inbound context (second KDF output for the initiator)
    pub receive: TransportCipher,
    /// When the handshake completed
    pub created: Instant,
    /// Index the peer uses to address us
    pub local_index: u32,
    /// Index we use to address the peer
    pub remote_index: u32,
}

impl KeyPair {
    /// Build both cipher contexts; the caller's `keys` are wiped when dropped
    pub fn new(keys: &TransportKeys, local_index: u32, remote_index: u32) -> Self {
        Self {
            send: TransportCipher::new(&keys.sending_key),
            receive: TransportCipher::new(&keys.receiving_key),
            created: Instant::now(),
            local_index,
            remote_index,
        }
    }

    /// Time since the handshake completed
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("local_index", &self.local_index)
            .field("remote_index", &self.remote_index)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

/// Build the complete transport message for `payload`
///
/// IP/UDP wrap, zero-pad to 16 bytes, seal under the send key with counter 0,
/// prefix the 16-byte transport header.
pub fn seal_packet(
    key_pair: &KeyPair,
    payload: &[u8],
    source: Ipv4Addr,
    destination: Ipv4Addr,
    destination_port: u16,
) -> Result<Vec<u8>, OneshotError> {
    let header = DatagramHeader::new(source, destination, destination_port);
    let mut datagram = packet::build_datagram(&header, payload)?;
    packet::pad_to_block(&mut datagram);

    let sealed = key_pair.send.seal(SEND_COUNTER, &datagram)?;
    datagram.zeroize();

    let transport = TransportHeader {
        receiver: key_pair.remote_index,
        counter: SEND_COUNTER,
    };
    Ok(transport.build_message(&sealed))
}

/// Authenticate and decrypt a transport reply, returning the inner UDP payload
pub fn open_packet(key_pair: &KeyPair, message: &[u8]) -> Result<Vec<u8>, OneshotError> {
    let header = TransportHeader::from_bytes(message)?;
    if header.receiver != key_pair.local_index {
        return Err(ProtocolError::InvalidReceiverIndex {
            expected: key_pair.local_index,
            got: header.receiver,
        }
        .into());
    }

    let plaintext = key_pair
        .receive
        .open(header.counter, TransportHeader::payload(message))?;
    let payload = packet::strip_datagram(&plaintext)?.to_vec();

    Ok(payload)
}

/// Seal `payload` and write it to the connected socket
pub async fn seal_and_send(
    socket: &UdpSocket,
    key_pair: &KeyPair,
    payload: &[u8],
    source: Ipv4Addr,
    destination: Ipv4Addr,
    destination_port: u16,
) -> Result<(), OneshotError> {
    let message = seal_packet(key_pair, payload, source, destination, destination_port)?;

    socket
        .send(&message)
        .await
        .map_err(|e| NetworkError::SendFailed {
            reason: e.to_string(),
        })?;

    tracing::debug!(
        "Sent transport message ({} bytes) to receiver {}",
        message.len(),
        key_pair.remote_index
    );
    Ok(())
}

/// Read one datagram within `timeout` and open it
pub async fn receive_and_open(
    socket: &UdpSocket,
    key_pair: &KeyPair,
    timeout: Duration,
) -> Result<Vec<u8>, OneshotError> {
    let mut buf = vec![0u8; RECEIVE_BUFFER_SIZE];
    let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| NetworkError::Timeout {
            stage: Stage::Transport,
            millis: timeout.as_millis() as u64,
        })?
        .map_err(|e| NetworkError::ReceiveFailed {
            reason: e.to_string(),
        })?;

    tracing::debug!("Received transport reply ({} bytes)", len);

    open_packet(key_pair, &buf[..len]).map_err(|e| {
        tracing::warn!("Rejected transport reply: {}", e);
        e
    })
}
