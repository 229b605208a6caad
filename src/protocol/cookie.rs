//! MAC1/MAC2 generation for outgoing handshake messages
//!
//! MAC1 proves knowledge of the responder's static public key. MAC2 is keyed
//! with the last cookie the responder handed out; a one-shot client never
//! receives one, so MAC2 is computed over the all-zero cookie.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{blake2s, noise, PublicKey};
use crate::error::ProtocolError;

/// Length of a cookie and of each MAC field
pub const COOKIE_LEN: usize = 16;

/// Both MAC fields together occupy the last 32 bytes of a handshake message
const MACS_LEN: usize = 2 * blake2s::MAC_LEN;

/// Per-peer MAC state, owned by a single session
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CookieGenerator {
    /// HASH("mac1----" || peer_public)
    mac1_key: [u8; 32],
    /// Last cookie received (all-zero until one arrives)
    cookie: [u8; COOKIE_LEN],
    /// Whether `cookie` holds a received value
    has_cookie: bool,
    /// HASH("cookie--" || peer_public), for decrypting cookie replies
    cookie_encryption_key: [u8; 32],
    /// MAC1 of the last message we stamped
    last_mac1: Option<[u8; blake2s::MAC_LEN]>,
}

impl CookieGenerator {
    /// Derive the MAC keys from the responder's static public key
    pub fn new(remote_static: &PublicKey) -> Self {
        Self {
            mac1_key: noise::mac1_key(remote_static.as_bytes()),
            cookie: [0u8; COOKIE_LEN],
            has_cookie: false,
            cookie_encryption_key: noise::cookie_key(remote_static.as_bytes()),
            last_mac1: None,
        }
    }

    /// Fill the two trailing MAC fields of `msg` in place
    ///
    /// mac1 = MAC(mac1_key, msg[..len-32]); mac2 = MAC(cookie, msg[..len-16])
    pub fn add_macs(&mut self, msg: &mut [u8]) -> Result<(), ProtocolError> {
        if msg.len() < MACS_LEN {
            return Err(ProtocolError::InvalidMessageLength {
                expected: MACS_LEN,
                got: msg.len(),
            });
        }

        let mac2_offset = msg.len() - blake2s::MAC_LEN;
        let mac1_offset = mac2_offset - blake2s::MAC_LEN;

        let mac1 = blake2s::mac(&self.mac1_key, &msg[..mac1_offset]);
        msg[mac1_offset..mac2_offset].copy_from_slice(&mac1);
        self.last_mac1 = Some(mac1);

        let mac2 = blake2s::mac(&self.cookie, &msg[..mac2_offset]);
        msg[mac2_offset..].copy_from_slice(&mac2);
        Ok(())
    }

    /// MAC1 of the last stamped message
    pub fn last_mac1(&self) -> Option<&[u8; blake2s::MAC_LEN]> {
        self.last_mac1.as_ref()
    }

    pub fn has_cookie(&self) -> bool {
        self.has_cookie
    }

    pub fn cookie_encryption_key(&self) -> &[u8; 32] {
        &self.cookie_encryption_key
    }
}
