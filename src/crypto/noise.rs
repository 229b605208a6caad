//! Noise IKpsk2 symmetric state for WireGuard
//!
//! Implements the chaining-key / transcript-hash bookkeeping of the pattern
//! Noise_IKpsk2_25519_ChaChaPoly_BLAKE2s. The message flow itself lives in
//! `protocol::handshake`.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{aead, blake2s};
use crate::error::CryptoError;

/// Noise protocol construction string
pub const CONSTRUCTION: &[u8] = b"Noise_IKpsk2_25519_ChaChaPoly_BLAKE2s";

/// WireGuard identifier string
pub const IDENTIFIER: &[u8] = b"WireGuard v1 zx2c4 Jason@zx2c4.com";

/// Label for MAC1 key derivation
pub const LABEL_MAC1: &[u8] = b"mac1----";

/// Label for cookie key derivation
pub const LABEL_COOKIE: &[u8] = b"cookie--";

/// Hash length (also chaining key length)
pub const HASH_LEN: usize = 32;

/// Running chaining key and transcript hash
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HandshakeState {
    /// Chaining key for key derivation
    pub chaining_key: [u8; HASH_LEN],
    /// Hash accumulator
    pub hash: [u8; HASH_LEN],
}

impl HandshakeState {
    /// ck = HASH(CONSTRUCTION)
    pub fn initial_chain_key() -> [u8; HASH_LEN] {
        blake2s::hash(CONSTRUCTION)
    }

    /// h = HASH(HASH(HASH(CONSTRUCTION) || IDENTIFIER) || responder_static_public)
    pub fn initial_hash(responder_static: &[u8; 32]) -> [u8; HASH_LEN] {
        let ck = Self::initial_chain_key();
        let h1 = blake2s::mix_hash(&ck, IDENTIFIER);
        blake2s::mix_hash(&h1, responder_static)
    }

    /// State shared by both roles before the first message
    ///
    /// In the IK pattern both parties hash the responder's static key first.
    pub fn new(responder_static: &[u8; 32]) -> Self {
        Self {
            chaining_key: Self::initial_chain_key(),
            hash: Self::initial_hash(responder_static),
        }
    }

    /// MixHash: h = HASH(h || data)
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.hash = blake2s::mix_hash(&self.hash, data);
    }

    /// ck = KDF1(ck, data), used for ephemeral keys and the response DH outputs
    pub fn mix_chain(&mut self, data: &[u8]) {
        self.chaining_key = blake2s::kdf1(&self.chaining_key, data);
    }

    /// MixKey: (ck, k) = KDF2(ck, input_key_material)
    pub fn mix_key(&mut self, input: &[u8]) -> Zeroizing<[u8; 32]> {
        let (new_ck, key) = blake2s::kdf2(&self.chaining_key, input);
        self.chaining_key = new_ck;
        Zeroizing::new(key)
    }

    /// MixKeyAndHash: (ck, tau, k) = KDF3(ck, psk); h = HASH(h || tau)
    pub fn mix_key_and_hash(&mut self, psk: &[u8; 32]) -> Zeroizing<[u8; 32]> {
        let (new_ck, mut tau, key) = blake2s::kdf3(&self.chaining_key, psk);
        self.chaining_key = new_ck;
        self.mix_hash(&tau);
        tau.zeroize();
        Zeroizing::new(key)
    }

    /// c = AEAD-Encrypt(k, 0, plaintext, h); h = HASH(h || c)
    pub fn encrypt_and_hash(
        &mut self,
        key: &[u8; 32],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let ciphertext = aead::encrypt(key, 0, plaintext, &self.hash)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// p = AEAD-Decrypt(k, 0, c, h); h = HASH(h || c)
    pub fn decrypt_and_hash(
        &mut self,
        key: &[u8; 32],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let plaintext = aead::decrypt(key, 0, ciphertext, &self.hash)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }
}

/// Transport keys derived from a completed handshake
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TransportKeys {
    /// Key for sending packets
    pub sending_key: [u8; 32],
    /// Key for receiving packets
    pub receiving_key: [u8; 32],
}

impl TransportKeys {
    /// Initiator: (sending_key, receiving_key) = KDF2(ck, "")
    pub fn derive_initiator(chaining_key: &[u8; 32]) -> Self {
        let (t_send, t_recv) = blake2s::kdf2(chaining_key, &[]);
        Self {
            sending_key: t_send,
            receiving_key: t_recv,
        }
    }

    /// Responder: the same outputs with the roles swapped
    pub fn derive_responder(chaining_key: &[u8; 32]) -> Self {
        let (t_recv, t_send) = blake2s::kdf2(chaining_key, &[]);
        Self {
            sending_key: t_send,
            receiving_key: t_recv,
        }
    }
}

/// mac1_key = HASH(LABEL_MAC1 || peer_public_key)
pub fn mac1_key(peer_public: &[u8; 32]) -> [u8; 32] {
    blake2s::hash_two(LABEL_MAC1, peer_public)
}

/// cookie_key = HASH(LABEL_COOKIE || peer_public_key)
pub fn cookie_key(peer_public: &[u8; 32]) -> [u8; 32] {
    blake2s::hash_two(LABEL_COOKIE, peer_public)
}
