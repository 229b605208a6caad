//! X25519 Diffie-Hellman key exchange for WireGuard
//!
//! Provides key types and DH operations using Curve25519. Secret-bearing
//! types wipe their bytes on drop.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Key length for X25519 (both private and public keys are 32 bytes)
pub const KEY_LEN: usize = 32;

/// Curve25519 private key, clamped at construction
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_LEN]);

/// Curve25519 public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_LEN]);

/// Optional symmetric key mixed into the handshake (all-zero when unused)
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct PresharedKey([u8; KEY_LEN]);

/// Output of a single X25519 scalar multiplication
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; KEY_LEN]);

impl PrivateKey {
    /// Build a private key from raw bytes, clamping per X25519
    pub fn from_bytes(mut bytes: [u8; KEY_LEN]) -> Self {
        clamp(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    /// Generate a fresh private key from the OS random source
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomSource {
                reason: e.to_string(),
            })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Derive the matching public key (base-point multiplication)
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.0);
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    /// Scalar multiplication with a peer's public key
    pub fn shared_secret(&self, peer: &PublicKey) -> SharedSecret {
        let secret = StaticSecret::from(self.0);
        let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer.0));
        SharedSecret(*shared.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; KEY_LEN] {
        self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..8]))
    }
}

impl PresharedKey {
    pub fn from_bytes(mut bytes: [u8; KEY_LEN]) -> Self {
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresharedKey(..)")
    }
}

impl SharedSecret {
    /// Constant-time check for the all-zero output of a low-order point
    pub fn is_zero(&self) -> bool {
        self.0.ct_eq(&[0u8; KEY_LEN]).into()
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Force the X25519 scalar bits: clear the low three, clear the top, set bit 254
pub fn clamp(key: &mut [u8; KEY_LEN]) {
    key[0] &= 248;
    key[31] = (key[31] & 127) | 64;
}

/// Generate a new clamped private key
pub fn generate_private_key() -> Result<PrivateKey, CryptoError> {
    PrivateKey::generate()
}

/// Derive public key from private key
pub fn derive_public_key(private_key: &PrivateKey) -> PublicKey {
    private_key.public_key()
}

/// Perform X25519 Diffie-Hellman key exchange
pub fn dh(private_key: &PrivateKey, public_key: &PublicKey) -> SharedSecret {
    private_key.shared_secret(public_key)
}
