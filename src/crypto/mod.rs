//! Cryptographic primitives for WireGuard
//!
//! This module provides all cryptographic operations needed for the one-shot exchange:
//! - BLAKE2s hashing, keyed MAC, HMAC, and key derivation (blake2s)
//! - ChaCha20-Poly1305 AEAD encryption (aead)
//! - X25519 key types and Diffie-Hellman (x25519)
//! - Noise IKpsk2 symmetric state (noise)

pub mod aead;
pub mod blake2s;
pub mod noise;
pub mod x25519;

pub use x25519::{PresharedKey, PrivateKey, PublicKey, SharedSecret};
