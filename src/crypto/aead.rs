//! AEAD encryption for WireGuard
//!
//! ChaCha20-Poly1305 with WireGuard's counter nonce, used both for the
//! handshake fields (counter 0, transcript hash as AAD) and for transport data.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::error::CryptoError;

/// Authentication tag length
pub const TAG_LEN: usize = 16;

/// ChaCha20-Poly1305 key length
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 12;

/// Build the 96-bit nonce: 4 zero bytes followed by the little-endian counter
pub fn nonce(counter: u64) -> [u8; NONCE_LEN] {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes[4..12].copy_from_slice(&counter.to_le_bytes());
    nonce_bytes
}

/// Encrypt with an already keyed cipher
pub fn seal_with(
    cipher: &ChaCha20Poly1305,
    counter: u64,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let nonce_bytes = nonce(counter);
    cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt with an already keyed cipher
pub fn open_with(
    cipher: &ChaCha20Poly1305,
    counter: u64,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::Decryption);
    }

    let nonce_bytes = nonce(counter);
    cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Decryption)
}

/// Encrypt plaintext using ChaCha20-Poly1305
pub fn encrypt(
    key: &[u8; KEY_LEN],
    counter: u64,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    seal_with(&cipher, counter, plaintext, aad)
}

/// Decrypt ciphertext using ChaCha20-Poly1305
///
/// Fails on any tag mismatch; there is no partial plaintext.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    counter: u64,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    open_with(&cipher, counter, ciphertext, aad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_layout() {
        let n = nonce(0x0102030405060708);
        assert_eq!(&n[..4], &[0, 0, 0, 0]);
        assert_eq!(&n[4..], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(nonce(0), [0u8; NONCE_LEN]);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [0u8; 32];
        let plaintext = b"Hello, WireGuard!";
        let aad = b"additional data";

        let ciphertext = encrypt(&key, 42, plaintext, aad).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

        let decrypted = decrypt(&key, 42, &ciphertext, aad).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let ciphertext = encrypt(&[0u8; 32], 42, b"Hello, WireGuard!", b"").unwrap();
        assert!(decrypt(&[1u8; 32], 42, &ciphertext, b"").is_err());
    }

    #[test]
    fn test_decrypt_wrong_counter() {
        let key = [0u8; 32];
        let ciphertext = encrypt(&key, 42, b"Hello, WireGuard!", b"").unwrap();
        assert!(decrypt(&key, 43, &ciphertext, b"").is_err());
    }

    #[test]
    fn test_decrypt_wrong_aad() {
        let key = [0u8; 32];
        let ciphertext = encrypt(&key, 0, b"Hello, WireGuard!", b"correct aad").unwrap();
        assert!(decrypt(&key, 0, &ciphertext, b"wrong aad").is_err());
    }

    #[test]
    fn test_every_bit_flip_is_rejected() {
        let key = [9u8; 32];
        let ciphertext = encrypt(&key, 0, b"tamper me", b"aad").unwrap();

        for byte in 0..ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = ciphertext.clone();
                tampered[byte] ^= 1 << bit;
                assert!(decrypt(&key, 0, &tampered, b"aad").is_err());
            }
        }
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [0u8; 32];

        // The handshake response seals an empty payload
        let ciphertext = encrypt(&key, 0, &[], b"").unwrap();
        assert_eq!(ciphertext.len(), TAG_LEN);

        let decrypted = decrypt(&key, 0, &ciphertext, b"").unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_short_ciphertext() {
        assert!(matches!(
            decrypt(&[0u8; 32], 0, &[0u8; TAG_LEN - 1], b""),
            Err(CryptoError::Decryption)
        ));
    }
}
