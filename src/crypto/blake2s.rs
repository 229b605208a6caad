//! BLAKE2s cryptographic primitives for WireGuard
//!
//! Implements BLAKE2s hash, keyed MAC, HMAC, and the HKDF-style KDF used by
//! the Noise handshake.

use blake2::{
    digest::{consts::U16, FixedOutput, Mac as MacTrait, Update},
    Blake2s256, Blake2sMac, Digest,
};
use hmac::SimpleHmac;
use zeroize::Zeroizing;

/// Type alias for HMAC-BLAKE2s (RFC 2104 HMAC with BLAKE2s-256)
type HmacBlake2s = SimpleHmac<Blake2s256>;

/// Length of BLAKE2s-256 hash output
pub const HASH_LEN: usize = 32;

/// Length of BLAKE2s MAC output (16 bytes for WireGuard)
pub const MAC_LEN: usize = 16;

/// BLAKE2s-256 hash of a single input
pub fn hash(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Blake2s256::new();
    Digest::update(&mut hasher, data);
    hasher.finalize().into()
}

/// BLAKE2s-256 hash of two concatenated inputs: HASH(a || b)
pub fn hash_two(a: &[u8], b: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Blake2s256::new();
    Digest::update(&mut hasher, a);
    Digest::update(&mut hasher, b);
    hasher.finalize().into()
}

/// Transcript update: new_hash = HASH(old_hash || data)
pub fn mix_hash(old_hash: &[u8; HASH_LEN], data: &[u8]) -> [u8; HASH_LEN] {
    hash_two(old_hash, data)
}

/// BLAKE2s keyed MAC with 16 bytes of output
///
/// Keyed with the 32-byte mac1 key for MAC1 and with the 16-byte cookie for MAC2.
pub fn mac(key: &[u8], data: &[u8]) -> [u8; MAC_LEN] {
    // Blake2sMac accepts any key up to 32 bytes; callers only pass 16 or 32.
    let mut mac = Blake2sMac::<U16>::new_from_slice(key).expect("BLAKE2s key is at most 32 bytes");
    MacTrait::update(&mut mac, data);
    mac.finalize_fixed().into()
}

/// HMAC-BLAKE2s using the standard RFC 2104 construction
///
/// H((K ⊕ opad) || H((K ⊕ ipad) || M)), as every WireGuard implementation computes it.
pub fn hmac(key: &[u8], data: &[u8]) -> [u8; HASH_LEN] {
    let mut mac = HmacBlake2s::new_from_slice(key).expect("HMAC accepts any key length");
    Update::update(&mut mac, data);
    mac.finalize_fixed().into()
}

/// HMAC over `prev || counter`, the chained step of the KDF expansion
fn hmac_chained(prk: &[u8; HASH_LEN], prev: &[u8; HASH_LEN], counter: u8) -> [u8; HASH_LEN] {
    let mut input = Zeroizing::new([0u8; HASH_LEN + 1]);
    input[..HASH_LEN].copy_from_slice(prev);
    input[HASH_LEN] = counter;
    hmac(prk, &input[..])
}

/// KDF1: Single-output key derivation
pub fn kdf1(key: &[u8; HASH_LEN], input: &[u8]) -> [u8; HASH_LEN] {
    let prk = Zeroizing::new(hmac(key, input));
    hmac(&prk[..], &[0x01])
}

/// KDF2: Two-output key derivation
pub fn kdf2(key: &[u8; HASH_LEN], input: &[u8]) -> ([u8; HASH_LEN], [u8; HASH_LEN]) {
    let prk = Zeroizing::new(hmac(key, input));

    // T1 = HMAC(prk, 0x01)
    let t1 = hmac(&prk[..], &[0x01]);
    // T2 = HMAC(prk, T1 || 0x02)
    let t2 = hmac_chained(&prk, &t1, 0x02);

    (t1, t2)
}

/// KDF3: Three-output key derivation
pub fn kdf3(
    key: &[u8; HASH_LEN],
    input: &[u8],
) -> ([u8; HASH_LEN], [u8; HASH_LEN], [u8; HASH_LEN]) {
    let prk = Zeroizing::new(hmac(key, input));

    let t1 = hmac(&prk[..], &[0x01]);
    let t2 = hmac_chained(&prk, &t1, 0x02);
    let t3 = hmac_chained(&prk, &t2, 0x03);

    (t1, t2, t3)
}

/// Derive `n` outputs for `n` in 1..=3
///
/// Returns `None` for any other `n`. The caller owns wiping the returned keys.
pub fn kdf(n: usize, key: &[u8; HASH_LEN], input: &[u8]) -> Option<Vec<[u8; HASH_LEN]>> {
    let outputs = match n {
        1 => vec![kdf1(key, input)],
        2 => {
            let (t0, t1) = kdf2(key, input);
            vec![t0, t1]
        }
        3 => {
            let (t0, t1, t2) = kdf3(key, input);
            vec![t0, t1, t2]
        }
        _ => return None,
    };
    Some(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_empty() {
        // BLAKE2s-256("") from RFC 7693 reference implementation
        let expected =
            hex::decode("69217a3079908094e11121d042354a7c1f55b6482ca1a51e1b250dfd1ed0eef9")
                .unwrap();
        assert_eq!(hash(&[]).to_vec(), expected);
    }

    #[test]
    fn test_hash_two() {
        let a = b"hello";
        let b = b"world";

        let mut combined = Vec::new();
        combined.extend_from_slice(a);
        combined.extend_from_slice(b);

        assert_eq!(hash_two(a, b), hash(&combined));
        assert_eq!(mix_hash(&hash(a), b), hash_two(&hash(a), b));
    }

    #[test]
    fn test_mac_key_sizes() {
        let data = b"test data";
        let long = mac(&[0u8; 32], data);
        let short = mac(&[0u8; 16], data);
        assert_eq!(long.len(), MAC_LEN);
        assert_eq!(short.len(), MAC_LEN);
        // Key length is part of the BLAKE2s parameter block
        assert_ne!(long, short);
    }

    #[test]
    fn test_kdf_chain_matches_hmac_definition() {
        let key = [7u8; 32];
        let input = b"input key material";

        let prk = hmac(&key, input);
        let t0 = hmac(&prk, &[0x01]);
        let mut t1_in = t0.to_vec();
        t1_in.push(0x02);
        let t1 = hmac(&prk, &t1_in);
        let mut t2_in = t1.to_vec();
        t2_in.push(0x03);
        let t2 = hmac(&prk, &t2_in);

        assert_eq!(kdf1(&key, input), t0);
        assert_eq!(kdf2(&key, input), (t0, t1));
        assert_eq!(kdf3(&key, input), (t0, t1, t2));
    }

    #[test]
    fn test_kdf_is_deterministic() {
        let key = [3u8; 32];
        let input = b"same input";

        for n in 1..=3 {
            assert_eq!(kdf(n, &key, input), kdf(n, &key, input));
            assert_eq!(kdf(n, &key, input).unwrap().len(), n);
        }
        assert_eq!(kdf(3, &key, input).unwrap()[0], kdf1(&key, input));
    }

    #[test]
    fn test_kdf_rejects_unsupported_output_count() {
        let key = [3u8; 32];
        assert!(kdf(0, &key, b"input").is_none());
        assert!(kdf(4, &key, b"input").is_none());
    }

    #[test]
    fn test_kdf_avalanche() {
        let key = [3u8; 32];
        let (a0, a1, a2) = kdf3(&key, b"input-0");
        let (b0, b1, b2) = kdf3(&key, b"input-1");
        assert_ne!(a0, b0);
        assert_ne!(a1, b1);
        assert_ne!(a2, b2);

        let mut other_key = key;
        other_key[31] ^= 1;
        let (c0, c1, c2) = kdf3(&other_key, b"input-0");
        assert_ne!(a0, c0);
        assert_ne!(a1, c1);
        assert_ne!(a2, c2);
    }

    #[test]
    fn test_kdf_outputs_distinct() {
        let (k3a, k3b, k3c) = kdf3(&[0u8; 32], b"test input");
        assert_ne!(k3a, k3b);
        assert_ne!(k3b, k3c);
        assert_ne!(k3a, k3c);
    }
}
