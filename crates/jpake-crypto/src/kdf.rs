//! Key material derivation from the shared J-PAKE group element.
//!
//! `prk = HMAC-SHA256(0^32, bytes(k))`, then RFC 5869 HKDF-Expand of 64
//! bytes: the first half is the encryption key, the second the HMAC key.

use std::fmt;

use constant_time_eq::constant_time_eq_32;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::bigint::to_unsigned_bytes;

type HmacSha256 = Hmac<Sha256>;

/// HKDF info label. Fixed across peers.
pub const HKDF_INFO: &[u8] = b"Sync-AES_256_CBC-HMAC256";

/// Encryption key and HMAC key derived from one pairing run.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyBundle {
    enc_key: [u8; 32],
    hmac_key: [u8; 32],
}

impl KeyBundle {
    pub fn new(enc_key: [u8; 32], hmac_key: [u8; 32]) -> Self {
        Self { enc_key, hmac_key }
    }

    pub fn enc_key(&self) -> &[u8; 32] {
        &self.enc_key
    }

    pub fn hmac_key(&self) -> &[u8; 32] {
        &self.hmac_key
    }
}

impl PartialEq for KeyBundle {
    fn eq(&self, other: &Self) -> bool {
        // Both halves are always compared.
        let enc = constant_time_eq_32(&self.enc_key, &other.enc_key);
        let mac = constant_time_eq_32(&self.hmac_key, &other.hmac_key);
        enc & mac
    }
}

impl Eq for KeyBundle {}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundle")
            .field("enc_key", &"<redacted>")
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

/// Turn the shared element `k` into a [`KeyBundle`].
pub fn derive_keys(k: &BigUint) -> KeyBundle {
    let mut ikm = to_unsigned_bytes(k);

    let mut mac = HmacSha256::new_from_slice(&[0u8; 32]).expect("HMAC can take keys of any size");
    mac.update(&ikm);
    let mut prk = [0u8; 32];
    prk.copy_from_slice(&mac.finalize().into_bytes());
    ikm.zeroize();

    let hk = Hkdf::<Sha256>::from_prk(&prk).expect("prk is one SHA-256 block");
    let mut okm = [0u8; 64];
    hk.expand(HKDF_INFO, &mut okm).expect("64 bytes is a valid HKDF length");
    prk.zeroize();

    let mut enc_key = [0u8; 32];
    let mut hmac_key = [0u8; 32];
    enc_key.copy_from_slice(&okm[..32]);
    hmac_key.copy_from_slice(&okm[32..]);
    okm.zeroize();

    KeyBundle { enc_key, hmac_key }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// HKDF-Expand written out block by block: T(i) = HMAC(prk, T(i-1) || info || i).
    fn manual_expand(prk: &[u8], info: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut prev: Vec<u8> = Vec::new();
        let mut i = 1u8;
        while out.len() < len {
            let mut mac = HmacSha256::new_from_slice(prk).unwrap();
            mac.update(&prev);
            mac.update(info);
            mac.update(&[i]);
            prev = mac.finalize().into_bytes().to_vec();
            out.extend_from_slice(&prev);
            i += 1;
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_matches_rfc5869_expand() {
        let k = BigUint::from_bytes_be(&[0xab; 192]);

        let mut mac = HmacSha256::new_from_slice(&[0u8; 32]).unwrap();
        mac.update(&[0xab; 192]);
        let prk = mac.finalize().into_bytes();
        let okm = manual_expand(&prk, HKDF_INFO, 64);

        let bundle = derive_keys(&k);
        assert_eq!(bundle.enc_key(), &okm[..32]);
        assert_eq!(bundle.hmac_key(), &okm[32..]);
    }

    #[test]
    fn test_matches_hkdf_with_zero_salt() {
        // Extract with a 32-byte zero salt is the same HMAC as our prk step.
        let k = BigUint::from(0x0102_0304_0506u64);
        let hk = Hkdf::<Sha256>::new(Some(&[0u8; 32]), &to_unsigned_bytes(&k));
        let mut okm = [0u8; 64];
        hk.expand(HKDF_INFO, &mut okm).unwrap();

        let bundle = derive_keys(&k);
        assert_eq!(bundle, KeyBundle::new(okm[..32].try_into().unwrap(), okm[32..].try_into().unwrap()));
    }

    #[test]
    fn test_keys_are_independent() {
        let bundle = derive_keys(&BigUint::from(42u32));
        assert_ne!(bundle.enc_key(), bundle.hmac_key());
        assert_ne!(derive_keys(&BigUint::from(43u32)), bundle);
    }

    #[test]
    fn test_bundles_differing_in_one_half_are_unequal() {
        let bundle = KeyBundle::new([1; 32], [2; 32]);
        let mut hmac_key = [2; 32];
        hmac_key[31] = 3;
        assert_ne!(bundle, KeyBundle::new([1; 32], hmac_key));
        assert_ne!(bundle, KeyBundle::new([0; 32], [2; 32]));
        assert_eq!(bundle, KeyBundle::new([1; 32], [2; 32]));
    }

    #[test]
    fn test_debug_redacts() {
        let rendered = format!("{:?}", derive_keys(&BigUint::from(1u32)));
        assert!(rendered.contains("redacted"));
    }
}
