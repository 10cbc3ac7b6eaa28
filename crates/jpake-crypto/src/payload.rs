//! Sealing of pairing payloads under a derived [`KeyBundle`].
//!
//! The encryption key drives ChaCha20-Poly1305 with a random 12-byte IV and
//! the HMAC key authenticates the ciphertext (HMAC-SHA256). The same
//! construction, without the HMAC, carries the key-confirmation value that
//! lets the PIN holder detect a PIN mismatch.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hmac::{Hmac, Mac};
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use constant_time_eq::constant_time_eq;
use thiserror::Error;

use crate::kdf::KeyBundle;

type HmacSha256 = Hmac<Sha256>;

pub const IV_LEN: usize = 12;

/// Plaintext both ends seal and compare to confirm they derived the same keys.
pub const KEY_CONFIRMATION_VALUE: &[u8] = b"0123456789ABCDEF";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("hmac mismatch")]
    HmacMismatch,
    #[error("invalid iv length: {0}")]
    InvalidIv(usize),
}

/// Ciphertext, IV and optional HMAC as carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub hmac: Option<[u8; 32]>,
}

fn cipher(bundle: &KeyBundle) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(bundle.enc_key()))
}

fn ciphertext_hmac(bundle: &KeyBundle, ciphertext: &[u8]) -> [u8; 32] {
    // KeyInit is in scope for the cipher and also provides new_from_slice.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(bundle.hmac_key())
        .expect("HMAC can take keys of any size");
    mac.update(ciphertext);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn encrypt<R: RngCore + CryptoRng>(
    bundle: &KeyBundle,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<(Vec<u8>, Vec<u8>), PayloadError> {
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);
    let ciphertext = cipher(bundle)
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| PayloadError::EncryptionFailed)?;
    Ok((ciphertext, iv.to_vec()))
}

fn decrypt(bundle: &KeyBundle, payload: &EncryptedPayload) -> Result<Vec<u8>, PayloadError> {
    if payload.iv.len() != IV_LEN {
        return Err(PayloadError::InvalidIv(payload.iv.len()));
    }
    cipher(bundle)
        .decrypt(Nonce::from_slice(&payload.iv), payload.ciphertext.as_slice())
        .map_err(|_| PayloadError::DecryptionFailed)
}

/// Encrypt `plaintext` and attach an HMAC over the ciphertext.
pub fn seal<R: RngCore + CryptoRng>(
    bundle: &KeyBundle,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<EncryptedPayload, PayloadError> {
    let (ciphertext, iv) = encrypt(bundle, plaintext, rng)?;
    let hmac = ciphertext_hmac(bundle, &ciphertext);
    Ok(EncryptedPayload {
        ciphertext,
        iv,
        hmac: Some(hmac),
    })
}

/// Check the HMAC (when present) and decrypt.
pub fn open(bundle: &KeyBundle, payload: &EncryptedPayload) -> Result<Vec<u8>, PayloadError> {
    if let Some(tag) = &payload.hmac {
        let expected = ciphertext_hmac(bundle, &payload.ciphertext);
        if !constant_time_eq(&expected, tag) {
            return Err(PayloadError::HmacMismatch);
        }
    }
    decrypt(bundle, payload)
}

/// Seal the fixed confirmation value (no HMAC).
pub fn key_confirmation<R: RngCore + CryptoRng>(
    bundle: &KeyBundle,
    rng: &mut R,
) -> Result<EncryptedPayload, PayloadError> {
    let (ciphertext, iv) = encrypt(bundle, KEY_CONFIRMATION_VALUE, rng)?;
    Ok(EncryptedPayload {
        ciphertext,
        iv,
        hmac: None,
    })
}

/// True when `payload` opens under `bundle` to the confirmation value.
pub fn verify_key_confirmation(bundle: &KeyBundle, payload: &EncryptedPayload) -> bool {
    match decrypt(bundle, payload) {
        Ok(plaintext) => constant_time_eq(&plaintext, KEY_CONFIRMATION_VALUE),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn bundle(byte: u8) -> KeyBundle {
        KeyBundle::new([byte; 32], [byte.wrapping_add(1); 32])
    }

    #[test]
    fn test_seal_open() {
        let b = bundle(1);
        let sealed = seal(&b, b"credentials", &mut OsRng).unwrap();
        assert_eq!(sealed.iv.len(), IV_LEN);
        assert!(sealed.hmac.is_some());
        assert_eq!(open(&b, &sealed).unwrap(), b"credentials");
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let b = bundle(1);
        let one = seal(&b, b"same", &mut OsRng).unwrap();
        let two = seal(&b, b"same", &mut OsRng).unwrap();
        assert_ne!(one.iv, two.iv);
        assert_ne!(one.ciphertext, two.ciphertext);
    }

    #[test]
    fn test_tampered_ciphertext_fails_hmac() {
        let b = bundle(1);
        let mut sealed = seal(&b, b"credentials", &mut OsRng).unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert_eq!(open(&b, &sealed), Err(PayloadError::HmacMismatch));
    }

    #[test]
    fn test_hmac_covers_ciphertext_under_hmac_key() {
        let b = bundle(1);
        let sealed = seal(&b, b"credentials", &mut OsRng).unwrap();

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&[2u8; 32]).unwrap();
        mac.update(&sealed.ciphertext);
        let expected: [u8; 32] = mac.finalize().into_bytes().into();
        assert_eq!(sealed.hmac, Some(expected));
    }

    #[test]
    fn test_tag_differing_in_last_byte_fails() {
        let b = bundle(1);
        let mut sealed = seal(&b, b"credentials", &mut OsRng).unwrap();
        if let Some(tag) = sealed.hmac.as_mut() {
            tag[31] ^= 0x80;
        }
        assert_eq!(open(&b, &sealed), Err(PayloadError::HmacMismatch));
    }

    #[test]
    fn test_without_hmac_aead_still_authenticates() {
        let b = bundle(1);
        let mut sealed = seal(&b, b"credentials", &mut OsRng).unwrap();
        sealed.hmac = None;
        sealed.ciphertext[0] ^= 0x01;
        assert_eq!(open(&b, &sealed), Err(PayloadError::DecryptionFailed));
    }

    #[test]
    fn test_bad_iv_length() {
        let b = bundle(1);
        let mut sealed = seal(&b, b"x", &mut OsRng).unwrap();
        sealed.iv.truncate(8);
        sealed.hmac = None;
        assert_eq!(open(&b, &sealed), Err(PayloadError::InvalidIv(8)));
    }

    #[test]
    fn test_key_confirmation() {
        let b = bundle(1);
        let confirmation = key_confirmation(&b, &mut OsRng).unwrap();
        assert!(confirmation.hmac.is_none());
        assert!(verify_key_confirmation(&b, &confirmation));
        assert!(!verify_key_confirmation(&bundle(2), &confirmation));
    }
}
