//! J-PAKE cryptography for PIN-based device pairing.
//!
//! This crate implements:
//! - Unsigned big-integer encoding helpers used on the wire and in hashes
//! - The fixed prime-order group both pairing ends agree on
//! - Schnorr zero-knowledge proofs over that group
//! - The three J-PAKE rounds operating on a per-party context
//! - HKDF-based derivation of the encryption/HMAC key bundle
//! - Sealing and opening of payloads under a derived key bundle

#![forbid(unsafe_code)]

pub mod bigint;
pub mod params;
pub mod zkp;
pub mod round;
pub mod kdf;
pub mod payload;

pub mod hash;

mod error;

pub use error::JPakeError;
pub use kdf::KeyBundle;
pub use params::DomainParams;
pub use round::JPakeParty;
pub use zkp::Zkp;

#[cfg(test)]
mod proptests;
