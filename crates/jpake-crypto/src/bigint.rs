//! Unsigned big-integer codec.
//!
//! Group elements and exponents travel as unsigned big-endian bytes (inside
//! proof hashes) and as even-length hex strings (inside wire messages).

use num_bigint::BigUint;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty hex string")]
    Empty,
    #[error("invalid hex string")]
    InvalidHex,
}

/// Minimal big-endian encoding with no sign byte. Zero encodes as `[0]`.
pub fn to_unsigned_bytes(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    // BigUint never emits a sign byte, but a redundant leading zero is
    // stripped for parity with signed encoders.
    match bytes.split_first() {
        Some((0, rest)) if !rest.is_empty() => rest.to_vec(),
        _ => bytes,
    }
}

/// Interpret bytes as a non-negative integer regardless of the high bit.
pub fn from_unsigned_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Lowercase hex, left-padded with a single `0` when the digit count is odd.
pub fn to_even_length_hex(value: &BigUint) -> String {
    let hex = value.to_str_radix(16);
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex
    }
}

/// Parse a hex string of either case back into an integer.
pub fn from_hex(s: &str) -> Result<BigUint, CodecError> {
    if s.is_empty() {
        return Err(CodecError::Empty);
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidHex);
    }
    BigUint::parse_bytes(s.as_bytes(), 16).ok_or(CodecError::InvalidHex)
}
