//! Fiat-Shamir transcript hashing for the Schnorr proofs.

use bytes::{BufMut, BytesMut};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::bigint::{from_unsigned_bytes, to_unsigned_bytes};

/// Challenge `h` for a Schnorr proof.
///
/// `len16(base) || base || len16(gr) || gr || len16(base_exp) || base_exp || signer_id`
/// where every integer is its unsigned big-endian encoding and `len16` is a
/// 2-byte big-endian length. The signer id is last and needs no prefix.
///
/// Returns `None` when an integer is too long for its length prefix.
pub fn challenge_hash(
    base: &BigUint,
    gr: &BigUint,
    base_exp: &BigUint,
    signer_id: &str,
) -> Option<BigUint> {
    let mut transcript = BytesMut::with_capacity(3 * (2 + 192) + signer_id.len());
    for value in [base, gr, base_exp] {
        let bytes = to_unsigned_bytes(value);
        transcript.put_u16(u16::try_from(bytes.len()).ok()?);
        transcript.extend_from_slice(&bytes);
    }
    transcript.extend_from_slice(signer_id.as_bytes());
    Some(from_unsigned_bytes(&Sha256::digest(&transcript)))
}
