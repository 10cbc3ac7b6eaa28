//! Schnorr zero-knowledge proofs of a discrete logarithm.
//!
//! A [`Zkp`] proves knowledge of `x` such that `base_exp = base^x mod p`
//! without revealing `x`. The challenge is bound to the signer id so a proof
//! made by one party cannot be replayed as the other's.

use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use rand_core::{CryptoRng, RngCore};
use tracing::trace;

use crate::{error::JPakeError, hash::challenge_hash, params::DomainParams};

/// Proof tuple `(gr, b, id)`: commitment `base^r`, response `r - x*h mod q`,
/// and the signer id hashed into `h`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zkp {
    pub gr: BigUint,
    pub b: BigUint,
    pub id: String,
}

/// Prove knowledge of `exponent` with `base_exp = base^exponent mod p`.
pub fn create_proof<R: RngCore + CryptoRng>(
    params: &DomainParams,
    base: &BigUint,
    exponent: &BigUint,
    base_exp: &BigUint,
    signer_id: &str,
    rng: &mut R,
) -> Zkp {
    let (p, q) = (params.p(), params.q());
    let base = base % p;
    let base_exp = base_exp % p;
    let r = rng.gen_biguint_below(q);
    let gr = base.modpow(&r, p);
    let h = challenge_hash(&base, &gr, &base_exp, signer_id)
        .expect("reduced group elements fit a 16-bit length prefix");

    // r - x*h can go negative; lift it into [0, q) before reducing.
    let xh = (exponent * &h) % q;
    let b = (r + q - xh) % q;

    Zkp {
        gr,
        b,
        id: signer_id.to_owned(),
    }
}

/// Verify `zkp` for `base_exp` relative to `base`.
///
/// Degenerate elements, elements outside the order-q subgroup, a commitment
/// outside `[1, p)`, a response not below `q` and a wrong response all map
/// to [`JPakeError::IncorrectZkp`].
pub fn verify_proof(
    params: &DomainParams,
    base: &BigUint,
    base_exp: &BigUint,
    zkp: &Zkp,
) -> Result<(), JPakeError> {
    let p = params.p();

    if !params.is_subgroup_element(base_exp) {
        trace!("zkp rejected: element outside subgroup");
        return Err(JPakeError::IncorrectZkp);
    }

    if base >= p || zkp.gr.is_zero() || &zkp.gr >= p || &zkp.b >= params.q() {
        trace!("zkp rejected: proof value out of range");
        return Err(JPakeError::IncorrectZkp);
    }

    let h = challenge_hash(base, &zkp.gr, base_exp, &zkp.id).ok_or(JPakeError::IncorrectZkp)?;
    let expected = (base.modpow(&zkp.b, p) * base_exp.modpow(&h, p)) % p;
    if zkp.gr != expected {
        trace!("zkp rejected: commitment mismatch");
        return Err(JPakeError::IncorrectZkp);
    }
    Ok(())
}
