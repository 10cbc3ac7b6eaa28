//! The three J-PAKE rounds.
//!
//! Each round takes the local [`JPakeParty`] by exclusive reference. Peer
//! values (`gx3`, `gx4`, `zkp3`, `zkp4`, `other_a`, `other_zkp_a`) are filled in
//! by the caller from the transport between rounds.
//!
//! | round     | consumes                       | produces                  |
//! |-----------|--------------------------------|---------------------------|
//! | `round1`  | -                              | `gx1, gx2, zkp1, zkp2`    |
//! | `round2`  | `gx3, gx4, zkp3, zkp4`, secret | `this_a, this_zkp_a`      |
//! | `final`   | `other_a, other_zkp_a`, secret | [`KeyBundle`]             |

use std::{fmt, sync::Arc};

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};

use crate::{
    bigint::from_unsigned_bytes,
    error::JPakeError,
    kdf::{derive_keys, KeyBundle},
    params::DomainParams,
    zkp::{create_proof, verify_proof, Zkp},
};

/// Protocol state of one pairing end.
#[derive(Clone)]
pub struct JPakeParty {
    params: Arc<DomainParams>,
    signer_id: String,
    /// Kept from round 1 for round 2 and the final round. `x1` is never stored.
    x2: Option<BigUint>,

    pub gx1: Option<BigUint>,
    pub gx2: Option<BigUint>,
    pub zkp1: Option<Zkp>,
    pub zkp2: Option<Zkp>,

    pub gx3: Option<BigUint>,
    pub gx4: Option<BigUint>,
    pub zkp3: Option<Zkp>,
    pub zkp4: Option<Zkp>,

    pub this_a: Option<BigUint>,
    pub this_zkp_a: Option<Zkp>,
    pub other_a: Option<BigUint>,
    pub other_zkp_a: Option<Zkp>,
}

impl JPakeParty {
    /// New party on the standard group.
    pub fn new(signer_id: impl Into<String>) -> Self {
        Self::with_params(signer_id, DomainParams::standard())
    }

    pub fn with_params(signer_id: impl Into<String>, params: Arc<DomainParams>) -> Self {
        Self {
            params,
            signer_id: signer_id.into(),
            x2: None,
            gx1: None,
            gx2: None,
            zkp1: None,
            zkp2: None,
            gx3: None,
            gx4: None,
            zkp3: None,
            zkp4: None,
            this_a: None,
            this_zkp_a: None,
            other_a: None,
            other_zkp_a: None,
        }
    }

    pub fn signer_id(&self) -> &str {
        &self.signer_id
    }

    pub fn params(&self) -> &DomainParams {
        &self.params
    }
}

impl fmt::Debug for JPakeParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JPakeParty")
            .field("signer_id", &self.signer_id)
            .field("round1_done", &self.gx1.is_some())
            .field("peer_round1", &self.gx3.is_some())
            .field("round2_done", &self.this_a.is_some())
            .field("peer_round2", &self.other_a.is_some())
            .finish_non_exhaustive()
    }
}

fn require<'a, T>(value: &'a Option<T>, name: &'static str) -> Result<&'a T, JPakeError> {
    value.as_ref().ok_or(JPakeError::MissingValue(name))
}

/// Interpret the PIN secret as an unsigned integer over its UTF-8 bytes.
pub fn secret_from_pin(secret: &str) -> BigUint {
    from_unsigned_bytes(secret.as_bytes())
}

/// Round 1: draw `x1`, `x2`, publish `g^x1`, `g^x2` and their proofs.
pub fn round1<R: RngCore + CryptoRng>(party: &mut JPakeParty, rng: &mut R) {
    let params = party.params.clone();
    let (p, q, g) = (params.p(), params.q(), params.g());

    let x1 = rng.gen_biguint_below(q);
    let x2 = rng.gen_biguint_range(&BigUint::one(), q);

    let gx1 = g.modpow(&x1, p);
    let gx2 = g.modpow(&x2, p);

    party.zkp1 = Some(create_proof(&params, g, &x1, &gx1, &party.signer_id, rng));
    party.zkp2 = Some(create_proof(&params, g, &x2, &gx2, &party.signer_id, rng));
    party.gx1 = Some(gx1);
    party.gx2 = Some(gx2);
    party.x2 = Some(x2);
}

/// Round 2: check the peer's round-1 values and publish `A` with its proof.
pub fn round2<R: RngCore + CryptoRng>(
    secret: &BigUint,
    party: &mut JPakeParty,
    rng: &mut R,
) -> Result<(), JPakeError> {
    let params = party.params.clone();
    let (p, q, g) = (params.p(), params.q(), params.g());

    let gx3 = require(&party.gx3, "gx3")?;
    let gx4 = require(&party.gx4, "gx4")?;
    let zkp3 = require(&party.zkp3, "zkp3")?;
    let zkp4 = require(&party.zkp4, "zkp4")?;
    let gx1 = require(&party.gx1, "gx1")?;
    let x2 = require(&party.x2, "x2")?;

    if gx3.is_zero() || gx3.is_one() || gx4.is_zero() || gx4.is_one() {
        return Err(JPakeError::Gx3OrGx4IsZeroOrOne);
    }
    // A proof carrying our own id is one of ours reflected back.
    if zkp3.id == party.signer_id || zkp4.id == party.signer_id {
        return Err(JPakeError::IncorrectZkp);
    }
    verify_proof(&params, g, gx3, zkp3)?;
    verify_proof(&params, g, gx4, zkp4)?;

    let y1 = (gx3 * gx4 * gx1) % p;
    let y2 = (x2 * secret) % q;
    let a = y1.modpow(&y2, p);
    let zkp_a = create_proof(&params, &y1, &y2, &a, &party.signer_id, rng);

    party.this_a = Some(a);
    party.this_zkp_a = Some(zkp_a);
    Ok(())
}

/// Final round: check the peer's `A` and derive the shared key bundle.
///
/// A PIN mismatch does not fail here; both ends simply derive different
/// bundles and the mismatch surfaces when a sealed payload fails to open.
pub fn final_round(secret: &BigUint, party: &JPakeParty) -> Result<KeyBundle, JPakeError> {
    let params = &party.params;
    let (p, q) = (params.p(), params.q());

    let other_a = require(&party.other_a, "other_a")?;
    let other_zkp_a = require(&party.other_zkp_a, "other_zkp_a")?;
    let gx1 = require(&party.gx1, "gx1")?;
    let gx2 = require(&party.gx2, "gx2")?;
    let gx3 = require(&party.gx3, "gx3")?;
    let gx4 = require(&party.gx4, "gx4")?;
    let x2 = require(&party.x2, "x2")?;

    if other_zkp_a.id == party.signer_id {
        return Err(JPakeError::IncorrectZkp);
    }
    let gb = (gx1 * gx2 * gx3) % p;
    verify_proof(params, &gb, other_a, other_zkp_a)?;

    // gx4^(-(x2*s)) computed with the non-negative exponent q - (x2*s mod q).
    let x2s = (x2 * secret) % q;
    let neg = (q - x2s) % q;
    let t = gx4.modpow(&neg, p);
    let k = ((t * other_a) % p).modpow(x2, p);

    Ok(derive_keys(&k))
}
