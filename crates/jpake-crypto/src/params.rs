//! Domain parameters of the J-PAKE group.
//!
//! Production uses the 1536-bit MODP safe prime from RFC 3526 with
//! `Q = (P - 1) / 2` and `G = 2`, which generates the order-Q subgroup.
//! Both pairing ends must use exactly these values; they are literals here and
//! never read from configuration.

use std::sync::{Arc, OnceLock};

use num_bigint::BigUint;
use num_traits::{One, Zero};
use thiserror::Error;

const P_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
    "9ED529077096966D670C354E4ABC9804F1746C08CA237327FFFFFFFFFFFFFFFF",
);

const Q_HEX: &str = concat!(
    "7FFFFFFFFFFFFFFFE487ED5110B4611A62633145C06E0E68948127044533E63A",
    "0105DF531D89CD9128A5043CC71A026EF7CA8CD9E69D218D98158536F92F8A1B",
    "A7F09AB6B6A8E122F242DABB312F3F637A262174D31BF6B585FFAE5B7A035BF6",
    "F71C35FDAD44CFD2D74F9208BE258FF324943328F6722D9EE1003E5C50B1DF82",
    "CC6D241B0E2AE9CD348B1FD47E9267AFC1B2AE91EE51D6CB0E3179AB1042A95D",
    "CF6A9483B84B4B36B3861AA7255E4C0278BA36046511B993FFFFFFFFFFFFFFFF",
);

const G: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("modulus too small")]
    ModulusTooSmall,
    #[error("subgroup order does not divide p - 1")]
    OrderDoesNotDivide,
    #[error("generator out of range")]
    GeneratorOutOfRange,
    #[error("generator does not have order q")]
    GeneratorWrongOrder,
}

/// Modulus `p`, subgroup order `q` and generator `g` of the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParams {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    p_minus_one: BigUint,
}

static STANDARD: OnceLock<Arc<DomainParams>> = OnceLock::new();

impl DomainParams {
    /// The fixed 1536-bit group shared by every pairing peer.
    pub fn standard() -> Arc<DomainParams> {
        STANDARD
            .get_or_init(|| {
                let p = BigUint::parse_bytes(P_HEX.as_bytes(), 16)
                    .expect("P literal is valid hex");
                let q = BigUint::parse_bytes(Q_HEX.as_bytes(), 16)
                    .expect("Q literal is valid hex");
                let p_minus_one = &p - 1u32;
                Arc::new(DomainParams {
                    p,
                    q,
                    g: BigUint::from(G),
                    p_minus_one,
                })
            })
            .clone()
    }

    /// Build a custom group, e.g. a small one for fast tests.
    ///
    /// Checks the structural relations between the values; primality of `p`
    /// and `q` is the caller's responsibility.
    pub fn new(p: BigUint, q: BigUint, g: BigUint) -> Result<Self, ParamsError> {
        if p <= BigUint::from(3u32) {
            return Err(ParamsError::ModulusTooSmall);
        }
        let p_minus_one = &p - 1u32;
        if q.is_zero() || !(&p_minus_one % &q).is_zero() {
            return Err(ParamsError::OrderDoesNotDivide);
        }
        if g <= BigUint::one() || g >= p_minus_one {
            return Err(ParamsError::GeneratorOutOfRange);
        }
        if !g.modpow(&q, &p).is_one() {
            return Err(ParamsError::GeneratorWrongOrder);
        }
        Ok(Self { p, q, g, p_minus_one })
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// True when `element` lies strictly in `(1, p - 1)` and has order `q`.
    pub fn is_subgroup_element(&self, element: &BigUint) -> bool {
        if *element <= BigUint::one() || *element >= self.p_minus_one {
            return false;
        }
        element.modpow(&self.q, &self.p).is_one()
    }
}
