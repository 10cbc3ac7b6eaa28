
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use num_bigint::BigUint;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::bigint::{from_hex, from_unsigned_bytes, to_even_length_hex, to_unsigned_bytes};
    use crate::params::DomainParams;
    use crate::round::{final_round, round1, round2, secret_from_pin, JPakeParty};
    use crate::zkp::{create_proof, verify_proof};

    // 62-bit safe-prime group: p = 2q + 1, g = 4 generates the order-q subgroup.
    fn small_group() -> Arc<DomainParams> {
        Arc::new(
            DomainParams::new(
                BigUint::from(0x3fff_ffff_ffff_d6bbu64),
                BigUint::from(0x1fff_ffff_ffff_eb5du64),
                BigUint::from(4u32),
            )
            .unwrap(),
        )
    }

    proptest! {
        #[test]
        fn test_unsigned_bytes_round_trip(bytes in any::<Vec<u8>>()) {
            let value = from_unsigned_bytes(&bytes);
            prop_assert_eq!(from_unsigned_bytes(&to_unsigned_bytes(&value)), value);
        }

        #[test]
        fn test_high_byte_values_round_trip(
            high in 0x80u8..=0xff,
            tail in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let mut bytes = vec![high];
            bytes.extend_from_slice(&tail);
            let value = from_unsigned_bytes(&bytes);
            prop_assert_eq!(to_unsigned_bytes(&value), bytes);
        }

        #[test]
        fn test_even_length_hex(bytes in any::<Vec<u8>>()) {
            let value = from_unsigned_bytes(&bytes);
            let hex = to_even_length_hex(&value);
            prop_assert_eq!(hex.len() % 2, 0);
            prop_assert_eq!(from_hex(&hex).unwrap(), value);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Completeness holds for every nonce the prover might draw.
        #[test]
        fn test_proof_completeness(exponent in 1u64.., seed in any::<u64>()) {
            let params = small_group();
            let x = BigUint::from(exponent) % params.q();
            let gx = params.g().modpow(&x, params.p());
            prop_assume!(params.is_subgroup_element(&gx));

            let mut rng = StdRng::seed_from_u64(seed);
            let zkp = create_proof(&params, params.g(), &x, &gx, "sender", &mut rng);
            prop_assert!(verify_proof(&params, params.g(), &gx, &zkp).is_ok());
        }

        #[test]
        fn test_proof_soundness(exponent in 1u64.., delta in 1u64.., seed in any::<u64>()) {
            let params = small_group();
            let x = BigUint::from(exponent) % params.q();
            let wrong = (&x + BigUint::from(delta)) % params.q();
            prop_assume!(wrong != x);
            let gx = params.g().modpow(&x, params.p());
            prop_assume!(params.is_subgroup_element(&gx));

            let mut rng = StdRng::seed_from_u64(seed);
            let zkp = create_proof(&params, params.g(), &wrong, &gx, "sender", &mut rng);
            prop_assert!(verify_proof(&params, params.g(), &gx, &zkp).is_err());
        }

        #[test]
        fn test_exchange_agrees_iff_secrets_match(
            pin_a in "[a-z2-9]{8}",
            pin_b in "[a-z2-9]{8}",
            seed in any::<u64>()
        ) {
            let params = small_group();
            let mut rng = StdRng::seed_from_u64(seed);
            let sa = secret_from_pin(&pin_a);
            let sb = secret_from_pin(&pin_b);

            let mut sender = JPakeParty::with_params("sender", params.clone());
            let mut receiver = JPakeParty::with_params("receiver", params.clone());
            round1(&mut sender, &mut rng);
            round1(&mut receiver, &mut rng);
            // A zero exponent makes g^x = 1, which the peer rightly refuses.
            prop_assume!(params.is_subgroup_element(sender.gx1.as_ref().unwrap()));
            prop_assume!(params.is_subgroup_element(receiver.gx1.as_ref().unwrap()));

            sender.gx3 = receiver.gx1.clone();
            sender.gx4 = receiver.gx2.clone();
            sender.zkp3 = receiver.zkp1.clone();
            sender.zkp4 = receiver.zkp2.clone();
            receiver.gx3 = sender.gx1.clone();
            receiver.gx4 = sender.gx2.clone();
            receiver.zkp3 = sender.zkp1.clone();
            receiver.zkp4 = sender.zkp2.clone();

            round2(&sa, &mut sender, &mut rng).unwrap();
            round2(&sb, &mut receiver, &mut rng).unwrap();
            prop_assume!(params.is_subgroup_element(sender.this_a.as_ref().unwrap()));
            prop_assume!(params.is_subgroup_element(receiver.this_a.as_ref().unwrap()));

            sender.other_a = receiver.this_a.clone();
            sender.other_zkp_a = receiver.this_zkp_a.clone();
            receiver.other_a = sender.this_a.clone();
            receiver.other_zkp_a = sender.this_zkp_a.clone();

            let ka = final_round(&sa, &sender).unwrap();
            let kb = final_round(&sb, &receiver).unwrap();
            // Distinct 8-char PINs differ mod q only with negligible probability.
            prop_assert_eq!(ka == kb, (&sa % params.q()) == (&sb % params.q()));
        }
    }
}
