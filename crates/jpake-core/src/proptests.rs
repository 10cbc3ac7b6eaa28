//! Property-based tests for PIN parsing and wire payload conversion.

#[cfg(test)]
mod tests {
    use jpake_crypto::payload::EncryptedPayload;
    use proptest::prelude::*;

    use crate::message::CryptoPayload;
    use crate::pin::{Pin, SECRET_ALPHABET, SECRET_LEN};

    fn secret_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(proptest::sample::select(SECRET_ALPHABET.to_vec()), SECRET_LEN)
            .prop_map(|bytes| String::from_utf8(bytes).unwrap())
    }

    proptest! {
        /// Any grouping or casing of a valid PIN parses back to the same PIN
        #[test]
        fn prop_pin_parse_ignores_grouping_and_case(
            secret in secret_strategy(),
            channel in "[a-z0-9]{4}",
            upper in any::<bool>(),
        ) {
            let pin = Pin::new(secret, channel);
            let typed = if upper { pin.grouped().to_uppercase() } else { pin.grouped() };
            prop_assert_eq!(Pin::parse(&typed).unwrap(), pin.clone());
            prop_assert_eq!(Pin::parse(&pin.to_string()).unwrap(), pin);
        }

        /// Encrypted payloads survive the base64/hex wire encoding
        #[test]
        fn prop_crypto_payload_wire_encoding(
            ciphertext in proptest::collection::vec(any::<u8>(), 0..256),
            iv in proptest::collection::vec(any::<u8>(), 12),
            hmac in proptest::option::of(any::<[u8; 32]>()),
        ) {
            let sealed = EncryptedPayload { ciphertext, iv, hmac };
            let wire = CryptoPayload::from(&sealed);
            let json = serde_json::to_string(&wire).unwrap();
            let back: CryptoPayload = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(EncryptedPayload::try_from(&back).unwrap(), sealed);
        }
    }
}
