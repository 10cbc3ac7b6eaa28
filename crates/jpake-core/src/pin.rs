//! Human-readable pairing PIN: an 8-character secret followed by the
//! 4-character rendezvous channel id.

use std::fmt;

use rand_core::{CryptoRng, RngCore};

use crate::errors::PairingError;

pub const SECRET_LEN: usize = 8;
pub const CHANNEL_LEN: usize = 4;
pub const PIN_LEN: usize = SECRET_LEN + CHANNEL_LEN;

/// Secret alphabet without look-alike characters (0/o, 1/l).
pub const SECRET_ALPHABET: &[u8; 32] = b"23456789abcdefghijkmnpqrstuvwxyz";

/// A channel id a PIN can carry: [`CHANNEL_LEN`] lowercase letters or digits.
///
/// Parsing folds case, so an id with uppercase letters would come back
/// from the other device as a different channel.
pub fn is_channel_id(id: &str) -> bool {
    id.len() == CHANNEL_LEN && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[derive(Clone, PartialEq, Eq)]
pub struct Pin {
    secret: String,
    channel: String,
}

impl Pin {
    pub fn new(secret: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            channel: channel.into(),
        }
    }

    /// Parse a typed or scanned PIN. Whitespace and `-` are ignored, case is folded.
    pub fn parse(input: &str) -> Result<Self, PairingError> {
        let pin: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if !pin.is_ascii() {
            return Err(PairingError::InvalidPin("non-ascii characters".into()));
        }
        if pin.len() != PIN_LEN {
            return Err(PairingError::InvalidPin(format!(
                "expected {PIN_LEN} characters, got {}",
                pin.chars().count()
            )));
        }
        let (secret, channel) = pin.split_at(SECRET_LEN);
        if !secret.bytes().all(|b| SECRET_ALPHABET.contains(&b)) {
            return Err(PairingError::InvalidPin("secret has invalid characters".into()));
        }
        if !is_channel_id(channel) {
            return Err(PairingError::InvalidPin("channel has invalid characters".into()));
        }
        Ok(Self::new(secret, channel))
    }

    /// Draw a uniformly random secret from [`SECRET_ALPHABET`].
    pub fn generate_secret<R: RngCore + CryptoRng>(rng: &mut R) -> String {
        let mut bytes = [0u8; SECRET_LEN];
        rng.fill_bytes(&mut bytes);
        // 256 is a multiple of 32, so the reduction is unbiased.
        bytes
            .iter()
            .map(|b| SECRET_ALPHABET[(*b as usize) % SECRET_ALPHABET.len()] as char)
            .collect()
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// PIN split in groups of four for display, e.g. `abcd-efgh-k7q2`.
    pub fn grouped(&self) -> String {
        let pin = self.to_string();
        pin.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.secret, self.channel)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("secret", &"<redacted>")
            .field("channel", &self.channel)
            .finish()
    }
}
