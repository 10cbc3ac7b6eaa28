//! Error types for the pairing client.
//!
//! Stage functions return [`PairingError`]. The sequencer is the only place
//! these are observed: each one is logged and mapped to an [`AbortReason`],
//! which is all the controller ever sees.

use std::fmt;

use jpake_crypto::{bigint::CodecError, payload::PayloadError, JPakeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

// ============================================================================
// Abort reasons
// ============================================================================

/// Reason reported to the controller when a session aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortReason {
    /// Could not obtain or use a rendezvous channel.
    Channel,
    /// Transport failures exhausted the retry budget.
    Network,
    /// The rendezvous server answered with an unexpected status.
    Server,
    /// The peer did not answer within the retry budget.
    Timeout,
    /// Any other stage failure.
    Internal,
    /// The peer sent values that failed verification, or the PIN was malformed.
    Invalid,
    /// The channel held no data when data was expected.
    NoData,
    /// Both ends derived different keys (PIN mismatch).
    KeyMismatch,
    /// The peer sent a message of the wrong type or version.
    WrongMessage,
    /// Cancelled by the user or controller.
    UserAbort,
}

impl AbortReason {
    /// Stable reason code for controllers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AbortReason::Channel => "jpake.error.channel",
            AbortReason::Network => "jpake.error.network",
            AbortReason::Server => "jpake.error.server",
            AbortReason::Timeout => "jpake.error.timeout",
            AbortReason::Internal => "jpake.error.internal",
            AbortReason::Invalid => "jpake.error.invalid",
            AbortReason::NoData => "jpake.error.nodata",
            AbortReason::KeyMismatch => "jpake.error.keymismatch",
            AbortReason::WrongMessage => "jpake.error.wrongmessage",
            AbortReason::UserAbort => "jpake.error.userabort",
        }
    }

    /// Structural failures leave the channel to server-side expiry instead of
    /// issuing a DELETE.
    pub fn skips_channel_cleanup(&self) -> bool {
        matches!(
            self,
            AbortReason::Channel | AbortReason::Network | AbortReason::NoData
        )
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Pairing errors
// ============================================================================

/// Errors produced while running pairing stages.
#[derive(Debug, Error)]
pub enum PairingError {
    /// Proof verification or round sequencing failure
    #[error("crypto error: {0}")]
    Crypto(#[from] JPakeError),

    /// Sealed payload could not be opened
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Encrypt/decrypt attempted before the final round produced keys
    #[error("no key bundle derived yet")]
    NoKeyBundle,

    /// Peer's key confirmation did not match ours
    #[error("key confirmation mismatch")]
    KeyMismatch,

    /// Malformed integer encoding in a peer message
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport failure outside the retry loop
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Peer message of the wrong type or version
    #[error("wrong message: {0}")]
    WrongMessage(String),

    /// Message body did not match the expected shape
    #[error("malformed message: {0}")]
    Malformed(String),

    /// PIN could not be parsed
    #[error("invalid pin: {0}")]
    InvalidPin(String),

    /// Operation not allowed in the current session state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A stage decided on an explicit abort reason
    #[error("aborted: {0}")]
    Aborted(AbortReason),
}

impl From<serde_json::Error> for PairingError {
    fn from(e: serde_json::Error) -> Self {
        PairingError::Malformed(e.to_string())
    }
}

impl From<base64::DecodeError> for PairingError {
    fn from(e: base64::DecodeError) -> Self {
        PairingError::Malformed(format!("base64: {e}"))
    }
}

impl PairingError {
    /// Reason the session aborts with when this error escapes a stage.
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            PairingError::Aborted(reason) => *reason,
            PairingError::Crypto(_) | PairingError::Codec(_) | PairingError::InvalidPin(_) => {
                AbortReason::Invalid
            }
            PairingError::Payload(_) | PairingError::KeyMismatch => AbortReason::KeyMismatch,
            PairingError::WrongMessage(_) => AbortReason::WrongMessage,
            PairingError::Transport(_) => AbortReason::Network,
            PairingError::NoKeyBundle
            | PairingError::Malformed(_)
            | PairingError::InvalidState(_) => AbortReason::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_reasons_skip_cleanup() {
        assert!(AbortReason::Channel.skips_channel_cleanup());
        assert!(AbortReason::Network.skips_channel_cleanup());
        assert!(AbortReason::NoData.skips_channel_cleanup());
        assert!(!AbortReason::Timeout.skips_channel_cleanup());
        assert!(!AbortReason::UserAbort.skips_channel_cleanup());
        assert!(!AbortReason::KeyMismatch.skips_channel_cleanup());
    }

    #[test]
    fn test_error_to_reason_mapping() {
        assert_eq!(
            PairingError::from(JPakeError::IncorrectZkp).abort_reason(),
            AbortReason::Invalid
        );
        assert_eq!(
            PairingError::from(JPakeError::Gx3OrGx4IsZeroOrOne).abort_reason(),
            AbortReason::Invalid
        );
        assert_eq!(
            PairingError::from(PayloadError::HmacMismatch).abort_reason(),
            AbortReason::KeyMismatch
        );
        assert_eq!(PairingError::NoKeyBundle.abort_reason(), AbortReason::Internal);
        assert_eq!(
            PairingError::Aborted(AbortReason::Timeout).abort_reason(),
            AbortReason::Timeout
        );
    }

    #[test]
    fn test_reason_codes_serialize() {
        assert_eq!(AbortReason::NoData.to_string(), "jpake.error.nodata");
        assert_eq!(serde_json::to_string(&AbortReason::KeyMismatch).unwrap(), "\"keymismatch\"");
    }
}
