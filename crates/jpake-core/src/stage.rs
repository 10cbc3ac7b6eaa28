//! Pairing stages and the fixed pipelines for each role.

use std::collections::VecDeque;
use std::fmt;

/// Which retry budget network stages draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryPhase {
    /// Waiting for the peer to show up.
    First,
    /// Mid-exchange, the peer is expected to answer promptly.
    Middle,
    /// Waiting for the user on the sending end to finish.
    Last,
}

/// One step of a pairing exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Allocate a rendezvous channel and display the PIN (receiver only).
    GetChannel,
    ComputeRound1,
    ComputeRound2,
    ComputeFinal,
    /// Seal the confirmation value under the derived keys (receiver only).
    ComputeKeyConfirmation,
    /// Check the peer's key confirmation and mark the session paired (sender only).
    VerifyPairing,
    /// Write the pending outgoing message to the channel.
    Put,
    /// Poll the channel for the peer's message of `round`.
    Get { round: u8 },
    SignalPairingStart,
    SetRetryPhase(RetryPhase),
    EncryptCredentials,
    DecryptData,
    Complete,
}

impl Stage {
    /// Stages that talk to the rendezvous server.
    pub fn is_network(&self) -> bool {
        matches!(self, Stage::GetChannel | Stage::Put | Stage::Get { .. })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Get { round } => write!(f, "Get({round})"),
            Stage::SetRetryPhase(phase) => write!(f, "SetRetryPhase({phase:?})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Stages the sender runs from PIN entry until the pairing is verified.
pub fn sender_pipeline() -> VecDeque<Stage> {
    VecDeque::from([
        Stage::ComputeRound1,
        Stage::Get { round: 1 },
        Stage::SetRetryPhase(RetryPhase::Middle),
        Stage::Put,
        Stage::ComputeRound2,
        Stage::Get { round: 2 },
        Stage::Put,
        Stage::ComputeFinal,
        Stage::Get { round: 3 },
        Stage::VerifyPairing,
    ])
}

/// Stages the sender runs once paired to deliver its credentials.
pub fn credentials_pipeline() -> VecDeque<Stage> {
    VecDeque::from([Stage::EncryptCredentials, Stage::Put, Stage::Complete])
}

/// Stages the receiver runs from channel allocation to completion.
pub fn receiver_pipeline() -> VecDeque<Stage> {
    VecDeque::from([
        Stage::GetChannel,
        Stage::ComputeRound1,
        Stage::Put,
        Stage::Get { round: 1 },
        Stage::SignalPairingStart,
        Stage::SetRetryPhase(RetryPhase::Middle),
        Stage::ComputeRound2,
        Stage::Put,
        Stage::Get { round: 2 },
        Stage::ComputeFinal,
        Stage::ComputeKeyConfirmation,
        Stage::Put,
        Stage::SetRetryPhase(RetryPhase::Last),
        Stage::Get { round: 3 },
        Stage::DecryptData,
        Stage::Complete,
    ])
}
