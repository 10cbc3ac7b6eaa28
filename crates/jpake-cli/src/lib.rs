//! jpake - command-line PIN pairing
//!
//! This crate provides a command-line interface for:
//! - Receiving credentials: show a PIN, wait for the sender
//! - Sending credentials to a device showing a PIN

pub mod cli;
pub mod console;

pub use cli::Cli;
pub use console::ConsoleController;

use jpake_core::{AbortReason, PairingOutcome};

/// Exit codes for CLI operations
///
/// - 0: Success - credentials delivered
/// - 1: General error - unspecified error occurred
/// - 2: Authentication failed - PIN mismatch or invalid peer values
/// - 3: Timeout - the peer never answered
/// - 4: Connection failed - rendezvous server unreachable or misbehaving
/// - 5: Invalid input - bad arguments or data provided
/// - 6: Cancelled - aborted by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    AuthenticationFailed = 2,
    Timeout = 3,
    ConnectionFailed = 4,
    InvalidInput = 5,
    Cancelled = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn from_abort(reason: AbortReason) -> Self {
        match reason {
            AbortReason::KeyMismatch | AbortReason::Invalid => ExitCode::AuthenticationFailed,
            AbortReason::Timeout => ExitCode::Timeout,
            AbortReason::Channel
            | AbortReason::Network
            | AbortReason::Server
            | AbortReason::NoData => ExitCode::ConnectionFailed,
            AbortReason::UserAbort => ExitCode::Cancelled,
            AbortReason::Internal | AbortReason::WrongMessage => ExitCode::GeneralError,
        }
    }

    pub fn from_outcome(outcome: Option<PairingOutcome>) -> Self {
        match outcome {
            Some(PairingOutcome::Completed) => ExitCode::Success,
            Some(PairingOutcome::Aborted(reason)) => Self::from_abort(reason),
            None => ExitCode::GeneralError,
        }
    }
}
