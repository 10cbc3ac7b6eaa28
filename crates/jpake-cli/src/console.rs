//! Terminal controller: prints the PIN, progress and results.
//!
//! The PIN and received credentials go to stdout so they can be piped;
//! progress goes to stderr.

use async_trait::async_trait;
use jpake_core::{pin::Pin, AbortReason, PairingController};
use serde_json::Value;

pub struct ConsoleController {
    /// Print received credentials on completion (receiver side).
    print_credentials: bool,
}

impl ConsoleController {
    pub fn receiver() -> Self {
        Self {
            print_credentials: true,
        }
    }

    pub fn sender() -> Self {
        Self {
            print_credentials: false,
        }
    }
}

/// Human-readable text for an abort reason.
pub fn describe_abort(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::Channel => "could not open a rendezvous channel",
        AbortReason::Network => "the rendezvous server could not be reached",
        AbortReason::Server => "the rendezvous server returned an error",
        AbortReason::Timeout => "the other device did not respond in time",
        AbortReason::Internal => "internal error",
        AbortReason::Invalid => "the other device sent invalid data, or the PIN is malformed",
        AbortReason::NoData => "no pairing is waiting on this channel",
        AbortReason::KeyMismatch => "the PIN does not match",
        AbortReason::WrongMessage => "unexpected message from the other device",
        AbortReason::UserAbort => "cancelled",
    }
}

#[async_trait]
impl PairingController for ConsoleController {
    async fn display_pin(&self, pin: &Pin) {
        eprintln!("Enter this PIN on the sending device:");
        println!("{}", pin.grouped());
    }

    async fn on_pairing_start(&self) {
        eprintln!("Sender connected, pairing...");
    }

    async fn on_paired(&self) {
        eprintln!("Paired, sending credentials...");
    }

    async fn on_complete(&self, credentials: Value) {
        if self.print_credentials {
            match serde_json::to_string_pretty(&credentials) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{credentials}"),
            }
        } else {
            eprintln!("Credentials delivered.");
        }
    }

    async fn display_abort(&self, reason: AbortReason) {
        eprintln!("Pairing failed: {} ({})", describe_abort(reason), reason.code());
    }
}
