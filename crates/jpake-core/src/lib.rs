//! J-PAKE PIN pairing client.
//!
//! This crate implements:
//! - The pairing session and stage sequencer (sender and receiver)
//! - JSON wire messages for the three J-PAKE rounds
//! - Rendezvous transport abstraction (HTTP implementation optional)
//! - PIN parsing and generation
//! - Client configuration

#![forbid(unsafe_code)]

// Core state machine
pub mod session;
pub mod stage;

// Wire protocol
pub mod message;
pub mod transport;

// Supporting modules
pub mod config;
pub mod errors;
pub mod pin;
pub mod harness;

// Optional transport implementations
#[cfg(feature = "http-rendezvous")]
pub mod http_rendezvous;

#[cfg(test)]
mod proptests;

pub use config::PairingConfig;
pub use errors::{AbortReason, PairingError};
pub use session::{AbortHandle, PairingController, PairingOutcome, PairingSession};
