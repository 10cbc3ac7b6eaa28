//! Rendezvous transport abstraction.
//!
//! Both pairing ends exchange messages through a single short-lived slot on a
//! rendezvous server. Each PUT replaces the slot and returns an ETag; a GET
//! with `If-None-Match` set to our own ETag answers `304` until the peer has
//! written something newer.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_MODIFIED: u16 = 304;
pub const STATUS_NOT_FOUND: u16 = 404;

/// Errors from a single transport attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("bad response: {0}")]
    BadResponse(String),
}

/// Status, ETag and optional JSON body of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RendezvousResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub body: Option<Value>,
}

impl RendezvousResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            etag: None,
            body: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Rendezvous server operations used by the stage sequencer.
///
/// `client_id` identifies this pairing end to the server for bookkeeping.
#[async_trait]
pub trait RendezvousTransport: Send + Sync {
    /// Allocate a fresh channel and return its id.
    async fn new_channel(&self, client_id: &str) -> Result<String, TransportError>;

    /// Read the channel slot.
    async fn get(
        &self,
        channel: &str,
        client_id: &str,
        if_none_match: Option<&str>,
    ) -> Result<RendezvousResponse, TransportError>;

    /// Replace the channel slot with `body`.
    async fn put(
        &self,
        channel: &str,
        client_id: &str,
        body: &Value,
    ) -> Result<RendezvousResponse, TransportError>;

    /// Drop the channel.
    async fn delete(&self, channel: &str, client_id: &str) -> Result<RendezvousResponse, TransportError>;
}
