//! Test harness for pairing flows.
//!
//! In-memory rendezvous server, a controller that records every callback,
//! and a helper that runs a sender and a receiver against each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::{
    config::PairingConfig,
    errors::AbortReason,
    pin::Pin,
    session::{PairingController, PairingOutcome, PairingSession},
    transport::{
        RendezvousResponse, RendezvousTransport, TransportError, STATUS_NOT_FOUND,
        STATUS_NOT_MODIFIED, STATUS_OK,
    },
};
use jpake_crypto::DomainParams;

// ============================================================================
// In-memory rendezvous
// ============================================================================

#[derive(Default)]
struct Slot {
    body: Option<Value>,
    etag: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    channels: HashMap<String, Slot>,
    next_channel: u32,
    next_etag: u64,
}

/// Rendezvous server kept in memory. One slot per channel; every PUT
/// replaces the slot and gets a fresh ETag.
#[derive(Default)]
pub struct MemoryRendezvous {
    state: Mutex<MemoryState>,
    requests: AtomicUsize,
}

impl MemoryRendezvous {
    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.state().channels.contains_key(channel)
    }

    pub fn channel_count(&self) -> usize {
        self.state().channels.len()
    }

    /// Requests served so far, channel allocation included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RendezvousTransport for MemoryRendezvous {
    async fn new_channel(&self, _client_id: &str) -> Result<String, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.next_channel += 1;
        let channel = format!("c{:03}", state.next_channel % 1000);
        state.channels.insert(channel.clone(), Slot::default());
        Ok(channel)
    }

    async fn get(
        &self,
        channel: &str,
        _client_id: &str,
        if_none_match: Option<&str>,
    ) -> Result<RendezvousResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        let Some(slot) = state.channels.get(channel) else {
            return Ok(RendezvousResponse::new(STATUS_NOT_FOUND));
        };
        match (&slot.body, &slot.etag) {
            (Some(body), Some(etag)) if if_none_match != Some(etag.as_str()) => {
                Ok(RendezvousResponse::new(STATUS_OK)
                    .with_etag(etag.clone())
                    .with_body(body.clone()))
            }
            _ => Ok(RendezvousResponse::new(STATUS_NOT_MODIFIED)),
        }
    }

    async fn put(
        &self,
        channel: &str,
        _client_id: &str,
        body: &Value,
    ) -> Result<RendezvousResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.next_etag += 1;
        let etag = format!("\"{}\"", state.next_etag);
        let Some(slot) = state.channels.get_mut(channel) else {
            return Ok(RendezvousResponse::new(STATUS_NOT_FOUND));
        };
        slot.body = Some(body.clone());
        slot.etag = Some(etag.clone());
        Ok(RendezvousResponse::new(STATUS_OK).with_etag(etag))
    }

    async fn delete(&self, channel: &str, _client_id: &str) -> Result<RendezvousResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.state().channels.remove(channel) {
            Some(_) => Ok(RendezvousResponse::new(STATUS_OK)),
            None => Ok(RendezvousResponse::new(STATUS_NOT_FOUND)),
        }
    }
}

/// Rendezvous whose channel allocation works but every other request fails.
#[derive(Default)]
pub struct UnreachableRendezvous {
    attempts: AtomicUsize,
}

impl UnreachableRendezvous {
    /// Failed GET and PUT attempts.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self) -> Result<RendezvousResponse, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Http("connection refused".into()))
    }
}

#[async_trait]
impl RendezvousTransport for UnreachableRendezvous {
    async fn new_channel(&self, _client_id: &str) -> Result<String, TransportError> {
        Ok("dead".into())
    }

    async fn get(
        &self,
        _channel: &str,
        _client_id: &str,
        _if_none_match: Option<&str>,
    ) -> Result<RendezvousResponse, TransportError> {
        self.fail()
    }

    async fn put(
        &self,
        _channel: &str,
        _client_id: &str,
        _body: &Value,
    ) -> Result<RendezvousResponse, TransportError> {
        self.fail()
    }

    async fn delete(&self, _channel: &str, _client_id: &str) -> Result<RendezvousResponse, TransportError> {
        self.fail()
    }
}

/// Server misbehaviour injected by [`FaultyRendezvous`].
#[derive(Debug, Clone)]
pub enum Fault {
    /// Channel allocation fails.
    NoChannel,
    /// Channel allocation hands out this id instead of a fresh one.
    ChannelId(String),
    /// Every GET answers with this status and no body.
    GetStatus(u16),
    /// Every GET answers 200 with this body.
    GetBody(Value),
}

/// [`MemoryRendezvous`] with one [`Fault`] applied. Counts DELETEs so tests
/// can tell whether an abort released the channel.
pub struct FaultyRendezvous {
    inner: MemoryRendezvous,
    fault: Fault,
    deletes: AtomicUsize,
}

impl FaultyRendezvous {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryRendezvous::default(),
            fault,
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }
}

#[async_trait]
impl RendezvousTransport for FaultyRendezvous {
    async fn new_channel(&self, client_id: &str) -> Result<String, TransportError> {
        match &self.fault {
            Fault::NoChannel => Err(TransportError::Http("503 service unavailable".into())),
            Fault::ChannelId(id) => Ok(id.clone()),
            _ => self.inner.new_channel(client_id).await,
        }
    }

    async fn get(
        &self,
        channel: &str,
        client_id: &str,
        if_none_match: Option<&str>,
    ) -> Result<RendezvousResponse, TransportError> {
        match &self.fault {
            Fault::GetStatus(status) => Ok(RendezvousResponse::new(*status)),
            Fault::GetBody(body) => Ok(RendezvousResponse::new(STATUS_OK)
                .with_etag("\"garbage\"")
                .with_body(body.clone())),
            _ => self.inner.get(channel, client_id, if_none_match).await,
        }
    }

    async fn put(
        &self,
        channel: &str,
        client_id: &str,
        body: &Value,
    ) -> Result<RendezvousResponse, TransportError> {
        self.inner.put(channel, client_id, body).await
    }

    async fn delete(&self, channel: &str, client_id: &str) -> Result<RendezvousResponse, TransportError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(channel, client_id).await
    }
}

// ============================================================================
// Recording controller
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    DisplayPin(String),
    PairingStart,
    Paired,
    Complete(Value),
    Abort(AbortReason),
}

/// Controller that records every callback in order.
#[derive(Default)]
pub struct RecordingController {
    events: Mutex<Vec<ControllerEvent>>,
    pin: Mutex<Option<Pin>>,
    pin_shown: Notify,
}

impl RecordingController {
    fn record(&self, event: ControllerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<ControllerEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn aborts(&self) -> Vec<AbortReason> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Abort(reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Complete(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Wait until `display_pin` has been called and return the PIN.
    pub async fn wait_for_pin(&self) -> Pin {
        loop {
            if let Some(pin) = self.pin.lock().unwrap_or_else(|e| e.into_inner()).clone() {
                return pin;
            }
            self.pin_shown.notified().await;
        }
    }
}

#[async_trait]
impl PairingController for RecordingController {
    async fn display_pin(&self, pin: &Pin) {
        *self.pin.lock().unwrap_or_else(|e| e.into_inner()) = Some(pin.clone());
        self.record(ControllerEvent::DisplayPin(pin.to_string()));
        self.pin_shown.notify_one();
    }

    async fn on_pairing_start(&self) {
        self.record(ControllerEvent::PairingStart);
    }

    async fn on_paired(&self) {
        self.record(ControllerEvent::Paired);
    }

    async fn on_complete(&self, credentials: Value) {
        self.record(ControllerEvent::Complete(credentials));
    }

    async fn display_abort(&self, reason: AbortReason) {
        self.record(ControllerEvent::Abort(reason));
    }
}

// ============================================================================
// Flow helper
// ============================================================================

/// Config with short polls and small retry budgets for tests.
pub fn fast_config() -> PairingConfig {
    PairingConfig {
        poll_interval_ms: 5,
        max_tries_first: 400,
        max_tries: 400,
        max_tries_last: 400,
        ..PairingConfig::default()
    }
}

/// Outcome of [`run_pairing_flow`] for both ends.
pub struct FlowResult {
    pub sender: Arc<RecordingController>,
    pub receiver: Arc<RecordingController>,
    pub sender_outcome: Option<PairingOutcome>,
    pub receiver_outcome: Option<PairingOutcome>,
}

/// Run a receiver and a sender against `transport`.
///
/// The sender types whatever `enter_pin` makes of the displayed PIN, and
/// sends `credentials` once paired.
pub async fn run_pairing_flow<T, F>(
    transport: Arc<T>,
    config: PairingConfig,
    params: Arc<DomainParams>,
    credentials: Value,
    enter_pin: F,
) -> FlowResult
where
    T: RendezvousTransport + 'static,
    F: FnOnce(&Pin) -> String,
{
    let receiver_ctl = Arc::new(RecordingController::default());
    let sender_ctl = Arc::new(RecordingController::default());

    let mut receiver = PairingSession::new(config.clone(), transport.clone(), receiver_ctl.clone())
        .with_params(params.clone());
    let receiver_task = tokio::spawn(async move {
        // Only fails when the session was already started.
        let _ = receiver.receive_no_pin().await;
        receiver.outcome()
    });

    let pin = receiver_ctl.wait_for_pin().await;
    let mut sender =
        PairingSession::new(config, transport, sender_ctl.clone()).with_params(params);
    let _ = sender.pair_with_pin(&enter_pin(&pin)).await;
    if sender.is_paired() {
        let _ = sender.send_credentials(credentials).await;
    }

    let receiver_outcome = receiver_task.await.unwrap_or(None);
    FlowResult {
        sender: sender_ctl,
        receiver: receiver_ctl,
        sender_outcome: sender.outcome(),
        receiver_outcome,
    }
}
