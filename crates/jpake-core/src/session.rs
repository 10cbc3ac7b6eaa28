//! Pairing session and stage sequencer.
//!
//! A [`PairingSession`] owns one end of a PIN pairing: the J-PAKE party, the
//! rendezvous channel and a FIFO of [`Stage`]s. A single driver loop pops
//! stages in order; the first failing stage aborts the session and the
//! controller is told the reason exactly once.
//!
//! The receiver allocates a channel, shows the PIN and waits for credentials.
//! The sender types the PIN, pairs, and then calls
//! [`PairingSession::send_credentials`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jpake_crypto::{
    kdf::KeyBundle,
    payload::{self, EncryptedPayload},
    round::{final_round, round1, round2, secret_from_pin},
    DomainParams, JPakeParty,
};
use num_bigint::BigUint;
use rand_core::{OsRng, RngCore};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::{
    config::PairingConfig,
    errors::{AbortReason, PairingError},
    message::{CryptoPayload, Role, Round1Payload, Round2Payload, WireMessage},
    pin::{is_channel_id, Pin},
    stage::{credentials_pipeline, receiver_pipeline, sender_pipeline, RetryPhase, Stage},
    transport::{RendezvousTransport, STATUS_NOT_FOUND, STATUS_NOT_MODIFIED, STATUS_OK},
};

// ============================================================================
// Controller
// ============================================================================

/// Callbacks into the UI driving a pairing.
#[async_trait]
pub trait PairingController: Send + Sync {
    /// Show the PIN to the user (receiver only).
    async fn display_pin(&self, pin: &Pin);

    /// The sender's first message arrived (receiver only).
    async fn on_pairing_start(&self);

    /// Key confirmation succeeded (sender only).
    async fn on_paired(&self);

    /// The exchange finished. The receiver gets the decrypted credentials,
    /// the sender the credentials it sent.
    async fn on_complete(&self, credentials: Value);

    /// The session aborted. Called at most once per session.
    async fn display_abort(&self, reason: AbortReason);
}

// ============================================================================
// Outcome and abort handle
// ============================================================================

/// Terminal state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    Completed,
    Aborted(AbortReason),
}

#[derive(Default)]
struct AbortSignal {
    finished: AtomicBool,
    requested: Mutex<Option<AbortReason>>,
    wake: Notify,
}

impl AbortSignal {
    fn requested(&self) -> Option<AbortReason> {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cancels a running session from another task or thread.
///
/// The request is honoured before the next stage or as soon as the in-flight
/// request returns; poll sleeps are cut short.
#[derive(Clone)]
pub struct AbortHandle {
    signal: Arc<AbortSignal>,
}

impl AbortHandle {
    pub fn abort(&self, reason: AbortReason) {
        {
            let mut requested = self
                .signal
                .requested
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if requested.is_none() {
                *requested = Some(reason);
            }
        }
        self.signal.wake.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.signal.finished.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct PairingSession<T: RendezvousTransport, C: PairingController> {
    config: PairingConfig,
    transport: Arc<T>,
    controller: Arc<C>,
    params: Arc<DomainParams>,
    /// Sent as `X-KeyExchange-Id` on every request.
    client_id: String,

    role: Option<Role>,
    pin: Option<Pin>,
    secret: Option<BigUint>,
    channel: Option<String>,
    party: Option<JPakeParty>,
    key_bundle: Option<KeyBundle>,

    my_etag: Option<String>,
    outgoing: Option<WireMessage>,
    incoming: Option<WireMessage>,
    credentials: Option<Value>,

    stages: VecDeque<Stage>,
    retry_phase: RetryPhase,
    paired: bool,
    outcome: Option<PairingOutcome>,
    signal: Arc<AbortSignal>,
}

impl<T: RendezvousTransport, C: PairingController> PairingSession<T, C> {
    pub fn new(config: PairingConfig, transport: Arc<T>, controller: Arc<C>) -> Self {
        let mut id = [0u8; 32];
        OsRng.fill_bytes(&mut id);
        Self {
            config,
            transport,
            controller,
            params: DomainParams::standard(),
            client_id: hex::encode(id),
            role: None,
            pin: None,
            secret: None,
            channel: None,
            party: None,
            key_bundle: None,
            my_etag: None,
            outgoing: None,
            incoming: None,
            credentials: None,
            stages: VecDeque::new(),
            retry_phase: RetryPhase::First,
            paired: false,
            outcome: None,
            signal: Arc::new(AbortSignal::default()),
        }
    }

    /// Run the rounds over a different group. Both ends must agree.
    pub fn with_params(mut self, params: Arc<DomainParams>) -> Self {
        self.params = params;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            signal: self.signal.clone(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn is_paired(&self) -> bool {
        self.paired
    }

    pub fn is_finished(&self) -> bool {
        self.signal.finished.load(Ordering::SeqCst)
    }

    pub fn outcome(&self) -> Option<PairingOutcome> {
        self.outcome
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Pair as the sender using a PIN shown on the receiving device.
    ///
    /// Returns once the session is paired or aborted. `Err` is only returned
    /// when the session was already started.
    pub async fn pair_with_pin(&mut self, pin: &str) -> Result<(), PairingError> {
        self.start(Role::Sender)?;

        let pin = match Pin::parse(pin) {
            Ok(pin) => pin,
            Err(e) => {
                warn!(error = %e, "rejecting pin");
                self.abort(e.abort_reason()).await;
                return Ok(());
            }
        };
        self.secret = Some(secret_from_pin(pin.secret()));
        self.channel = Some(pin.channel().to_string());
        self.pin = Some(pin);

        self.stages = sender_pipeline();
        self.run().await;
        Ok(())
    }

    /// Act as the receiver: allocate a channel, show the PIN, wait for
    /// credentials. Returns once completed or aborted.
    pub async fn receive_no_pin(&mut self) -> Result<(), PairingError> {
        self.start(Role::Receiver)?;
        self.stages = receiver_pipeline();
        self.run().await;
        Ok(())
    }

    /// Encrypt and deliver `credentials` to the paired receiver.
    pub async fn send_credentials(&mut self, credentials: Value) -> Result<(), PairingError> {
        if self.role != Some(Role::Sender) || !self.paired || self.is_finished() {
            return Err(PairingError::InvalidState(
                "credentials can only be sent on a paired sender".into(),
            ));
        }
        self.credentials = Some(credentials);
        self.stages = credentials_pipeline();
        self.run().await;
        Ok(())
    }

    /// Abort the session. Later calls are ignored.
    ///
    /// Unless the reason is structural, the channel is deleted (best effort)
    /// so the peer notices.
    pub async fn abort(&mut self, reason: AbortReason) {
        if self.signal.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stages.clear();
        warn!(code = reason.code(), "pairing aborted");

        if !reason.skips_channel_cleanup() {
            self.delete_channel().await;
        }
        self.outcome = Some(PairingOutcome::Aborted(reason));
        self.controller.display_abort(reason).await;
    }

    fn start(&mut self, role: Role) -> Result<(), PairingError> {
        if self.role.is_some() || self.is_finished() {
            return Err(PairingError::InvalidState("session already started".into()));
        }
        self.role = Some(role);
        self.party = Some(JPakeParty::with_params(
            role.signer_id(),
            self.params.clone(),
        ));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Driver loop
    // ------------------------------------------------------------------------

    async fn run(&mut self) {
        loop {
            if self.is_finished() {
                return;
            }
            if let Some(reason) = self.signal.requested() {
                self.abort(reason).await;
                return;
            }
            let Some(stage) = self.stages.pop_front() else {
                return;
            };

            debug!(%stage, "running stage");
            if let Err(e) = self.run_stage(stage).await {
                warn!(%stage, error = %e, "stage failed");
                self.abort(e.abort_reason()).await;
                return;
            }
        }
    }

    async fn run_stage(&mut self, stage: Stage) -> Result<(), PairingError> {
        match stage {
            Stage::GetChannel => self.get_channel().await,
            Stage::ComputeRound1 => self.compute_round1(),
            Stage::ComputeRound2 => self.compute_round2(),
            Stage::ComputeFinal => self.compute_final(),
            Stage::ComputeKeyConfirmation => self.compute_key_confirmation(),
            Stage::VerifyPairing => self.verify_pairing().await,
            Stage::Put => self.put().await,
            Stage::Get { round } => self.get(round).await,
            Stage::SignalPairingStart => {
                info!("sender connected, pairing started");
                self.controller.on_pairing_start().await;
                Ok(())
            }
            Stage::SetRetryPhase(phase) => {
                self.retry_phase = phase;
                Ok(())
            }
            Stage::EncryptCredentials => self.encrypt_credentials(),
            Stage::DecryptData => self.decrypt_data(),
            Stage::Complete => self.complete().await,
        }
    }

    // ------------------------------------------------------------------------
    // Compute stages
    // ------------------------------------------------------------------------

    fn compute_round1(&mut self) -> Result<(), PairingError> {
        let role = self.role()?;
        let party = self.party_mut()?;
        round1(party, &mut OsRng);
        let payload = Round1Payload::from_party(party)?;
        self.outgoing = Some(WireMessage::new(role, 1, &payload)?);
        Ok(())
    }

    fn compute_round2(&mut self) -> Result<(), PairingError> {
        let role = self.role()?;
        let peer: Round1Payload = self.take_incoming()?.payload_as()?;
        let secret = self.secret()?.clone();

        let party = self.party_mut()?;
        peer.apply_to(party)?;
        round2(&secret, party, &mut OsRng)?;
        let payload = Round2Payload::from_party(party)?;
        self.outgoing = Some(WireMessage::new(role, 2, &payload)?);
        Ok(())
    }

    fn compute_final(&mut self) -> Result<(), PairingError> {
        let peer: Round2Payload = self.take_incoming()?.payload_as()?;
        let secret = self.secret()?.clone();

        let party = self.party_mut()?;
        peer.apply_to(party)?;
        let bundle = final_round(&secret, party)?;
        self.key_bundle = Some(bundle);
        Ok(())
    }

    fn compute_key_confirmation(&mut self) -> Result<(), PairingError> {
        let role = self.role()?;
        let sealed = payload::key_confirmation(self.bundle()?, &mut OsRng)?;
        self.outgoing = Some(WireMessage::new(role, 3, &CryptoPayload::from(&sealed))?);
        Ok(())
    }

    async fn verify_pairing(&mut self) -> Result<(), PairingError> {
        let confirmation = self.take_encrypted()?;
        if !payload::verify_key_confirmation(self.bundle()?, &confirmation) {
            return Err(PairingError::KeyMismatch);
        }
        self.paired = true;
        info!("key confirmation verified, paired");
        self.controller.on_paired().await;
        Ok(())
    }

    fn encrypt_credentials(&mut self) -> Result<(), PairingError> {
        let role = self.role()?;
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| PairingError::InvalidState("no credentials to send".into()))?;
        let plaintext = serde_json::to_vec(credentials)?;
        let sealed = payload::seal(self.bundle()?, &plaintext, &mut OsRng)?;
        self.outgoing = Some(WireMessage::new(role, 3, &CryptoPayload::from(&sealed))?);
        Ok(())
    }

    fn decrypt_data(&mut self) -> Result<(), PairingError> {
        let sealed = self.take_encrypted()?;
        let plaintext = payload::open(self.bundle()?, &sealed)?;
        self.credentials = Some(serde_json::from_slice(&plaintext)?);
        Ok(())
    }

    async fn complete(&mut self) -> Result<(), PairingError> {
        if self.signal.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.stages.clear();
        if self.role == Some(Role::Receiver) {
            self.delete_channel().await;
        }
        self.outcome = Some(PairingOutcome::Completed);
        info!("pairing complete");
        let credentials = self.credentials.clone().unwrap_or(Value::Null);
        self.controller.on_complete(credentials).await;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Network stages
    // ------------------------------------------------------------------------

    async fn get_channel(&mut self) -> Result<(), PairingError> {
        let channel = match self.transport.new_channel(&self.client_id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "could not allocate channel");
                return Err(PairingError::Aborted(AbortReason::Channel));
            }
        };
        self.check_requested()?;

        if !is_channel_id(&channel) {
            warn!(channel = %channel, "server returned an unusable channel id");
            return Err(PairingError::Aborted(AbortReason::Channel));
        }
        debug!(channel = %channel, "channel allocated");

        let pin = Pin::new(Pin::generate_secret(&mut OsRng), channel.clone());
        self.secret = Some(secret_from_pin(pin.secret()));
        self.channel = Some(channel);
        self.controller.display_pin(&pin).await;
        self.pin = Some(pin);
        Ok(())
    }

    async fn put(&mut self) -> Result<(), PairingError> {
        let message = self
            .outgoing
            .take()
            .ok_or_else(|| PairingError::InvalidState("no outgoing message".into()))?;
        let body = message.to_value()?;
        let channel = self.require_channel()?;
        let max_tries = self.config.max_tries_for(self.retry_phase);

        for attempt in 1..=max_tries {
            let result = self.transport.put(&channel, &self.client_id, &body).await;
            self.check_requested()?;
            match result {
                Ok(resp) if resp.is_success() => {
                    trace!(kind = %message.kind, attempt, "message stored");
                    self.my_etag = resp.etag;
                    return Ok(());
                }
                Ok(resp) => {
                    warn!(status = resp.status, "unexpected status on put");
                    return Err(PairingError::Aborted(AbortReason::Server));
                }
                Err(e) => trace!(attempt, error = %e, "put failed"),
            }
            if attempt < max_tries {
                self.pause().await?;
            }
        }
        Err(PairingError::Aborted(AbortReason::Network))
    }

    async fn get(&mut self, round: u8) -> Result<(), PairingError> {
        let peer = self.role()?.peer();
        let channel = self.require_channel()?;
        let max_tries = self.config.max_tries_for(self.retry_phase);
        let mut transport_failed = false;

        for attempt in 1..=max_tries {
            let result = self
                .transport
                .get(&channel, &self.client_id, self.my_etag.as_deref())
                .await;
            self.check_requested()?;
            match result {
                Ok(resp) => {
                    transport_failed = false;
                    match (resp.status, resp.body) {
                        (STATUS_OK, Some(body)) => {
                            self.incoming = Some(WireMessage::decode(body, peer, round)?);
                            return Ok(());
                        }
                        (STATUS_OK, None) | (STATUS_NOT_MODIFIED, _) => {
                            trace!(round, attempt, "peer has not answered yet");
                        }
                        (STATUS_NOT_FOUND, _) => {
                            return Err(PairingError::Aborted(AbortReason::NoData));
                        }
                        (status, _) => {
                            warn!(status, "unexpected status on get");
                            return Err(PairingError::Aborted(AbortReason::Server));
                        }
                    }
                }
                Err(e) => {
                    transport_failed = true;
                    trace!(attempt, error = %e, "get failed");
                }
            }
            if attempt < max_tries {
                self.pause().await?;
            }
        }

        let reason = if transport_failed {
            AbortReason::Network
        } else {
            AbortReason::Timeout
        };
        Err(PairingError::Aborted(reason))
    }

    async fn delete_channel(&self) {
        let Some(channel) = &self.channel else {
            return;
        };
        match self.transport.delete(channel, &self.client_id).await {
            Ok(resp) => debug!(status = resp.status, "channel deleted"),
            Err(e) => debug!(error = %e, "channel delete failed"),
        }
    }

    /// Sleep one poll interval, waking early on an abort request.
    async fn pause(&self) -> Result<(), PairingError> {
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_interval()) => {}
            _ = self.signal.wake.notified() => {}
        }
        self.check_requested()
    }

    fn check_requested(&self) -> Result<(), PairingError> {
        match self.signal.requested() {
            Some(reason) => Err(PairingError::Aborted(reason)),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors for stage state
    // ------------------------------------------------------------------------

    fn role(&self) -> Result<Role, PairingError> {
        self.role
            .ok_or_else(|| PairingError::InvalidState("session not started".into()))
    }

    fn party_mut(&mut self) -> Result<&mut JPakeParty, PairingError> {
        self.party
            .as_mut()
            .ok_or_else(|| PairingError::InvalidState("no party".into()))
    }

    fn secret(&self) -> Result<&BigUint, PairingError> {
        self.secret
            .as_ref()
            .ok_or_else(|| PairingError::InvalidState("no secret".into()))
    }

    fn bundle(&self) -> Result<&KeyBundle, PairingError> {
        self.key_bundle.as_ref().ok_or(PairingError::NoKeyBundle)
    }

    fn require_channel(&self) -> Result<String, PairingError> {
        self.channel
            .clone()
            .ok_or_else(|| PairingError::InvalidState("no channel".into()))
    }

    fn take_incoming(&mut self) -> Result<WireMessage, PairingError> {
        self.incoming
            .take()
            .ok_or_else(|| PairingError::InvalidState("no incoming message".into()))
    }

    fn take_encrypted(&mut self) -> Result<EncryptedPayload, PairingError> {
        let wire: CryptoPayload = self.take_incoming()?.payload_as()?;
        EncryptedPayload::try_from(&wire)
    }
}
