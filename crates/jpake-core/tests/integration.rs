//! Integration tests for aborts, retries and the wire format.

use std::sync::Arc;
use std::time::Duration;

use jpake_core::{
    harness::{
        fast_config, ControllerEvent, Fault, FaultyRendezvous, MemoryRendezvous,
        RecordingController, UnreachableRendezvous,
    },
    transport::RendezvousTransport,
    AbortReason, PairingConfig, PairingOutcome, PairingSession,
};
use serde_json::json;

fn tight_config() -> PairingConfig {
    PairingConfig {
        poll_interval_ms: 1,
        max_tries_first: 3,
        max_tries: 3,
        max_tries_last: 3,
        ..PairingConfig::default()
    }
}

/// Test: exhausted retries report a single network abort
#[tokio::test]
async fn integration_retry_exhaustion_aborts_once() {
    let transport = Arc::new(UnreachableRendezvous::default());
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(tight_config(), transport.clone(), controller.clone());

    receiver.receive_no_pin().await.unwrap();

    assert_eq!(controller.aborts(), vec![AbortReason::Network]);
    assert!(controller.completions().is_empty());
    assert_eq!(
        receiver.outcome(),
        Some(PairingOutcome::Aborted(AbortReason::Network))
    );
    // Every PUT attempt was made, and no DELETE followed the network abort.
    assert_eq!(transport.attempts(), 3);
}

/// Test: external abort stops a waiting receiver
#[tokio::test]
async fn integration_user_abort_while_waiting() {
    let transport = Arc::new(MemoryRendezvous::default());
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(fast_config(), transport.clone(), controller.clone());
    let handle = receiver.abort_handle();

    let task = tokio::spawn(async move {
        receiver.receive_no_pin().await.unwrap();
        receiver
    });

    controller.wait_for_pin().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort(AbortReason::UserAbort);

    let receiver = task.await.unwrap();
    assert!(handle.is_finished());
    assert_eq!(
        receiver.outcome(),
        Some(PairingOutcome::Aborted(AbortReason::UserAbort))
    );
    assert_eq!(controller.aborts(), vec![AbortReason::UserAbort]);
    // User aborts clean up the channel.
    assert_eq!(transport.channel_count(), 0);

    // No stage runs after the abort.
    let requests = transport.requests();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.requests(), requests);
}

/// Test: peer sending the wrong message type aborts with wrongmessage
#[tokio::test]
async fn integration_wrong_message_type() {
    let transport = Arc::new(MemoryRendezvous::default());
    let channel = transport.new_channel("peer").await.unwrap();
    transport
        .put(&channel, "peer", &json!({"type": "sender1", "version": 3, "payload": {}}))
        .await
        .unwrap();

    let controller = Arc::new(RecordingController::default());
    let mut sender = PairingSession::new(fast_config(), transport, controller.clone());
    sender
        .pair_with_pin(&format!("abcdefgh{channel}"))
        .await
        .unwrap();

    assert_eq!(controller.aborts(), vec![AbortReason::WrongMessage]);
    assert!(!sender.is_paired());
}

/// Test: the receiver publishes a well-formed round-1 message
#[tokio::test]
async fn integration_receiver_round1_on_the_wire() {
    let transport = Arc::new(MemoryRendezvous::default());
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(fast_config(), transport.clone(), controller.clone());
    let handle = receiver.abort_handle();
    let task = tokio::spawn(async move { receiver.receive_no_pin().await });

    let pin = controller.wait_for_pin().await;
    let body = loop {
        let resp = transport.get(pin.channel(), "peer", None).await.unwrap();
        if let Some(body) = resp.body {
            break body;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    };
    handle.abort(AbortReason::UserAbort);
    task.await.unwrap().unwrap();

    assert_eq!(body["type"], "receiver1");
    assert_eq!(body["version"], 3);
    let payload = &body["payload"];
    for field in ["gx1", "gx2"] {
        let hex = payload[field].as_str().unwrap();
        assert_eq!(hex.len() % 2, 0);
    }
    assert_eq!(payload["zkp_x1"]["id"], "receiver");
    assert_eq!(payload["zkp_x2"]["id"], "receiver");
}

/// Test: a receiver nobody pairs with times out
#[tokio::test]
async fn integration_receiver_times_out_without_sender() {
    let transport = Arc::new(MemoryRendezvous::default());
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(tight_config(), transport.clone(), controller.clone());

    receiver.receive_no_pin().await.unwrap();

    let events = controller.events();
    let ControllerEvent::DisplayPin(pin) = &events[0] else {
        panic!("expected the pin first, got {events:?}");
    };
    assert_eq!(pin.len(), 12);
    assert_eq!(Some(&pin[8..]), receiver.channel());
    assert_eq!(events[1..], [ControllerEvent::Abort(AbortReason::Timeout)]);
    assert_eq!(transport.channel_count(), 0);
}

/// Test: a failed channel allocation aborts with channel and sends no DELETE
#[tokio::test]
async fn integration_channel_allocation_failure() {
    let transport = Arc::new(FaultyRendezvous::new(Fault::NoChannel));
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(fast_config(), transport.clone(), controller.clone());

    receiver.receive_no_pin().await.unwrap();

    assert_eq!(controller.events(), vec![ControllerEvent::Abort(AbortReason::Channel)]);
    assert_eq!(
        receiver.outcome(),
        Some(PairingOutcome::Aborted(AbortReason::Channel))
    );
    assert_eq!(transport.deletes(), 0);
}

/// Test: a channel id with uppercase letters is refused before a PIN is shown
#[tokio::test]
async fn integration_uppercase_channel_id_refused() {
    let transport = Arc::new(FaultyRendezvous::new(Fault::ChannelId("C001".into())));
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(fast_config(), transport.clone(), controller.clone());

    receiver.receive_no_pin().await.unwrap();

    // Showing it would hand the sender a PIN that parses to channel "c001".
    assert_eq!(controller.events(), vec![ControllerEvent::Abort(AbortReason::Channel)]);
    assert_eq!(transport.deletes(), 0);
}

/// Test: an unexpected status on GET aborts with server and releases the channel
#[tokio::test]
async fn integration_server_error_on_get() {
    let transport = Arc::new(FaultyRendezvous::new(Fault::GetStatus(503)));
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(fast_config(), transport.clone(), controller.clone());

    receiver.receive_no_pin().await.unwrap();

    assert_eq!(controller.aborts(), vec![AbortReason::Server]);
    assert!(controller.completions().is_empty());
    assert_eq!(
        receiver.outcome(),
        Some(PairingOutcome::Aborted(AbortReason::Server))
    );
    assert_eq!(transport.deletes(), 1);
    assert_eq!(transport.channel_count(), 0);
}

/// Test: a body that is not a wire message aborts with internal, not network
#[tokio::test]
async fn integration_non_message_body_on_get() {
    let body = json!("<html>bad gateway</html>");
    let transport = Arc::new(FaultyRendezvous::new(Fault::GetBody(body)));
    let controller = Arc::new(RecordingController::default());
    let mut receiver = PairingSession::new(fast_config(), transport.clone(), controller.clone());

    receiver.receive_no_pin().await.unwrap();

    assert_eq!(controller.aborts(), vec![AbortReason::Internal]);
    assert_eq!(transport.deletes(), 1);
}
