//! End-to-end tests of the dispatch/ack cycle against a fake transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pawfeed_mqtt::{
    AckRouter, CommandDispatcher, ConnectionState, CorrelationId, DispatchError, FeedCommand,
    InboundMessage, PendingTable, Qos, Transport, TransportError,
};

/// In-memory transport capturing published frames.
struct FakeTransport {
    state: Mutex<ConnectionState>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_next_publish: AtomicBool,
}

impl FakeTransport {
    fn connected() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Connected),
            published: Mutex::new(Vec::new()),
            fail_next_publish: AtomicBool::new(false),
        })
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    fn last_correlation_id(&self) -> String {
        let published = self.published();
        let (_, payload) = published.last().expect("nothing published");
        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        value["correlationId"].as_str().unwrap().to_string()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        _qos: Qos,
    ) -> Result<(), TransportError> {
        if self.fail_next_publish.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Send("broker rejected publish".into()));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

fn harness(
    transport: Arc<FakeTransport>,
    default_timeout: Duration,
) -> (CommandDispatcher, AckRouter, PendingTable) {
    let pending = PendingTable::new();
    let dispatcher = CommandDispatcher::new(
        transport,
        pending.clone(),
        "petfeeder/feed",
        default_timeout,
    );
    let router = AckRouter::new(pending.clone(), "petfeeder/+/ack");
    (dispatcher, router, pending)
}

fn ack_for(correlation_id: &str) -> InboundMessage {
    InboundMessage {
        topic: "petfeeder/feeder-01/ack".to_string(),
        payload: format!(
            r#"{{"type":"feeding_complete","correlationId":"{correlation_id}","dispensedAmount":50}}"#
        )
        .into_bytes(),
    }
}

#[tokio::test]
async fn dispatch_resolves_with_matching_ack() {
    let transport = FakeTransport::connected();
    let (dispatcher, router, pending) = harness(transport.clone(), Duration::from_secs(5));

    let dispatch = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.dispatch(FeedCommand::manual("user-1", 50)).await }
    });

    // Wait for the command to hit the wire, then answer it.
    let deadline = Instant::now() + Duration::from_secs(1);
    while transport.published().is_empty() {
        assert!(Instant::now() < deadline, "command never published");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let published = transport.published();
    let (topic, payload) = &published[0];
    assert_eq!(topic, "petfeeder/feed");
    let body: serde_json::Value = serde_json::from_slice(payload).unwrap();
    assert_eq!(body["mode"], "manual");
    assert_eq!(body["amount"], 50);
    assert_eq!(body["userId"], "user-1");
    assert!(body["correlationId"].as_str().is_some());

    router.handle_message(&ack_for(&transport.last_correlation_id()));

    let ack = dispatch.await.unwrap().unwrap();
    assert!(ack.is_feed_ack());
    assert_eq!(ack.extra["dispensedAmount"], 50);
    assert!(pending.is_empty());
}

#[tokio::test]
async fn dispatch_times_out_and_late_ack_is_harmless() {
    let transport = FakeTransport::connected();
    let (dispatcher, router, pending) = harness(transport.clone(), Duration::from_secs(5));

    let started = Instant::now();
    let result = dispatcher
        .dispatch_with_timeout(FeedCommand::voice("user-1", 200, "feed 200 grams"), Duration::from_millis(50))
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(DispatchError::AckTimeout(_))));
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(500), "timeout fired far too late: {elapsed:?}");
    assert!(pending.is_empty());

    // A straggler ack for the expired request is dropped without effect.
    assert!(!router.handle_message(&ack_for(&transport.last_correlation_id())));
    assert!(pending.is_empty());
}

#[tokio::test]
async fn timeout_precision_independent_of_outstanding_requests() {
    let transport = FakeTransport::connected();
    let (dispatcher, _router, pending) = harness(transport.clone(), Duration::from_secs(60));

    // Pile up long-lived requests.
    let mut long_lived = Vec::new();
    for _ in 0..50 {
        let dispatcher = dispatcher.clone();
        long_lived.push(tokio::spawn(async move {
            dispatcher.dispatch(FeedCommand::manual("user-1", 10)).await
        }));
    }
    let deadline = Instant::now() + Duration::from_secs(1);
    while pending.len() < 50 {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let started = Instant::now();
    let result = dispatcher
        .dispatch_with_timeout(FeedCommand::manual("user-1", 10), Duration::from_millis(100))
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(DispatchError::AckTimeout(_))));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(600));

    for handle in long_lived {
        handle.abort();
    }
}

#[tokio::test]
async fn dispatch_while_disconnected_fails_fast_without_registering() {
    let transport = FakeTransport::connected();
    transport.set_state(ConnectionState::Reconnecting);
    let (dispatcher, _router, pending) = harness(transport.clone(), Duration::from_secs(5));

    let result = dispatcher.dispatch(FeedCommand::manual("user-1", 10)).await;

    assert!(matches!(result, Err(DispatchError::NotConnected)));
    assert_eq!(pending.len(), 0);
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn publish_failure_cleans_up_pending_entry() {
    let transport = FakeTransport::connected();
    transport.fail_next_publish.store(true, Ordering::SeqCst);
    let (dispatcher, _router, pending) = harness(transport.clone(), Duration::from_secs(5));

    let result = dispatcher.dispatch(FeedCommand::manual("user-1", 10)).await;

    match result {
        Err(DispatchError::PublishFailed(msg)) => assert!(msg.contains("broker rejected")),
        other => panic!("expected PublishFailed, got {other:?}"),
    }
    assert!(pending.is_empty());
}

#[tokio::test]
async fn concurrent_dispatches_resolve_independently() {
    let transport = FakeTransport::connected();
    let (dispatcher, router, pending) = harness(transport.clone(), Duration::from_secs(5));

    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .dispatch(FeedCommand::manual("user-1", 10).with_correlation_id(CorrelationId::from("first")))
                .await
        }
    });
    let second = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .dispatch(FeedCommand::manual("user-2", 20).with_correlation_id(CorrelationId::from("second")))
                .await
        }
    });

    let deadline = Instant::now() + Duration::from_secs(1);
    while pending.len() < 2 {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Acks arrive out of dispatch order; each matches purely by id.
    router.handle_message(&ack_for("second"));
    let second_ack = second.await.unwrap().unwrap();
    assert_eq!(
        second_ack.correlation_id.as_ref().unwrap().as_str(),
        "second"
    );

    // Resolving one left the other pending and untouched.
    assert_eq!(pending.len(), 1);

    router.handle_message(&ack_for("first"));
    let first_ack = first.await.unwrap().unwrap();
    assert_eq!(first_ack.correlation_id.as_ref().unwrap().as_str(), "first");
    assert!(pending.is_empty());
}

#[tokio::test]
async fn duplicate_caller_supplied_id_rejected() {
    let transport = FakeTransport::connected();
    let (dispatcher, router, pending) = harness(transport.clone(), Duration::from_secs(5));

    let id = CorrelationId::from("pinned");
    let in_flight = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let id = id.clone();
        async move {
            dispatcher
                .dispatch(FeedCommand::manual("user-1", 10).with_correlation_id(id))
                .await
        }
    });

    let deadline = Instant::now() + Duration::from_secs(1);
    while pending.is_empty() {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let duplicate = dispatcher
        .dispatch(FeedCommand::manual("user-1", 10).with_correlation_id(id))
        .await;
    assert!(matches!(
        duplicate,
        Err(DispatchError::DuplicateCorrelationId(_))
    ));

    // The original request is unaffected by the rejection.
    router.handle_message(&ack_for("pinned"));
    assert!(in_flight.await.unwrap().is_ok());
}

#[tokio::test]
async fn cancel_all_fails_every_pending_request() {
    let transport = FakeTransport::connected();
    let (dispatcher, _router, pending) = harness(transport.clone(), Duration::from_secs(30));

    let mut dispatches = Vec::new();
    for i in 0..5 {
        let dispatcher = dispatcher.clone();
        dispatches.push(tokio::spawn(async move {
            dispatcher
                .dispatch(FeedCommand::manual(format!("user-{i}"), 10))
                .await
        }));
    }
    let deadline = Instant::now() + Duration::from_secs(1);
    while pending.len() < 5 {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    pending.cancel_all(DispatchError::ConnectionLost);

    for handle in dispatches {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(DispatchError::ConnectionLost)));
    }
    assert!(pending.is_empty());
}
