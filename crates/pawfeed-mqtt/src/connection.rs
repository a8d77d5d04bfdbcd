//! Broker connection manager.
//!
//! Owns the single persistent MQTT connection for the process lifetime:
//! tracks connectivity state, re-issues subscriptions after every
//! reconnect, and forwards inbound publishes to the ack router. Reconnection
//! is automatic with a fixed backoff and never gives up until shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;

use crate::config::{MqttConfig, Qos};
use crate::error::TransportError;

/// Connectivity state of the broker transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial handshake in progress.
    Connecting,
    /// Handshake completed; publishes are accepted.
    Connected,
    /// Transport dropped; retrying with a fixed backoff.
    Reconnecting,
    /// Explicitly shut down.
    Offline,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Offline => "offline",
        }
    }
}

/// A raw message received on a subscribed topic.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish-side seam between the dispatcher and the broker.
///
/// The production implementation is [`MqttConnection`]; tests drive the
/// dispatcher with an in-memory fake instead of a live broker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Current connectivity state.
    fn state(&self) -> ConnectionState;

    /// Publish a message. Fails immediately with `NotConnected` when the
    /// transport is down; messages are never queued for later.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
    ) -> Result<(), TransportError>;
}

/// The real rumqttc-backed connection.
pub struct MqttConnection {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    subscriptions: Arc<RwLock<Vec<(String, Qos)>>>,
    running: Arc<AtomicBool>,
    event_task: JoinHandle<()>,
}

impl MqttConnection {
    /// Open the connection and start the event loop.
    ///
    /// Inbound publishes are forwarded to `inbound_tx`. The call returns
    /// immediately; the state watch flips to `Connected` once the broker
    /// accepts the handshake.
    pub fn open(config: &MqttConfig, inbound_tx: mpsc::Sender<InboundMessage>) -> Self {
        let client_id = config.effective_client_id();
        tracing::info!(broker = %config.redacted_addr(), %client_id, "connecting to mqtt broker");

        let mut options = MqttOptions::new(client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive));
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        if config.tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let subscriptions: Arc<RwLock<Vec<(String, Qos)>>> = Arc::new(RwLock::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let event_task = tokio::spawn(Self::event_loop(
            eventloop,
            client.clone(),
            state_tx,
            subscriptions.clone(),
            running.clone(),
            Duration::from_millis(config.reconnect_interval_ms),
            inbound_tx,
        ));

        Self {
            client,
            state_rx,
            subscriptions,
            running,
            event_task,
        }
    }

    async fn event_loop(
        mut eventloop: rumqttc::EventLoop,
        client: AsyncClient,
        state_tx: watch::Sender<ConnectionState>,
        subscriptions: Arc<RwLock<Vec<(String, Qos)>>>,
        running: Arc<AtomicBool>,
        reconnect_interval: Duration,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) {
        while running.load(Ordering::SeqCst) {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    let was = *state_tx.borrow();
                    state_tx.send_replace(ConnectionState::Connected);
                    tracing::info!(previous = was.as_str(), "mqtt connected");

                    // (Re-)issue every registered subscription. The session is
                    // clean, so the broker forgot them across reconnects.
                    let subs = subscriptions.read().await.clone();
                    for (filter, qos) in subs {
                        if let Err(e) = client.subscribe(filter.clone(), qos.into()).await {
                            tracing::error!(%filter, error = %e, "resubscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                    // The router owns backpressure; a full channel means it is
                    // wedged, and dropping is better than stalling the event
                    // loop that keeps the connection alive.
                    if let Err(e) = inbound_tx.try_send(message) {
                        tracing::warn!(error = %e, "inbound channel full, dropping message");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let was = state_tx.send_replace(ConnectionState::Reconnecting);
                    if was != ConnectionState::Reconnecting {
                        tracing::warn!(
                            error = %e,
                            retry_in_ms = reconnect_interval.as_millis() as u64,
                            "mqtt connection error, reconnecting"
                        );
                    }
                    tokio::time::sleep(reconnect_interval).await;
                }
            }
        }
        state_tx.send_replace(ConnectionState::Offline);
        tracing::info!("mqtt event loop stopped");
    }

    /// Register a subscription. It is issued now if connected and re-issued
    /// automatically after every reconnect.
    pub async fn subscribe(&self, filter: impl Into<String>, qos: Qos) {
        let filter = filter.into();
        self.subscriptions.write().await.push((filter.clone(), qos));
        if self.state() == ConnectionState::Connected {
            if let Err(e) = self.client.subscribe(filter.clone(), qos.into()).await {
                tracing::error!(%filter, error = %e, "subscribe failed, will retry on reconnect");
            }
        }
    }

    /// Watch handle for connectivity transitions.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until the broker accepts the handshake, up to `timeout`.
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.state_rx.clone();
        tokio::time::timeout(timeout, async {
            loop {
                if *rx.borrow() == ConnectionState::Connected {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await
        .is_ok()
            && self.state() == ConnectionState::Connected
    }

    /// Stop the event loop and drop the connection.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.client.disconnect().await;
        self.event_task.abort();
    }
}

#[async_trait]
impl Transport for MqttConnection {
    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
    ) -> Result<(), TransportError> {
        // rumqttc would happily queue while disconnected; the contract here
        // is fail-fast so callers never see a silent drop.
        if self.state() != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        self.client
            .publish(topic, qos.into(), false, payload)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
