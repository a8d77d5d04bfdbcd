//! Owned lifecycle for the command/acknowledgment layer.
//!
//! Wires the connection, the pending table, the ack router and the
//! disconnect watcher into one explicitly constructed service with
//! `start`/`shutdown`, replacing the module-level singleton the transport
//! layer could otherwise degenerate into.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{MqttConfig, Qos};
use crate::connection::{ConnectionState, MqttConnection};
use crate::dispatcher::CommandDispatcher;
use crate::error::DispatchError;
use crate::pending::PendingTable;
use crate::router::AckRouter;

const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// The running command/acknowledgment service.
pub struct MqttService {
    connection: Arc<MqttConnection>,
    dispatcher: CommandDispatcher,
    pending: PendingTable,
    router_task: JoinHandle<()>,
    watcher_task: JoinHandle<()>,
}

impl MqttService {
    /// Connect and start the background tasks.
    pub async fn start(config: MqttConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let connection = Arc::new(MqttConnection::open(&config, inbound_tx));
        connection
            .subscribe(config.ack_topic_filter.clone(), Qos::AtLeastOnce)
            .await;

        let pending = PendingTable::new();
        let router = AckRouter::new(pending.clone(), config.ack_topic_filter.clone());
        let router_task = tokio::spawn(router.run(inbound_rx));

        // The moment the transport drops, every in-flight request fails with
        // ConnectionLost instead of waiting out its timeout.
        let watcher_task = tokio::spawn(Self::watch_disconnects(
            connection.state_watch(),
            pending.clone(),
        ));

        let dispatcher = CommandDispatcher::new(
            connection.clone(),
            pending.clone(),
            config.command_topic.clone(),
            Duration::from_secs(config.default_timeout_secs),
        );

        Self {
            connection,
            dispatcher,
            pending,
            router_task,
            watcher_task,
        }
    }

    async fn watch_disconnects(
        mut state_rx: tokio::sync::watch::Receiver<ConnectionState>,
        pending: PendingTable,
    ) {
        let mut was_connected = *state_rx.borrow() == ConnectionState::Connected;
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow();
            match state {
                ConnectionState::Connected => was_connected = true,
                ConnectionState::Reconnecting | ConnectionState::Offline => {
                    if was_connected {
                        pending.cancel_all(DispatchError::ConnectionLost);
                    }
                    was_connected = false;
                }
                ConnectionState::Connecting => {}
            }
        }
    }

    /// Handle for dispatching commands. Cheap to clone and hand out.
    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    /// Current transport state.
    pub fn state(&self) -> ConnectionState {
        use crate::connection::Transport;
        self.connection.state()
    }

    /// Wait for the initial handshake, up to `timeout`.
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        self.connection.wait_until_connected(timeout).await
    }

    /// Stop the event loop and fail every outstanding request.
    pub async fn shutdown(self) {
        tracing::info!("shutting down mqtt service");
        self.connection.shutdown().await;
        self.pending.cancel_all(DispatchError::ConnectionLost);
        self.router_task.abort();
        self.watcher_task.abort();
    }
}
