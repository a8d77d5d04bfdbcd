//! Command dispatcher.
//!
//! Public entry point of the command/acknowledgment layer: assigns a
//! correlation id, tracks the request, publishes the command, and suspends
//! the caller until the matching acknowledgment, the deadline, or a failure.
//! Concurrent dispatches are independent; nothing here blocks one exchange
//! on another.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Qos;
use crate::connection::{ConnectionState, Transport};
use crate::correlation::CorrelationId;
use crate::error::DispatchError;
use crate::message::{AckMessage, CommandMessage, FeedCommand};
use crate::pending::PendingTable;

/// Dispatches feed commands and correlates their acknowledgments.
///
/// Cheap to clone; clones share the transport and the pending table.
#[derive(Clone)]
pub struct CommandDispatcher {
    transport: Arc<dyn Transport>,
    pending: PendingTable,
    command_topic: String,
    default_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        pending: PendingTable,
        command_topic: impl Into<String>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            pending,
            command_topic: command_topic.into(),
            default_timeout,
        }
    }

    /// Dispatch with the default acknowledgment timeout.
    pub async fn dispatch(&self, command: FeedCommand) -> Result<AckMessage, DispatchError> {
        self.dispatch_with_timeout(command, self.default_timeout).await
    }

    /// Dispatch a command and wait for its acknowledgment.
    ///
    /// Exactly one of three outcomes settles the call: the matched ack, an
    /// `AckTimeout` after `timeout`, or an immediate failure
    /// (`NotConnected`, `DuplicateCorrelationId`, `PublishFailed`,
    /// `ConnectionLost`).
    pub async fn dispatch_with_timeout(
        &self,
        command: FeedCommand,
        timeout: Duration,
    ) -> Result<AckMessage, DispatchError> {
        // Fail fast while the transport is down; nothing is registered, so a
        // rejected call leaves no trace.
        if self.transport.state() != ConnectionState::Connected {
            return Err(DispatchError::NotConnected);
        }

        let correlation_id = command
            .correlation_id
            .clone()
            .unwrap_or_else(CorrelationId::generate);

        // Register before publishing: the ack could in principle arrive
        // before a publish-then-register sequence finished registering.
        let rx = self.pending.register(correlation_id.clone(), timeout)?;

        let message = CommandMessage::from_command(&command, correlation_id.clone());
        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.discard(&correlation_id);
                return Err(DispatchError::PublishFailed(e.to_string()));
            }
        };

        tracing::info!(
            %correlation_id,
            mode = %command.mode,
            amount = command.amount,
            topic = %self.command_topic,
            "dispatching feed command"
        );

        if let Err(e) = self
            .transport
            .publish(&self.command_topic, payload, Qos::AtLeastOnce)
            .await
        {
            self.pending.discard(&correlation_id);
            tracing::error!(%correlation_id, error = %e, "feed command publish failed");
            return Err(e.into());
        }

        match rx.await {
            Ok(result) => result,
            // The sender vanished without settling; only a teardown racing
            // the registration can cause this.
            Err(_) => Err(DispatchError::ConnectionLost),
        }
    }

    /// Number of requests currently awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
