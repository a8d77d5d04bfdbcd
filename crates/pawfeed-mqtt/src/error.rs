//! Error types for the command/acknowledgment layer.

use std::time::Duration;

use crate::correlation::CorrelationId;

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Why a dispatched command failed.
///
/// Every dispatch settles with exactly one of: the acknowledgment, or one of
/// these errors. The variants are `Clone` because a connection loss fails
/// every outstanding request with the same error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The broker transport is down; nothing was registered or published.
    #[error("broker transport is not connected")]
    NotConnected,

    /// The correlation id is already tracked by an in-flight request.
    #[error("correlation id already in flight: {0}")]
    DuplicateCorrelationId(CorrelationId),

    /// The broker rejected the publish or the transport errored during send.
    /// The pending entry has been cleaned up; retry with a new correlation id.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// No matching acknowledgment arrived within the deadline. The device may
    /// be offline, slow, or the ack was lost; whether the feed actually ran
    /// is unknown under at-least-once delivery.
    #[error("no acknowledgment within {0:?}")]
    AckTimeout(Duration),

    /// The transport dropped while the request was in flight.
    #[error("connection lost while awaiting acknowledgment")]
    ConnectionLost,
}

/// Transport-level publish failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(String),
}

impl From<TransportError> for DispatchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotConnected => DispatchError::NotConnected,
            TransportError::Send(msg) => DispatchError::PublishFailed(msg),
        }
    }
}
