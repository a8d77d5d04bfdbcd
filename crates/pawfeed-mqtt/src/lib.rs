//! Command/acknowledgment correlation over MQTT.
//!
//! The feeder protocol is fire-and-forget: commands go out on one well-known
//! topic, devices answer on their own ack topics, and the broker offers no
//! request/response pairing. This crate supplies it:
//!
//! - [`connection`] — the single persistent broker connection, with
//!   automatic reconnect and resubscription
//! - [`pending`] — the table of outstanding requests, settled exactly once
//! - [`dispatcher`] — publish a command, suspend until ack/timeout/failure
//! - [`router`] — match inbound acks back to their requests
//! - [`service`] — owned start/shutdown lifecycle wiring it all together
//!
//! A command whose acknowledgment never arrives fails with
//! [`DispatchError::AckTimeout`]; under at-least-once delivery the device
//! may still execute it later. Callers must treat that ambiguity as part of
//! the contract.

pub mod config;
pub mod connection;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod pending;
pub mod router;
pub mod service;

pub use config::{MqttConfig, Qos};
pub use connection::{ConnectionState, InboundMessage, MqttConnection, Transport};
pub use correlation::CorrelationId;
pub use dispatcher::CommandDispatcher;
pub use error::{DispatchError, TransportError};
pub use message::{AckMessage, CommandMessage, FeedCommand, ACK_FEEDING_COMPLETE};
pub use pending::{AckReceiver, AckResult, PendingTable};
pub use router::AckRouter;
pub use service::MqttService;
