//! Wire formats for the command and acknowledgment channels.
//!
//! Both directions carry JSON. Field names are camelCase to match what the
//! feeder firmware already speaks.

use chrono::Utc;
use pawfeed_core::FeedMode;
use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationId;

/// Acknowledgment kind that resolves a pending request. Anything else on the
/// ack channels (telemetry echoes, alerts, future kinds) is ignored.
pub const ACK_FEEDING_COMPLETE: &str = "feeding_complete";

/// A feed request as built by the caller, before dispatch.
#[derive(Debug, Clone)]
pub struct FeedCommand {
    pub mode: FeedMode,
    /// Amount in grams, already validated by the caller.
    pub amount: u32,
    pub user_id: String,
    /// Present iff `mode` is `Scheduled`.
    pub schedule_id: Option<String>,
    /// Present iff `mode` is `Voice`.
    pub voice_command: Option<String>,
    /// Caller-supplied correlation id; assigned by the dispatcher when absent.
    pub correlation_id: Option<CorrelationId>,
}

impl FeedCommand {
    pub fn manual(user_id: impl Into<String>, amount: u32) -> Self {
        Self {
            mode: FeedMode::Manual,
            amount,
            user_id: user_id.into(),
            schedule_id: None,
            voice_command: None,
            correlation_id: None,
        }
    }

    pub fn scheduled(
        user_id: impl Into<String>,
        amount: u32,
        schedule_id: impl Into<String>,
    ) -> Self {
        Self {
            mode: FeedMode::Scheduled,
            amount,
            user_id: user_id.into(),
            schedule_id: Some(schedule_id.into()),
            voice_command: None,
            correlation_id: None,
        }
    }

    pub fn voice(user_id: impl Into<String>, amount: u32, text: impl Into<String>) -> Self {
        Self {
            mode: FeedMode::Voice,
            amount,
            user_id: user_id.into(),
            schedule_id: None,
            voice_command: Some(text.into()),
            correlation_id: None,
        }
    }

    /// Pin the correlation id instead of letting the dispatcher assign one.
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

/// Outbound command message as published on the feed topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    pub mode: FeedMode,
    pub amount: u32,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_command: Option<String>,
    pub correlation_id: CorrelationId,
    /// Issuance time, epoch milliseconds.
    pub issued_at: i64,
}

impl CommandMessage {
    /// Stamp a command for the wire.
    pub fn from_command(command: &FeedCommand, correlation_id: CorrelationId) -> Self {
        Self {
            mode: command.mode,
            amount: command.amount,
            user_id: command.user_id.clone(),
            schedule_id: command.schedule_id.clone(),
            voice_command: command.voice_command.clone(),
            correlation_id,
            issued_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Inbound acknowledgment published by a device on its ack topic.
///
/// Device-reported fields beyond the envelope are kept verbatim in `extra`
/// so new firmware fields never break correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckMessage {
    /// Declared message kind, e.g. `feeding_complete`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AckMessage {
    /// Whether this is the ack kind that completes a feed exchange.
    pub fn is_feed_ack(&self) -> bool {
        self.kind == ACK_FEEDING_COMPLETE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_message_wire_shape() {
        let cmd = FeedCommand::scheduled("user-1", 120, "sched-9");
        let msg = CommandMessage::from_command(&cmd, CorrelationId::from("abc-1"));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["mode"], "scheduled");
        assert_eq!(json["amount"], 120);
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["scheduleId"], "sched-9");
        assert_eq!(json["correlationId"], "abc-1");
        assert!(json.get("voiceCommand").is_none());
        assert!(json["issuedAt"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_ack_message_parses_device_fields() {
        let raw = r#"{
            "type": "feeding_complete",
            "correlationId": "abc-1",
            "deviceId": "feeder-01",
            "dispensedAmount": 118
        }"#;
        let ack: AckMessage = serde_json::from_str(raw).unwrap();
        assert!(ack.is_feed_ack());
        assert_eq!(ack.correlation_id.as_ref().unwrap().as_str(), "abc-1");
        assert_eq!(ack.extra["deviceId"], "feeder-01");
        assert_eq!(ack.extra["dispensedAmount"], 118);
    }

    #[test]
    fn test_ack_message_unknown_kind() {
        let raw = r#"{"type": "low_hopper_alert", "correlationId": "abc-1"}"#;
        let ack: AckMessage = serde_json::from_str(raw).unwrap();
        assert!(!ack.is_feed_ack());
    }

    #[test]
    fn test_ack_message_missing_correlation_id() {
        let raw = r#"{"type": "feeding_complete"}"#;
        let ack: AckMessage = serde_json::from_str(raw).unwrap();
        assert!(ack.correlation_id.is_none());
    }
}
