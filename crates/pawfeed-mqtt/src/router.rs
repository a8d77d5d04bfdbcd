//! Ack router.
//!
//! Single handling point for every message arriving on the subscribed
//! acknowledgment channels. Matches acks back to pending requests by
//! correlation id; everything that does not match is logged and dropped,
//! never escalated — unmatched acks are expected under timeout races and
//! duplicate delivery.

use tokio::sync::mpsc;

use crate::connection::InboundMessage;
use crate::message::AckMessage;
use crate::pending::PendingTable;

/// Routes inbound ack-channel messages into the pending-request table.
#[derive(Clone)]
pub struct AckRouter {
    pending: PendingTable,
    ack_filter: String,
}

impl AckRouter {
    pub fn new(pending: PendingTable, ack_filter: impl Into<String>) -> Self {
        Self {
            pending,
            ack_filter: ack_filter.into(),
        }
    }

    /// Consume inbound messages until the channel closes.
    pub async fn run(self, mut inbound_rx: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = inbound_rx.recv().await {
            self.handle_message(&message);
        }
        tracing::debug!("ack router stopped");
    }

    /// Handle one inbound message. Returns whether it resolved a pending
    /// request.
    pub fn handle_message(&self, message: &InboundMessage) -> bool {
        if !topic_matches(&self.ack_filter, &message.topic) {
            tracing::debug!(topic = %message.topic, "message outside ack filter, ignoring");
            return false;
        }

        let ack: AckMessage = match serde_json::from_slice(&message.payload) {
            Ok(ack) => ack,
            Err(e) => {
                tracing::warn!(topic = %message.topic, error = %e, "discarding unparseable ack payload");
                return false;
            }
        };

        if !ack.is_feed_ack() {
            // Other message kinds share these channels; new kinds must never
            // break correlation.
            tracing::debug!(topic = %message.topic, kind = %ack.kind, "ignoring non-ack message kind");
            return false;
        }

        let Some(correlation_id) = ack.correlation_id.clone() else {
            tracing::warn!(topic = %message.topic, "ack without correlation id, discarding");
            return false;
        };

        let matched = self.pending.resolve(&correlation_id, ack);
        if !matched {
            // Expected under races: the request may have timed out, been
            // cancelled, or this is a duplicate/retained delivery.
            tracing::debug!(%correlation_id, "ack did not match any pending request");
        }
        matched
    }
}

/// MQTT topic filter match (`+` single level, `#` trailing multi level).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationId;
    use std::time::Duration;

    fn inbound(topic: &str, payload: &str) -> InboundMessage {
        InboundMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("petfeeder/+/ack", "petfeeder/feeder-01/ack"));
        assert!(topic_matches("petfeeder/#", "petfeeder/feeder-01/ack"));
        assert!(topic_matches("petfeeder/feed", "petfeeder/feed"));
        assert!(!topic_matches("petfeeder/+/ack", "petfeeder/feeder-01/telemetry"));
        assert!(!topic_matches("petfeeder/+/ack", "petfeeder/ack"));
        assert!(!topic_matches("petfeeder/feed", "petfeeder/feed/extra"));
    }

    #[tokio::test]
    async fn test_matching_ack_resolves() {
        let pending = PendingTable::new();
        let router = AckRouter::new(pending.clone(), "petfeeder/+/ack");
        let id = CorrelationId::from("m1");
        let rx = pending.register(id, Duration::from_secs(5)).unwrap();

        let handled = router.handle_message(&inbound(
            "petfeeder/feeder-01/ack",
            r#"{"type":"feeding_complete","correlationId":"m1","dispensedAmount":50}"#,
        ));

        assert!(handled);
        assert!(pending.is_empty());
        let ack = rx.await.unwrap().unwrap();
        assert_eq!(ack.extra["dispensedAmount"], 50);
    }

    #[tokio::test]
    async fn test_malformed_payload_discarded() {
        let pending = PendingTable::new();
        let router = AckRouter::new(pending.clone(), "petfeeder/+/ack");
        let _rx = pending
            .register(CorrelationId::from("m2"), Duration::from_secs(5))
            .unwrap();

        assert!(!router.handle_message(&inbound("petfeeder/feeder-01/ack", "not json")));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_ignored() {
        let pending = PendingTable::new();
        let router = AckRouter::new(pending.clone(), "petfeeder/+/ack");
        let _rx = pending
            .register(CorrelationId::from("m3"), Duration::from_secs(5))
            .unwrap();

        assert!(!router.handle_message(&inbound(
            "petfeeder/feeder-01/ack",
            r#"{"type":"hopper_low","correlationId":"m3"}"#,
        )));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_correlation_id_harmless() {
        let pending = PendingTable::new();
        let router = AckRouter::new(pending.clone(), "petfeeder/+/ack");
        let _rx = pending
            .register(CorrelationId::from("m4"), Duration::from_secs(5))
            .unwrap();

        assert!(!router.handle_message(&inbound(
            "petfeeder/feeder-01/ack",
            r#"{"type":"feeding_complete","correlationId":"someone-else"}"#,
        )));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_correlation_id_discarded() {
        let pending = PendingTable::new();
        let router = AckRouter::new(pending.clone(), "petfeeder/+/ack");

        assert!(!router.handle_message(&inbound(
            "petfeeder/feeder-01/ack",
            r#"{"type":"feeding_complete"}"#,
        )));
    }
}
