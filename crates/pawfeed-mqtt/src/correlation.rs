//! Correlation ids for matching acknowledgments to commands.
//!
//! The broker offers no request/response support, so every command carries
//! an application-level id the device echoes back in its acknowledgment.
//! Ids must stay unique across all concurrently outstanding requests: a
//! collision would clobber a pending entry.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

static DISPATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque id identifying one command/ack exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh id.
    ///
    /// Millisecond timestamp for operator legibility, a process-monotonic
    /// counter so same-millisecond dispatches stay distinct, and a random
    /// suffix so concurrent backend instances cannot collide.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let seq = DISPATCH_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
        let suffix: u16 = rand::random();
        Self(format!("{millis}-{seq:04}-{suffix:04x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| CorrelationId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_id_roundtrips_through_json() {
        let id = CorrelationId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: CorrelationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_id_from_caller_string() {
        let id = CorrelationId::from("custom-42");
        assert_eq!(id.as_str(), "custom-42");
    }
}
