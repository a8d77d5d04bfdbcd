//! Pending-request table.
//!
//! Maps each outstanding correlation id to its completion handle and
//! deadline. An entry is removed exactly once: by the ack router on a match,
//! by its per-request timer on expiry, by the dispatcher on publish failure,
//! or by `cancel_all` at disconnect. The atomic remove on the map plus the
//! one-shot completion channel make double settlement impossible.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::correlation::CorrelationId;
use crate::error::DispatchError;
use crate::message::AckMessage;

/// Settled outcome of one exchange.
pub type AckResult = std::result::Result<AckMessage, DispatchError>;

/// Receiver half of a pending request's completion handle.
pub type AckReceiver = oneshot::Receiver<AckResult>;

struct PendingEntry {
    tx: oneshot::Sender<AckResult>,
    created_at: Instant,
    deadline: Instant,
    /// Per-request expiry task, aborted when the entry settles early.
    timer: Option<JoinHandle<()>>,
}

/// Thread-safe table of outstanding requests.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Default)]
pub struct PendingTable {
    entries: Arc<DashMap<CorrelationId, PendingEntry>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new request and arm its expiry timer.
    ///
    /// Fails with `DuplicateCorrelationId` when the id is already in flight;
    /// the existing entry is left untouched.
    pub fn register(
        &self,
        id: CorrelationId,
        timeout: Duration,
    ) -> Result<AckReceiver, DispatchError> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();

        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(DispatchError::DuplicateCorrelationId(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    tx,
                    created_at: now,
                    deadline: now + timeout,
                    timer: None,
                });
            }
        }

        // Per-request timer rather than a global sweep: expiry latency stays
        // constant no matter how many requests are outstanding.
        let table = self.clone();
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            table.expire(&timer_id, timeout);
        });

        // The request may already have settled while the timer task spawned;
        // in that case the handle has nowhere to live and the timer is moot.
        match self.entries.get_mut(&id) {
            Some(mut entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }

        Ok(rx)
    }

    /// Settle a request with its acknowledgment.
    ///
    /// Returns whether a matching entry existed. A miss is not an error:
    /// late acks after expiry and duplicate deliveries land here.
    pub fn resolve(&self, id: &CorrelationId, ack: AckMessage) -> bool {
        match self.entries.remove(id) {
            Some((_, entry)) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                tracing::debug!(
                    correlation_id = %id,
                    elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                    "acknowledgment matched pending request"
                );
                let _ = entry.tx.send(Ok(ack));
                true
            }
            None => false,
        }
    }

    /// Timer path: fail the request with `AckTimeout` if it is still pending.
    /// No-op when the ack won the race.
    pub fn expire(&self, id: &CorrelationId, timeout: Duration) {
        if let Some((_, entry)) = self.entries.remove(id) {
            tracing::warn!(correlation_id = %id, ?timeout, "no acknowledgment before deadline");
            let _ = entry.tx.send(Err(DispatchError::AckTimeout(timeout)));
        }
    }

    /// Drop a request without settling its handle. Used by the dispatcher
    /// when the publish itself failed and the caller gets the error directly.
    pub fn discard(&self, id: &CorrelationId) {
        if let Some((_, entry)) = self.entries.remove(id) {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }

    /// Fail every outstanding request. Used at disconnect and shutdown so no
    /// caller is left waiting out a timeout on a transport known to be down.
    pub fn cancel_all(&self, error: DispatchError) {
        let ids: Vec<CorrelationId> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut cancelled = 0usize;
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                let _ = entry.tx.send(Err(error.clone()));
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::warn!(count = cancelled, %error, "cancelled outstanding requests");
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deadline of an outstanding request, if still pending.
    pub fn deadline(&self, id: &CorrelationId) -> Option<Instant> {
        self.entries.get(id).map(|e| e.deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_ack(id: &str) -> AckMessage {
        serde_json::from_value(serde_json::json!({
            "type": "feeding_complete",
            "correlationId": id,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_resolve() {
        let table = PendingTable::new();
        let id = CorrelationId::from("r1");
        let rx = table.register(id.clone(), Duration::from_secs(5)).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.resolve(&id, feed_ack("r1")));
        assert!(table.is_empty());

        let ack = rx.await.unwrap().unwrap();
        assert!(ack.is_feed_ack());
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let table = PendingTable::new();
        let id = CorrelationId::from("dup");
        let _rx = table.register(id.clone(), Duration::from_secs(5)).unwrap();

        let err = table.register(id.clone(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateCorrelationId(_)));
        // The original entry survives the rejected attempt.
        assert_eq!(table.len(), 1);
        assert!(table.resolve(&id, feed_ack("dup")));
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_noop() {
        let table = PendingTable::new();
        let _rx = table
            .register(CorrelationId::from("known"), Duration::from_secs(5))
            .unwrap();

        assert!(!table.resolve(&CorrelationId::from("unknown"), feed_ack("unknown")));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_fails_with_timeout() {
        let table = PendingTable::new();
        let id = CorrelationId::from("slow");
        let rx = table.register(id, Duration::from_millis(20)).unwrap();

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(DispatchError::AckTimeout(_))));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_resolution_wins_race_against_timer() {
        let table = PendingTable::new();
        let id = CorrelationId::from("race");
        let rx = table.register(id.clone(), Duration::from_millis(30)).unwrap();

        assert!(table.resolve(&id, feed_ack("race")));
        // Give the (aborted) timer a chance to have fired if it were broken.
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = rx.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_expired_entry_cannot_resolve_again() {
        let table = PendingTable::new();
        let id = CorrelationId::from("late");
        let rx = table.register(id.clone(), Duration::from_millis(10)).unwrap();
        let _ = rx.await;

        // The late ack observes an empty table, nothing else.
        assert!(!table.resolve(&id, feed_ack("late")));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_discard_removes_without_settling() {
        let table = PendingTable::new();
        let id = CorrelationId::from("gone");
        let rx = table.register(id.clone(), Duration::from_secs(5)).unwrap();

        table.discard(&id);
        assert!(table.is_empty());
        // Sender dropped without a value.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_all_settles_everything() {
        let table = PendingTable::new();
        let rx1 = table
            .register(CorrelationId::from("a"), Duration::from_secs(5))
            .unwrap();
        let rx2 = table
            .register(CorrelationId::from("b"), Duration::from_secs(5))
            .unwrap();

        table.cancel_all(DispatchError::ConnectionLost);
        assert!(table.is_empty());

        assert!(matches!(rx1.await.unwrap(), Err(DispatchError::ConnectionLost)));
        assert!(matches!(rx2.await.unwrap(), Err(DispatchError::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_independent_entries() {
        let table = PendingTable::new();
        let id_a = CorrelationId::from("ind-a");
        let id_b = CorrelationId::from("ind-b");
        let rx_a = table.register(id_a.clone(), Duration::from_secs(5)).unwrap();
        let rx_b = table.register(id_b.clone(), Duration::from_secs(5)).unwrap();

        assert!(table.resolve(&id_a, feed_ack("ind-a")));
        assert_eq!(table.len(), 1);
        assert!(table.deadline(&id_b).is_some());

        assert!(rx_a.await.unwrap().is_ok());
        assert!(table.resolve(&id_b, feed_ack("ind-b")));
        assert!(rx_b.await.unwrap().is_ok());
    }
}
