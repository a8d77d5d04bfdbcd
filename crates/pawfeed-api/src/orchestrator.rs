//! Feed orchestrator.
//!
//! The only caller of the command dispatcher: builds the command for each
//! trigger source, dispatches it, and records a feed log whose status
//! reflects whether the device actually acknowledged. On `AckTimeout` the
//! feed is recorded as failed even though the device may still execute it
//! later; that ambiguity is inherent to at-least-once delivery.

use chrono::Utc;
use pawfeed_core::{FeedLog, FeedStatus};
use pawfeed_mqtt::{CommandDispatcher, CorrelationId, FeedCommand};
use pawfeed_storage::Storage;
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Composes command dispatch with feed-log persistence.
#[derive(Clone)]
pub struct FeedOrchestrator {
    dispatcher: CommandDispatcher,
    storage: Storage,
}

impl FeedOrchestrator {
    pub fn new(dispatcher: CommandDispatcher, storage: Storage) -> Self {
        Self {
            dispatcher,
            storage,
        }
    }

    /// User-triggered feed.
    pub async fn manual_feed(&self, user_id: &str, amount: u32) -> Result<FeedLog> {
        self.run(FeedCommand::manual(user_id, amount)).await
    }

    /// Schedule-triggered feed.
    pub async fn scheduled_feed(
        &self,
        user_id: &str,
        amount: u32,
        schedule_id: &str,
    ) -> Result<FeedLog> {
        self.run(FeedCommand::scheduled(user_id, amount, schedule_id))
            .await
    }

    /// Voice-triggered feed; `text` is the raw transcribed command.
    pub async fn voice_feed(&self, user_id: &str, amount: u32, text: &str) -> Result<FeedLog> {
        self.run(FeedCommand::voice(user_id, amount, text)).await
    }

    async fn run(&self, command: FeedCommand) -> Result<FeedLog> {
        // Assign the id here so even a failed attempt's log can be matched
        // against broker traffic later.
        let correlation_id = command
            .correlation_id
            .clone()
            .unwrap_or_else(CorrelationId::generate);
        let command = command.with_correlation_id(correlation_id.clone());

        let start_time = Utc::now();
        let outcome = self.dispatcher.dispatch(command.clone()).await;

        let status = match &outcome {
            Ok(_) => FeedStatus::Success,
            Err(_) => FeedStatus::Failed,
        };

        let log = FeedLog {
            id: Uuid::new_v4().to_string(),
            user_id: command.user_id.clone(),
            feed_type: command.mode,
            amount: command.amount,
            target_amount: command.amount,
            status,
            start_time,
            end_time: Some(Utc::now()),
            schedule_id: command.schedule_id.clone(),
            voice_command: command.voice_command.clone(),
            correlation_id: Some(correlation_id.as_str().to_string()),
            created_at: start_time,
        };
        self.storage.feed_logs().insert(&log)?;

        match outcome {
            Ok(_) => {
                tracing::info!(
                    user_id = %command.user_id,
                    mode = %command.mode,
                    amount = command.amount,
                    "feed confirmed by device"
                );
                Ok(log)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %command.user_id,
                    mode = %command.mode,
                    error = %e,
                    "feed dispatch failed"
                );
                Err(ApiError::Dispatch(e))
            }
        }
    }
}
