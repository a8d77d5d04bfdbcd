//! Shared domain types and configuration for the PawFeed backend.
//!
//! Provides:
//! - User, schedule and feed-log types shared across crates
//! - Validation limits for feed amounts and schedule times
//! - Environment-variable configuration helpers

pub mod config;
pub mod types;

pub use types::{
    amount_in_range, valid_days_of_week, valid_schedule_time, DailyFeedStats, FeedLog, FeedMode,
    FeedStatus, Schedule, User, MAX_FEED_AMOUNT, MIN_FEED_AMOUNT,
};
