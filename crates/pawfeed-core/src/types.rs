//! Domain types shared across the PawFeed crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum dispensable amount in grams.
pub const MIN_FEED_AMOUNT: u32 = 5;

/// Maximum dispensable amount in grams.
pub const MAX_FEED_AMOUNT: u32 = 1000;

/// How a feed was triggered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// User pressed the feed button.
    Manual,
    /// Fired by a stored schedule.
    Scheduled,
    /// Parsed from a transcribed voice command.
    Voice,
}

impl FeedMode {
    /// Get the mode name as used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Manual => "manual",
            FeedMode::Scheduled => "scheduled",
            FeedMode::Voice => "voice",
        }
    }
}

impl std::fmt::Display for FeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a feed attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// The device acknowledged the feed.
    Success,
    /// Dispatch failed or no acknowledgment arrived in time.
    Failed,
}

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// bcrypt hash, never the plain password. Handlers must not expose this
    /// field; API responses shape their own user objects.
    pub password_hash: String,
    pub last_online: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: password_hash.into(),
            last_online: None,
            created_at: Utc::now(),
        }
    }
}

/// A recurring feeding schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// 24-hour wall-clock time, "HH:MM".
    pub time: String,
    /// Weekdays the schedule fires on, 0 = Sunday .. 6 = Saturday.
    pub days_of_week: Vec<u8>,
    /// Amount in grams.
    pub amount: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Create a new active schedule with a fresh id.
    pub fn new(
        user_id: impl Into<String>,
        name: Option<String>,
        time: impl Into<String>,
        days_of_week: Vec<u8>,
        amount: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.unwrap_or_else(|| "Feeding schedule".to_string()),
            time: time.into(),
            days_of_week,
            amount,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One recorded feed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedLog {
    pub id: String,
    pub user_id: String,
    pub feed_type: FeedMode,
    /// Grams actually requested from the device.
    pub amount: u32,
    pub target_amount: u32,
    pub status: FeedStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub schedule_id: Option<String>,
    pub voice_command: Option<String>,
    /// Correlation id of the MQTT exchange, for operator lookups.
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated feeding totals for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyFeedStats {
    /// Day in "YYYY-MM-DD" form, in the configured timezone.
    pub date: String,
    pub total_amount: u64,
    pub feed_count: u64,
}

/// Check that an amount is within the dispensable range.
pub fn amount_in_range(amount: u32) -> bool {
    (MIN_FEED_AMOUNT..=MAX_FEED_AMOUNT).contains(&amount)
}

/// Validate a "HH:MM" 24-hour time string.
pub fn valid_schedule_time(time: &str) -> bool {
    let mut parts = time.splitn(2, ':');
    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return false;
    };
    if h.len() != 2 || m.len() != 2 {
        return false;
    }
    match (h.parse::<u8>(), m.parse::<u8>()) {
        (Ok(h), Ok(m)) => h < 24 && m < 60,
        _ => false,
    }
}

/// Validate a set of weekday indices (0 = Sunday .. 6 = Saturday).
pub fn valid_days_of_week(days: &[u8]) -> bool {
    !days.is_empty() && days.iter().all(|d| *d <= 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_mode_as_str() {
        assert_eq!(FeedMode::Manual.as_str(), "manual");
        assert_eq!(FeedMode::Scheduled.as_str(), "scheduled");
        assert_eq!(FeedMode::Voice.as_str(), "voice");
    }

    #[test]
    fn test_feed_mode_serde() {
        let json = serde_json::to_string(&FeedMode::Scheduled).unwrap();
        assert_eq!(json, "\"scheduled\"");
        let mode: FeedMode = serde_json::from_str("\"voice\"").unwrap();
        assert_eq!(mode, FeedMode::Voice);
    }

    #[test]
    fn test_amount_in_range() {
        assert!(amount_in_range(MIN_FEED_AMOUNT));
        assert!(amount_in_range(MAX_FEED_AMOUNT));
        assert!(amount_in_range(50));
        assert!(!amount_in_range(4));
        assert!(!amount_in_range(1001));
        assert!(!amount_in_range(0));
    }

    #[test]
    fn test_valid_schedule_time() {
        assert!(valid_schedule_time("00:00"));
        assert!(valid_schedule_time("08:30"));
        assert!(valid_schedule_time("23:59"));
        assert!(!valid_schedule_time("24:00"));
        assert!(!valid_schedule_time("12:60"));
        assert!(!valid_schedule_time("8:30"));
        assert!(!valid_schedule_time("0830"));
        assert!(!valid_schedule_time(""));
    }

    #[test]
    fn test_valid_days_of_week() {
        assert!(valid_days_of_week(&[0, 6]));
        assert!(valid_days_of_week(&[3]));
        assert!(!valid_days_of_week(&[]));
        assert!(!valid_days_of_week(&[7]));
    }

    #[test]
    fn test_schedule_defaults() {
        let schedule = Schedule::new("user-1", None, "08:30", vec![1, 3, 5], 120);
        assert_eq!(schedule.name, "Feeding schedule");
        assert!(schedule.is_active);
        assert_eq!(schedule.amount, 120);
    }

    #[test]
    fn test_user_roundtrip() {
        let user = User::new("operator", "$2b$10$hash");
        let json = serde_json::to_vec(&user).unwrap();
        let back: User = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.id, user.id);
        assert_eq!(back.username, "operator");
        assert_eq!(back.password_hash, "$2b$10$hash");
    }
}
