//! Environment-variable configuration.
//!
//! All deployment-specific settings are supplied through the environment at
//! process startup. This module centralizes the variable names and their
//! defaults so no crate re-defines them.

/// Environment variable names.
pub mod env_vars {
    pub const MQTT_BROKER_URL: &str = "MQTT_BROKER_URL";
    pub const MQTT_USERNAME: &str = "MQTT_USERNAME";
    pub const MQTT_PASSWORD: &str = "MQTT_PASSWORD";
    pub const MQTT_FEED_TOPIC: &str = "MQTT_FEED_TOPIC";
    pub const MQTT_ACK_TOPIC_FILTER: &str = "MQTT_ACK_TOPIC_FILTER";
    pub const FEED_ACK_TIMEOUT_SECS: &str = "FEED_ACK_TIMEOUT_SECS";
    pub const DATA_DIR: &str = "PAWFEED_DATA_DIR";
    pub const JWT_SECRET: &str = "PAWFEED_JWT_SECRET";
    pub const APP_TIMEZONE: &str = "APP_TIMEZONE";
    pub const DEFAULT_USERNAME: &str = "DEFAULT_USERNAME";
    pub const DEFAULT_PASSWORD: &str = "DEFAULT_PASSWORD";
    pub const PORT: &str = "PORT";
    pub const LOG_JSON: &str = "PAWFEED_LOG_JSON";
}

/// Default values used when the environment leaves a setting unset.
pub mod defaults {
    pub const MQTT_BROKER_URL: &str = "mqtt://localhost:1883";
    pub const MQTT_FEED_TOPIC: &str = "petfeeder/feed";
    pub const MQTT_ACK_TOPIC_FILTER: &str = "petfeeder/+/ack";
    pub const FEED_ACK_TIMEOUT_SECS: u64 = 15;
    pub const DATA_DIR: &str = "data";
    pub const APP_TIMEZONE: &str = "Asia/Ho_Chi_Minh";
    pub const DEFAULT_USERNAME: &str = "operator";
    pub const DEFAULT_PASSWORD: &str = "operator123";
    pub const PORT: u16 = 5000;
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Broker URL, e.g. `mqtt://host:1883` or `mqtts://host:8883`.
pub fn mqtt_broker_url() -> String {
    var(env_vars::MQTT_BROKER_URL).unwrap_or_else(|| defaults::MQTT_BROKER_URL.to_string())
}

/// Broker credentials, when both are configured.
pub fn mqtt_credentials() -> Option<(String, String)> {
    match (var(env_vars::MQTT_USERNAME), var(env_vars::MQTT_PASSWORD)) {
        (Some(u), Some(p)) => Some((u, p)),
        _ => None,
    }
}

/// Topic feed commands are published to.
pub fn mqtt_feed_topic() -> String {
    var(env_vars::MQTT_FEED_TOPIC).unwrap_or_else(|| defaults::MQTT_FEED_TOPIC.to_string())
}

/// Wildcard filter matching every device's acknowledgment topic.
pub fn mqtt_ack_topic_filter() -> String {
    var(env_vars::MQTT_ACK_TOPIC_FILTER)
        .unwrap_or_else(|| defaults::MQTT_ACK_TOPIC_FILTER.to_string())
}

/// How long a dispatched command waits for its acknowledgment.
pub fn feed_ack_timeout_secs() -> u64 {
    var(env_vars::FEED_ACK_TIMEOUT_SECS)
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults::FEED_ACK_TIMEOUT_SECS)
}

/// Directory the embedded database lives in.
pub fn data_dir() -> String {
    var(env_vars::DATA_DIR).unwrap_or_else(|| defaults::DATA_DIR.to_string())
}

/// Secret used to sign auth tokens. `None` means the operator must set one.
pub fn jwt_secret() -> Option<String> {
    var(env_vars::JWT_SECRET)
}

/// IANA timezone name used for schedule matching and daily stats.
pub fn app_timezone() -> String {
    var(env_vars::APP_TIMEZONE).unwrap_or_else(|| defaults::APP_TIMEZONE.to_string())
}

/// Bootstrap operator credentials for a fresh database.
pub fn bootstrap_credentials() -> (String, String) {
    (
        var(env_vars::DEFAULT_USERNAME).unwrap_or_else(|| defaults::DEFAULT_USERNAME.to_string()),
        var(env_vars::DEFAULT_PASSWORD).unwrap_or_else(|| defaults::DEFAULT_PASSWORD.to_string()),
    )
}

/// HTTP port to bind.
pub fn port() -> u16 {
    var(env_vars::PORT)
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults::PORT)
}

/// Whether logs should be emitted as JSON lines.
pub fn log_json() -> bool {
    var(env_vars::LOG_JSON)
        .and_then(|s| s.parse().ok())
        .unwrap_or(false)
}
