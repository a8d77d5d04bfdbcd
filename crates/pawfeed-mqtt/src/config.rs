//! Broker connection configuration.

use pawfeed_core::config as core_config;
use serde::{Deserialize, Serialize};

/// MQTT quality-of-service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl Default for Qos {
    fn default() -> Self {
        Self::AtLeastOnce
    }
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Configuration for the broker connection and the command/ack channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP.
    pub broker: String,

    /// Broker port (1883 plain, 8883 TLS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use TLS (`mqtts://`).
    #[serde(default)]
    pub tls: bool,

    /// Client ID; a unique one is generated when unset so multiple backend
    /// instances never clash on the broker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    /// Delay between reconnect attempts in milliseconds. Retries are
    /// unbounded; the daemon keeps trying until shut down.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Topic feed commands are published to.
    #[serde(default = "default_command_topic")]
    pub command_topic: String,

    /// Wildcard filter matching every device's ack topic.
    #[serde(default = "default_ack_topic_filter")]
    pub ack_topic_filter: String,

    /// Default acknowledgment timeout in seconds.
    #[serde(default = "default_ack_timeout")]
    pub default_timeout_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_interval() -> u64 {
    5000
}

fn default_command_topic() -> String {
    core_config::defaults::MQTT_FEED_TOPIC.to_string()
}

fn default_ack_topic_filter() -> String {
    core_config::defaults::MQTT_ACK_TOPIC_FILTER.to_string()
}

fn default_ack_timeout() -> u64 {
    core_config::defaults::FEED_ACK_TIMEOUT_SECS
}

impl MqttConfig {
    /// Create a configuration for the given broker host.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: default_port(),
            tls: false,
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            reconnect_interval_ms: default_reconnect_interval(),
            command_topic: default_command_topic(),
            ack_topic_filter: default_ack_topic_filter(),
            default_timeout_secs: default_ack_timeout(),
        }
    }

    /// Parse a `mqtt://host[:port]` or `mqtts://host[:port]` URL.
    pub fn from_url(url: &str) -> Result<Self, String> {
        let (rest, tls) = if let Some(rest) = url.strip_prefix("mqtts://") {
            (rest, true)
        } else if let Some(rest) = url.strip_prefix("mqtt://") {
            (rest, false)
        } else {
            return Err(format!("unsupported broker url scheme: {url}"));
        };

        let rest = rest.trim_end_matches('/');
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid broker port in url: {url}"))?;
                (host, port)
            }
            None => (rest, if tls { 8883 } else { 1883 }),
        };
        if host.is_empty() {
            return Err(format!("missing broker host in url: {url}"));
        }

        let mut config = Self::new(host);
        config.port = port;
        config.tls = tls;
        Ok(config)
    }

    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::from_url(&core_config::mqtt_broker_url())?;
        if let Some((username, password)) = core_config::mqtt_credentials() {
            config.username = Some(username);
            config.password = Some(password);
        }
        config.command_topic = core_config::mqtt_feed_topic();
        config.ack_topic_filter = core_config::mqtt_ack_topic_filter();
        config.default_timeout_secs = core_config::feed_ack_timeout_secs();
        Ok(config)
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the client ID.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Client ID to connect with, generating a unique one when unset.
    pub fn effective_client_id(&self) -> String {
        self.client_id.clone().unwrap_or_else(|| {
            let suffix: u32 = rand::random();
            format!(
                "pawfeed-backend-{}-{suffix:08x}",
                chrono::Utc::now().timestamp_millis()
            )
        })
    }

    /// Broker address with credentials redacted, safe for logs.
    pub fn redacted_addr(&self) -> String {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        if self.username.is_some() {
            format!("{scheme}://***:***@{}:{}", self.broker, self.port)
        } else {
            format!("{scheme}://{}:{}", self.broker, self.port)
        }
    }
}

impl std::fmt::Display for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.redacted_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_plain() {
        let config = MqttConfig::from_url("mqtt://broker.local:1884").unwrap();
        assert_eq!(config.broker, "broker.local");
        assert_eq!(config.port, 1884);
        assert!(!config.tls);
    }

    #[test]
    fn test_from_url_tls_default_port() {
        let config = MqttConfig::from_url("mqtts://broker.local").unwrap();
        assert_eq!(config.port, 8883);
        assert!(config.tls);
    }

    #[test]
    fn test_from_url_rejects_unknown_scheme() {
        assert!(MqttConfig::from_url("http://broker.local").is_err());
        assert!(MqttConfig::from_url("mqtt://").is_err());
    }

    #[test]
    fn test_redacted_addr_hides_credentials() {
        let config = MqttConfig::new("broker.local").with_auth("feeder", "hunter2");
        let shown = config.redacted_addr();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("feeder"));
        assert!(shown.contains("***"));
    }

    #[test]
    fn test_effective_client_ids_unique() {
        let config = MqttConfig::new("broker.local");
        assert_ne!(config.effective_client_id(), config.effective_client_id());
    }

    #[test]
    fn test_qos_conversion() {
        assert_eq!(rumqttc::QoS::from(Qos::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(Qos::default(), Qos::AtLeastOnce);
    }
}
