//! Transceiver configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// How long to wait for the physical modem once the model has answered.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration fixed at transceiver construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransceiverConfig {
    /// Window the physical modem has to answer after the model's response
    /// arrived in split-verify mode. Zero is allowed (fast tests).
    #[serde(rename = "response_timeout_ms", deserialize_with = "deserialize_millis")]
    pub response_timeout: Duration,
}

impl TransceiverConfig {
    /// Config with the given response timeout in milliseconds.
    pub fn with_timeout_ms(millis: u64) -> Self {
        Self { response_timeout: Duration::from_millis(millis) }
    }
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self { response_timeout: DEFAULT_RESPONSE_TIMEOUT }
    }
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(TransceiverConfig::default().response_timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn parses_millis_from_toml() {
        let config: TransceiverConfig = toml::from_str("response_timeout_ms = 250").unwrap();
        assert_eq!(config, TransceiverConfig::with_timeout_ms(250));
    }

    #[test]
    fn missing_field_uses_default() {
        let config: TransceiverConfig = toml::from_str("").unwrap();
        assert_eq!(config, TransceiverConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = toml::from_str::<TransceiverConfig>("timeout = 5");
        assert!(result.is_err());
    }
}
