//! Runtime configuration loaded from environment variables

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Errors while reading a single configuration value
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Push service configuration
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Address the HTTP/WS listener binds to
    pub bind_addr: SocketAddr,
    /// Depth of the hub's command queue; producers wait when it is full
    pub hub_queue: usize,
    /// Outbound frames buffered per connection before it is evicted as a slow consumer
    pub connection_queue: usize,
    /// How often the writer pings the client
    pub ping_interval: Duration,
    /// Connection is dropped when nothing was read for this long
    pub idle_timeout: Duration,
    /// Unread notifications replayed to a freshly connected socket (0 = off)
    pub catchup_limit: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8086)),
            hub_queue: 1024,
            connection_queue: 64,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(75),
            catchup_limit: 20,
        }
    }
}

fn parse_env<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        _ => Ok(None),
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> T {
    match parse_env(key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!("{}, using default", e);
            default
        }
    }
}

/// Longest accepted ping interval or idle timeout, in seconds
const MAX_INTERVAL_SECS: u64 = 3600;

/// Interval setting in whole seconds, clamped to `1..=MAX_INTERVAL_SECS`
fn env_secs(key: &'static str, default: u64) -> u64 {
    let secs = env_or(key, default);
    if secs > MAX_INTERVAL_SECS {
        tracing::warn!(
            "{} of {}s exceeds {}s, capping",
            key,
            secs,
            MAX_INTERVAL_SECS
        );
    }
    secs.clamp(1, MAX_INTERVAL_SECS)
}

impl PushConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env_or("PUSH_BIND_ADDR", defaults.bind_addr);
        let hub_queue = env_or("PUSH_HUB_QUEUE", defaults.hub_queue).max(1);
        let connection_queue = env_or("PUSH_CONNECTION_QUEUE", defaults.connection_queue).max(1);
        let ping_interval = Duration::from_secs(env_secs(
            "PUSH_PING_INTERVAL_SECS",
            defaults.ping_interval.as_secs(),
        ));
        let mut idle_timeout = Duration::from_secs(env_secs(
            "PUSH_IDLE_TIMEOUT_SECS",
            defaults.idle_timeout.as_secs(),
        ));
        if idle_timeout <= ping_interval {
            // A healthy client could never answer in time otherwise
            tracing::warn!(
                ?idle_timeout,
                ?ping_interval,
                "PUSH_IDLE_TIMEOUT_SECS must exceed the ping interval, adjusting"
            );
            idle_timeout = ping_interval
                .saturating_mul(2)
                .saturating_add(Duration::from_secs(15));
        }
        let catchup_limit = env_or("PUSH_CATCHUP_LIMIT", defaults.catchup_limit);

        let config = Self {
            bind_addr,
            hub_queue,
            connection_queue,
            ping_interval,
            idle_timeout,
            catchup_limit,
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            hub_queue = config.hub_queue,
            connection_queue = config.connection_queue,
            ping_interval_secs = config.ping_interval.as_secs(),
            idle_timeout_secs = config.idle_timeout.as_secs(),
            catchup_limit = config.catchup_limit,
            "Push config loaded"
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "PUSH_BIND_ADDR",
        "PUSH_HUB_QUEUE",
        "PUSH_CONNECTION_QUEUE",
        "PUSH_PING_INTERVAL_SECS",
        "PUSH_IDLE_TIMEOUT_SECS",
        "PUSH_CATCHUP_LIMIT",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        let config = PushConfig::from_env();
        let defaults = PushConfig::default();

        assert_eq!(config.bind_addr, defaults.bind_addr);
        assert_eq!(config.hub_queue, 1024);
        assert_eq!(config.connection_queue, 64);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(75));
        assert_eq!(config.catchup_limit, 20);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("PUSH_BIND_ADDR", "127.0.0.1:9000");
        std::env::set_var("PUSH_CONNECTION_QUEUE", "8");
        std::env::set_var("PUSH_CATCHUP_LIMIT", "0");

        let config = PushConfig::from_env();
        clear_env();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.connection_queue, 8);
        assert_eq!(config.catchup_limit, 0);
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("PUSH_HUB_QUEUE", "lots");
        std::env::set_var("PUSH_CONNECTION_QUEUE", "0");

        let config = PushConfig::from_env();
        clear_env();

        assert_eq!(config.hub_queue, 1024);
        // Zero-capacity queues are not allowed
        assert_eq!(config.connection_queue, 1);
    }

    #[test]
    #[serial]
    fn test_idle_timeout_must_exceed_ping_interval() {
        clear_env();
        std::env::set_var("PUSH_PING_INTERVAL_SECS", "20");
        std::env::set_var("PUSH_IDLE_TIMEOUT_SECS", "10");

        let config = PushConfig::from_env();
        clear_env();

        assert_eq!(config.ping_interval, Duration::from_secs(20));
        assert!(config.idle_timeout > config.ping_interval);
    }

    #[test]
    #[serial]
    fn test_huge_intervals_are_capped() {
        clear_env();
        std::env::set_var("PUSH_PING_INTERVAL_SECS", u64::MAX.to_string());
        std::env::set_var("PUSH_IDLE_TIMEOUT_SECS", u64::MAX.to_string());

        let config = PushConfig::from_env();
        clear_env();

        assert_eq!(config.ping_interval, Duration::from_secs(MAX_INTERVAL_SECS));
        assert!(config.idle_timeout > config.ping_interval);
        assert!(config.idle_timeout <= Duration::from_secs(MAX_INTERVAL_SECS * 2 + 15));
    }

    #[test]
    #[serial]
    fn test_huge_ping_interval_with_default_idle_timeout() {
        clear_env();
        std::env::set_var("PUSH_PING_INTERVAL_SECS", "18446744073709551615");

        let config = PushConfig::from_env();
        clear_env();

        assert_eq!(config.ping_interval, Duration::from_secs(MAX_INTERVAL_SECS));
        assert_eq!(
            config.idle_timeout,
            Duration::from_secs(MAX_INTERVAL_SECS * 2 + 15)
        );
    }

    #[test]
    #[serial]
    fn test_parse_env_reports_invalid_value() {
        clear_env();
        std::env::set_var("PUSH_HUB_QUEUE", "-3");
        let result = parse_env::<usize>("PUSH_HUB_QUEUE");
        clear_env();

        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "PUSH_HUB_QUEUE");
                assert_eq!(value, "-3");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }
}
