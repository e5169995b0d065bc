//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind addresses).
    pub listener: ListenerConfig,

    /// Static route definitions, local identity → upstream identity.
    pub routes: Vec<RouteConfig>,

    /// Upstream timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind addresses (e.g., "0.0.0.0:31388"). One listener per entry.
    pub bind_addresses: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addresses: vec!["0.0.0.0:31388".to_string()],
        }
    }
}

/// A single route mapping.
///
/// Ports are kept as wide integers so that out-of-range values are reported
/// by validation rather than as opaque parse errors.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Local host the inbound connection is addressed to.
    pub local_host: String,

    /// Local port the inbound connection is addressed to.
    pub local_port: i64,

    /// Upstream host requests are forwarded to.
    pub remote_host: String,

    /// Upstream port requests are forwarded to.
    pub remote_port: i64,
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 10 }
    }
}

/// Limits on buffered payloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request or response body buffered by the unary forwarder.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_addresses = ["127.0.0.1:9000"]

            [timeouts]
            connect_secs = 3

            [[routes]]
            local_host = "192.168.12.2"
            local_port = 31388
            remote_host = "117.55.241.77"
            remote_port = 31380
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_addresses, vec!["127.0.0.1:9000"]);
        assert_eq!(config.timeouts.connect_secs, 3);
        assert_eq!(config.limits.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].remote_port, 31380);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_addresses, vec!["0.0.0.0:31388"]);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        let result: Result<GatewayConfig, _> = toml::from_str(
            r#"
            [[routes]]
            local_host = "a"
            local_port = "eighty"
            remote_host = "b"
            remote_port = 80
            "#,
        );
        assert!(result.is_err());
    }
}
