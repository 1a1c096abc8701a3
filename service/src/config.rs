//! Configuration management for the read-model service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The binary loads a `.env` file first, if present.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RedPanda/Kafka configuration
    pub redpanda: RedpandaConfig,
    /// Ingestion consumer configuration
    pub consumer: ConsumerConfig,
    /// Process-level configuration
    pub server: ServerConfig,
}

/// RedPanda/Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group prefix for the read models
    pub consumer_group: String,
    /// Where every subscription starts reading: `earliest` rebuilds the
    /// stores from the full streams
    pub auto_offset_reset: String,
    /// Outbound topic for purchase requests
    pub purchase_topic: String,
    /// Inbound topic for inventory updates
    pub inventory_topic: String,
    /// Inbound topic for payment status updates
    pub payment_status_topic: String,
    /// Producer acknowledgment mode: "0", "1" or "all"
    pub producer_acks: String,
    /// Producer compression codec: "none", "gzip", "snappy", "lz4", "zstd"
    pub compression: String,
    /// Producer send timeout in milliseconds
    pub timeout_ms: u64,
    /// Envelopes buffered per subscription
    pub buffer_size: usize,
}

/// Ingestion consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Delay before resubscribing after a failed or ended subscription
    pub retry_delay_ms: u64,
}

/// Process-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log filter directives used when `RUST_LOG` is unset
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds, per consumer
    pub shutdown_timeout: u64,
}

/// Invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A topic name is empty
    #[error("{name} must not be empty")]
    EmptyTopic {
        /// Environment variable of the topic
        name: &'static str,
    },

    /// Both inbound streams point at the same topic
    #[error("inventory and payment status topics must differ (both are {0})")]
    SharedInboundTopic(String),

    /// Shutdown timeout of zero seconds
    #[error("SHUTDOWN_TIMEOUT must be positive")]
    ZeroShutdownTimeout,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            redpanda: RedpandaConfig {
                brokers: var("REDPANDA_BROKERS").unwrap_or(defaults.redpanda.brokers),
                consumer_group: var("CONSUMER_GROUP").unwrap_or(defaults.redpanda.consumer_group),
                auto_offset_reset: var("AUTO_OFFSET_RESET").unwrap_or(defaults.redpanda.auto_offset_reset),
                purchase_topic: var("PURCHASE_TOPIC").unwrap_or(defaults.redpanda.purchase_topic),
                inventory_topic: var("INVENTORY_TOPIC").unwrap_or(defaults.redpanda.inventory_topic),
                payment_status_topic: var("PAYMENT_STATUS_TOPIC")
                    .unwrap_or(defaults.redpanda.payment_status_topic),
                producer_acks: var("REDPANDA_PRODUCER_ACKS").unwrap_or(defaults.redpanda.producer_acks),
                compression: var("REDPANDA_COMPRESSION").unwrap_or(defaults.redpanda.compression),
                timeout_ms: var("REDPANDA_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.redpanda.timeout_ms),
                buffer_size: var("REDPANDA_BUFFER_SIZE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.redpanda.buffer_size),
            },
            consumer: ConsumerConfig {
                retry_delay_ms: var("CONSUMER_RETRY_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.consumer.retry_delay_ms),
            },
            server: ServerConfig {
                log_level: var("LOG_LEVEL").unwrap_or(defaults.server.log_level),
                metrics_host: var("METRICS_HOST").unwrap_or(defaults.server.metrics_host),
                metrics_port: var("METRICS_PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.server.metrics_port),
                shutdown_timeout: var("SHUTDOWN_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.server.shutdown_timeout),
            },
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty topic, identical inbound topics
    /// or a zero shutdown timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, topic) in [
            ("PURCHASE_TOPIC", &self.redpanda.purchase_topic),
            ("INVENTORY_TOPIC", &self.redpanda.inventory_topic),
            ("PAYMENT_STATUS_TOPIC", &self.redpanda.payment_status_topic),
        ] {
            if topic.trim().is_empty() {
                return Err(ConfigError::EmptyTopic { name });
            }
        }
        if self.redpanda.inventory_topic == self.redpanda.payment_status_topic {
            return Err(ConfigError::SharedInboundTopic(self.redpanda.inventory_topic.clone()));
        }
        if self.server.shutdown_timeout == 0 {
            return Err(ConfigError::ZeroShutdownTimeout);
        }
        Ok(())
    }

    /// Consumer retry delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.consumer.retry_delay_ms)
    }

    /// Producer send timeout.
    #[must_use]
    pub const fn producer_timeout(&self) -> Duration {
        Duration::from_millis(self.redpanda.timeout_ms)
    }

    /// Per-consumer shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }

    /// `host:port` of the Prometheus listener.
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redpanda: RedpandaConfig {
                brokers: "localhost:9092".to_string(),
                consumer_group: "ticket-sync-read-models".to_string(),
                auto_offset_reset: "earliest".to_string(),
                purchase_topic: "ticketing-purchase-requests".to_string(),
                inventory_topic: "ticketing-inventory-updates".to_string(),
                payment_status_topic: "ticketing-payment-status".to_string(),
                producer_acks: "1".to_string(),
                compression: "none".to_string(),
                timeout_ms: 5000,
                buffer_size: 1000,
            },
            consumer: ConsumerConfig { retry_delay_ms: 5000 },
            server: ServerConfig {
                log_level: "ticket_sync=info".to_string(),
                metrics_host: "0.0.0.0".to_string(),
                metrics_port: 9090,
                shutdown_timeout: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[]));

        assert_eq!(config.redpanda.brokers, "localhost:9092");
        assert_eq!(config.redpanda.auto_offset_reset, "earliest");
        assert_eq!(config.redpanda.inventory_topic, "ticketing-inventory-updates");
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.metrics_address(), "0.0.0.0:9090");
        assert_eq!(config.server.log_level, "ticket_sync=info");
        assert_eq!(config.redpanda.producer_acks, "1");
        assert_eq!(config.redpanda.compression, "none");
        assert_eq!(config.producer_timeout(), Duration::from_secs(5));
        assert_eq!(config.redpanda.buffer_size, 1000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn producer_and_logging_settings_come_from_env() {
        let config = Config::from_lookup(lookup(&[
            ("REDPANDA_PRODUCER_ACKS", "all"),
            ("REDPANDA_COMPRESSION", "zstd"),
            ("REDPANDA_TIMEOUT_MS", "1500"),
            ("REDPANDA_BUFFER_SIZE", "64"),
            ("LOG_LEVEL", "ticket_sync=debug,rdkafka=warn"),
        ]));

        assert_eq!(config.redpanda.producer_acks, "all");
        assert_eq!(config.redpanda.compression, "zstd");
        assert_eq!(config.producer_timeout(), Duration::from_millis(1500));
        assert_eq!(config.redpanda.buffer_size, 64);
        assert_eq!(config.server.log_level, "ticket_sync=debug,rdkafka=warn");
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let config = Config::from_lookup(lookup(&[
            ("REDPANDA_BROKERS", "kafka-1:9092,kafka-2:9092"),
            ("CONSUMER_RETRY_DELAY_MS", "250"),
            ("METRICS_PORT", "not-a-port"),
        ]));

        assert_eq!(config.redpanda.brokers, "kafka-1:9092,kafka-2:9092");
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.server.metrics_port, 9090);
    }

    #[test]
    fn validation_rejects_bad_topics_and_timeout() {
        let empty = Config::from_lookup(lookup(&[("PURCHASE_TOPIC", " ")]));
        assert_eq!(empty.validate(), Err(ConfigError::EmptyTopic { name: "PURCHASE_TOPIC" }));

        let shared = Config::from_lookup(lookup(&[
            ("INVENTORY_TOPIC", "updates"),
            ("PAYMENT_STATUS_TOPIC", "updates"),
        ]));
        assert_eq!(
            shared.validate(),
            Err(ConfigError::SharedInboundTopic("updates".to_string()))
        );

        let zero = Config::from_lookup(lookup(&[("SHUTDOWN_TIMEOUT", "0")]));
        assert_eq!(zero.validate(), Err(ConfigError::ZeroShutdownTimeout));
    }
}
