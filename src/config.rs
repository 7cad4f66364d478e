//! Application configuration
//!
//! Read from `config/{env}.yaml`, then overridden by `PIX_*` environment variables.

use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::PublishRetry;

pub const DEFAULT_TOPIC: &str = "transaction_events_topic";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// PostgreSQL URL; without it the service runs on in-memory stores
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl GatewayConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "gateway".to_string(),
            value: raw,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventsConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    /// Defaults to `<topic>_handler`
    #[serde(default)]
    pub consumer_group: Option<String>,
    /// Partition count of the topic (consumer tasks in memory mode)
    pub partitions: usize,
    pub publish_attempts: u32,
    pub publish_backoff_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: DEFAULT_TOPIC.to_string(),
            consumer_group: None,
            partitions: 4,
            publish_attempts: 4,
            publish_backoff_ms: 100,
        }
    }
}

impl EventsConfig {
    pub fn consumer_group(&self) -> String {
        self.consumer_group
            .clone()
            .unwrap_or_else(|| format!("{}_handler", self.topic))
    }

    pub fn publish_retry(&self) -> PublishRetry {
        PublishRetry {
            attempts: self.publish_attempts,
            backoff: Duration::from_millis(self.publish_backoff_ms),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WebhookConfig {
    /// Callback used when an event carries none
    #[serde(default)]
    pub default_url: Option<String>,
    /// No timeout when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl WebhookConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `PIX_*` overrides; `lookup` is `std::env::var` outside tests
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PIX_POSTGRES_URL") {
            self.postgres_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(brokers) = lookup("PIX_KAFKA_BROKERS") {
            self.events.brokers = brokers
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(topic) = lookup("PIX_TRANSACTION_TOPIC") {
            self.events.topic = topic;
        }
        if let Some(group) = lookup("PIX_CONSUMER_GROUP") {
            self.events.consumer_group = Some(group);
        }
        if let Some(port) = lookup("PIX_GATEWAY_PORT") {
            self.gateway.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PIX_GATEWAY_PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(url) = lookup("PIX_DEFAULT_WEBHOOK_URL") {
            self.webhook.default_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(level) = lookup("PIX_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }
}
