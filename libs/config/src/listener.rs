//! Listener-wide configuration
//!
//! Loaded from TOML, optionally layered with `MQLINK_` environment variables:
//!
//! ```toml
//! client_id = "orders-service"
//! shutdown_timeout_ms = 10000
//!
//! [consumers.orders]
//! queue = { name = "${ORDERS_QUEUE}" }
//! ack_mode = "session_transacted"
//! ```
//!
//! `${VAR}` references in destination names, selectors and the client id are expanded from
//! the process environment after loading.

use crate::consumer::ConsumerConfig;
use crate::error::{ConfigError, ConfigResult};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default values
pub mod defaults {
    /// Grace period for in-flight handlers during graceful stop (milliseconds)
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

    /// Pause after an empty receive (milliseconds)
    pub const POLLING_INTERVAL_MS: u64 = 1_000;

    /// Upper bound of a single blocking receive (milliseconds)
    pub const RECEIVE_TIMEOUT_MS: u64 = 5_000;

    /// Environment variable prefix for layered loading
    pub const ENV_PREFIX: &str = "MQLINK";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Connection client id; a random one is assigned when absent
    pub client_id: Option<String>,
    pub shutdown_timeout_ms: u64,
    pub polling_interval_ms: u64,
    pub receive_timeout_ms: u64,
    /// Named consumers, looked up by service name at attach time
    pub consumers: BTreeMap<String, ConsumerConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            shutdown_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
            polling_interval_ms: defaults::POLLING_INTERVAL_MS,
            receive_timeout_ms: defaults::RECEIVE_TIMEOUT_MS,
            consumers: BTreeMap::new(),
        }
    }
}

impl ListenerConfig {
    /// Parse a TOML file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.expand_env_vars()?;
        config.validate()?;
        info!(path = %path.display(), consumers = config.consumers.len(), "Loaded listener config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Layered load: optional file, then `MQLINK_*` environment overrides
    ///
    /// Nested keys use a double underscore, e.g. `MQLINK_CONSUMERS__ORDERS__ACK_MODE`.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.expand_env_vars()?;
        config.validate()?;
        debug!(?config, "Resolved layered listener config");
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
            ("polling_interval_ms", self.polling_interval_ms),
            ("receive_timeout_ms", self.receive_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTimeout { field });
            }
        }
        for consumer in self.consumers.values() {
            consumer.validate()?;
        }
        Ok(())
    }

    /// Expand `${VAR}` references from the process environment
    pub fn expand_env_vars(&mut self) -> ConfigResult<()> {
        if let Some(client_id) = &self.client_id {
            self.client_id = Some(expand("client_id", client_id)?);
        }
        for (name, consumer) in self.consumers.iter_mut() {
            if let Some(queue) = consumer.queue.as_mut() {
                queue.name = expand(&format!("consumers.{}.queue", name), &queue.name)?;
            }
            if let Some(topic) = consumer.topic.as_mut() {
                topic.name = expand(&format!("consumers.{}.topic", name), &topic.name)?;
            }
            if let Some(selector) = consumer.message_selector.as_mut() {
                *selector = expand(&format!("consumers.{}.message_selector", name), selector)?;
            }
        }
        Ok(())
    }

    pub fn consumer(&self, name: &str) -> Option<&ConsumerConfig> {
        self.consumers.get(name)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

fn expand(field: &str, value: &str) -> ConfigResult<String> {
    shellexpand::env(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| ConfigError::Expansion {
            field: field.to_string(),
            reason: e.to_string(),
        })
}
