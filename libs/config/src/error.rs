//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Consumer has no destination: set exactly one of queue or topic")]
    MissingDestination,

    #[error("Consumer names both queue {queue:?} and topic {topic:?}")]
    AmbiguousDestination { queue: String, topic: String },

    #[error("Destination name is empty")]
    EmptyDestination,

    #[error("Topic {topic:?} uses a {consumer_type} consumer and needs a subscriber name")]
    MissingSubscriberName { topic: String, consumer_type: String },

    #[error("{field} must be greater than zero")]
    InvalidTimeout { field: &'static str },

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to load layered configuration: {0}")]
    Load(#[from] config_crate::ConfigError),

    #[error("Failed to expand {field}: {reason}")]
    Expansion { field: String, reason: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
