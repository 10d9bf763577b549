//! Per-consumer configuration
//!
//! A consumer reads from exactly one destination, either a queue or a topic. Topics add
//! subscription settings; durable and shared subscriptions are identified by a subscriber
//! name.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session acknowledgement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    SessionTransacted,
    AutoAcknowledge,
    ClientAcknowledge,
    #[default]
    DupsOkAcknowledge,
}

impl AckMode {
    pub fn is_transacted(self) -> bool {
        matches!(self, AckMode::SessionTransacted)
    }
}

/// Topic subscription flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerType {
    #[default]
    Default,
    Durable,
    Shared,
    SharedDurable,
}

impl ConsumerType {
    pub fn requires_subscriber_name(self) -> bool {
        !matches!(self, ConsumerType::Default)
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsumerType::Default => "default",
            ConsumerType::Durable => "durable",
            ConsumerType::Shared => "shared",
            ConsumerType::SharedDurable => "shared durable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    #[serde(default)]
    pub no_local: bool,
    #[serde(default)]
    pub consumer_type: ConsumerType,
    #[serde(default)]
    pub subscriber_name: Option<String>,
}

impl TopicConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            no_local: false,
            consumer_type: ConsumerType::Default,
            subscriber_name: None,
        }
    }

    pub fn durable(name: impl Into<String>, subscriber_name: impl Into<String>) -> Self {
        Self {
            consumer_type: ConsumerType::Durable,
            subscriber_name: Some(subscriber_name.into()),
            ..Self::new(name)
        }
    }
}

/// The single destination a validated consumer reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerSource {
    Queue(QueueConfig),
    Topic(TopicConfig),
}

impl ConsumerSource {
    pub fn name(&self) -> &str {
        match self {
            ConsumerSource::Queue(q) => &q.name,
            ConsumerSource::Topic(t) => &t.name,
        }
    }
}

impl fmt::Display for ConsumerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerSource::Queue(q) => write!(f, "queue:{}", q.name),
            ConsumerSource::Topic(t) => write!(f, "topic:{}", t.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub queue: Option<QueueConfig>,
    pub topic: Option<TopicConfig>,
    pub ack_mode: AckMode,
    pub message_selector: Option<String>,
}

impl ConsumerConfig {
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            queue: Some(QueueConfig { name: name.into() }),
            ..Self::default()
        }
    }

    pub fn topic(topic: TopicConfig) -> Self {
        Self {
            topic: Some(topic),
            ..Self::default()
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.message_selector = Some(selector.into());
        self
    }

    /// Check the destination rules and return the destination to consume from
    pub fn validate(&self) -> ConfigResult<ConsumerSource> {
        let source = match (&self.queue, &self.topic) {
            (Some(queue), None) => ConsumerSource::Queue(queue.clone()),
            (None, Some(topic)) => ConsumerSource::Topic(topic.clone()),
            (Some(queue), Some(topic)) => {
                return Err(ConfigError::AmbiguousDestination {
                    queue: queue.name.clone(),
                    topic: topic.name.clone(),
                })
            }
            (None, None) => return Err(ConfigError::MissingDestination),
        };

        if source.name().trim().is_empty() {
            return Err(ConfigError::EmptyDestination);
        }
        if let ConsumerSource::Topic(topic) = &source {
            let has_subscriber = topic
                .subscriber_name
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty());
            if topic.consumer_type.requires_subscriber_name() && !has_subscriber {
                return Err(ConfigError::MissingSubscriberName {
                    topic: topic.name.clone(),
                    consumer_type: topic.consumer_type.to_string(),
                });
            }
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_consumer_validates() {
        let source = ConsumerConfig::queue("ORDERS").validate().unwrap();
        assert_eq!(source, ConsumerSource::Queue(QueueConfig { name: "ORDERS".into() }));
        assert_eq!(source.to_string(), "queue:ORDERS");
    }

    #[test]
    fn test_destination_must_be_unique_and_named() {
        assert!(matches!(
            ConsumerConfig::default().validate(),
            Err(ConfigError::MissingDestination)
        ));
        assert!(matches!(
            ConsumerConfig::queue("  ").validate(),
            Err(ConfigError::EmptyDestination)
        ));

        let both = ConsumerConfig {
            topic: Some(TopicConfig::new("prices")),
            ..ConsumerConfig::queue("ORDERS")
        };
        assert!(matches!(
            both.validate(),
            Err(ConfigError::AmbiguousDestination { .. })
        ));
    }

    #[test]
    fn test_durable_topic_needs_subscriber() {
        let mut topic = TopicConfig::new("prices");
        topic.consumer_type = ConsumerType::SharedDurable;
        let err = ConsumerConfig::topic(topic).validate().unwrap_err();
        assert!(err.to_string().contains("shared durable"));

        assert!(ConsumerConfig::topic(TopicConfig::durable("prices", "sub-1"))
            .validate()
            .is_ok());
        assert!(ConsumerConfig::topic(TopicConfig::new("prices")).validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = ConsumerConfig::queue("Q");
        assert_eq!(config.ack_mode, AckMode::DupsOkAcknowledge);
        assert!(!config.ack_mode.is_transacted());
        assert!(AckMode::SessionTransacted.is_transacted());
    }
}
