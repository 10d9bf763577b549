//! # mqlink Configuration
//!
//! Configuration for listeners and the consumers attached to them.
//!
//! ## Features
//!
//! - **Consumer destinations**: exactly one queue or topic per consumer, with topic
//!   subscription settings (no-local, durable/shared, subscriber name) and a message selector
//! - **Acknowledgement modes**: session transacted, auto, client, dups-ok
//! - **Listener timing**: shutdown grace period, polling interval, receive timeout
//! - **Loading**: TOML files, or layered file + `MQLINK_` environment overrides
//!
//! ## Usage
//!
//! ```rust
//! use mqlink_config::{AckMode, ConsumerConfig, ListenerConfig};
//!
//! let listener = ListenerConfig::default();
//! let consumer = ConsumerConfig::queue("ORDERS.IN").with_ack_mode(AckMode::SessionTransacted);
//! assert!(consumer.validate().is_ok());
//! assert_eq!(listener.shutdown_timeout_ms, 30_000);
//! ```

pub mod consumer;
pub mod error;
pub mod listener;

pub use consumer::{AckMode, ConsumerConfig, ConsumerSource, ConsumerType, QueueConfig, TopicConfig};
pub use error::{ConfigError, ConfigResult};
pub use listener::{defaults, ListenerConfig};
