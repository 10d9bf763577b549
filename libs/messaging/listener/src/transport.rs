//! Transport collaborator seams
//!
//! The listener never opens, configures or authenticates a connection. A client library
//! binding implements these traits; [`crate::test_utils`] provides an in-memory one.

use crate::error::{ListenerError, ListenerResult};
use async_trait::async_trait;
use mqlink_config::{AckMode, ConsumerSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use types::RawMessage;

/// A connection shared by every consumer attached to one listener
#[async_trait]
pub trait Connection: Send + Sync {
    fn client_id(&self) -> Option<String>;

    fn set_client_id(&self, client_id: &str) -> ListenerResult<()>;

    /// Register the sink for asynchronous connection faults
    fn set_exception_listener(&self, listener: Arc<dyn ExceptionListener>);

    /// Create a session owned by exactly one consumer
    async fn create_session(&self, ack_mode: AckMode) -> ListenerResult<Arc<dyn Session>>;

    /// Begin message delivery
    async fn start(&self) -> ListenerResult<()>;

    async fn stop(&self) -> ListenerResult<()>;

    async fn close(&self) -> ListenerResult<()>;
}

#[async_trait]
pub trait Session: Send + Sync {
    async fn create_consumer(
        &self,
        source: &ConsumerSource,
        selector: Option<&str>,
    ) -> ListenerResult<Arc<dyn MessageConsumer>>;

    async fn commit(&self) -> ListenerResult<()>;

    async fn rollback(&self) -> ListenerResult<()>;

    async fn close(&self) -> ListenerResult<()>;
}

/// Pull-style message source
///
/// `receive` must be cancel-safe: dropping the future before it resolves may not lose a
/// message. The dispatcher races it against its stop signal.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait up to `timeout` for the next message; `Ok(None)` when nothing arrived
    async fn receive(&self, timeout: Duration) -> ListenerResult<Option<RawMessage>>;

    async fn close(&self) -> ListenerResult<()>;
}

/// Sink for faults the connection reports outside of any call
pub trait ExceptionListener: Send + Sync {
    fn on_exception(&self, error: &ListenerError);
}

/// Logs asynchronous connection faults
#[derive(Debug, Clone)]
pub struct LoggingExceptionListener {
    client_id: String,
}

impl LoggingExceptionListener {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl ExceptionListener for LoggingExceptionListener {
    fn on_exception(&self, error: &ListenerError) {
        error!(client_id = %self.client_id, error = %error, "Connection fault");
    }
}
