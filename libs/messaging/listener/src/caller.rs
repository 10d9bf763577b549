use crate::error::ListenerResult;
use crate::transport::Session;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Session-scoped helper handed to message handlers that ask for it
///
/// Lets a handler settle a transacted session once it has processed the message.
#[derive(Clone)]
pub struct Caller {
    consumer: Arc<str>,
    session: Arc<dyn Session>,
}

impl Caller {
    pub(crate) fn new(consumer: Arc<str>, session: Arc<dyn Session>) -> Self {
        Self { consumer, session }
    }

    /// Name of the consumer that delivered the message
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub async fn commit(&self) -> ListenerResult<()> {
        debug!(consumer = %self.consumer, "Committing session");
        self.session.commit().await
    }

    pub async fn rollback(&self) -> ListenerResult<()> {
        debug!(consumer = %self.consumer, "Rolling back session");
        self.session.rollback().await
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("consumer", &self.consumer)
            .finish_non_exhaustive()
    }
}
