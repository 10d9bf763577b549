//! Send and receive path over a queue or topic object
//!
//! The queue manager opens and closes the underlying object; [`QueueEndpoint`] only encodes
//! envelopes on the way out and decodes them on the way in.

use crate::error::ListenerResult;
use async_trait::async_trait;
use codec::{decode_envelope, encode_envelope};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::constants::{
    MQGMO_NO_WAIT, MQMO_MATCH_CORREL_ID, MQMO_MATCH_MSG_ID, MQMO_NONE, MQPMO_NO_SYNCPOINT,
};
use types::{Envelope, RawMessage};

/// Default get wait interval in seconds, used together with `MQGMO_WAIT`
pub const DEFAULT_WAIT_INTERVAL_SECS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutMessageOptions {
    pub options: i32,
}

impl Default for PutMessageOptions {
    fn default() -> Self {
        Self {
            options: MQPMO_NO_SYNCPOINT,
        }
    }
}

/// Select a specific message by id and/or correlation id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOptions {
    pub message_id: Option<Vec<u8>>,
    pub correlation_id: Option<Vec<u8>>,
}

impl MatchOptions {
    pub fn message_id(id: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: Some(id.into()),
            correlation_id: None,
        }
    }

    pub fn correlation_id(id: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: None,
            correlation_id: Some(id.into()),
        }
    }

    /// `MQMO_*` flags for the ids that are set
    pub fn flags(&self) -> i32 {
        let mut flags = MQMO_NONE;
        if self.message_id.is_some() {
            flags |= MQMO_MATCH_MSG_ID;
        }
        if self.correlation_id.is_some() {
            flags |= MQMO_MATCH_CORREL_ID;
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetMessageOptions {
    pub options: i32,
    /// Seconds to wait for a message when `options` includes `MQGMO_WAIT`
    pub wait_interval: i32,
    pub match_options: Option<MatchOptions>,
}

impl Default for GetMessageOptions {
    fn default() -> Self {
        Self {
            options: MQGMO_NO_WAIT,
            wait_interval: DEFAULT_WAIT_INTERVAL_SECS,
            match_options: None,
        }
    }
}

impl GetMessageOptions {
    pub fn with_match(mut self, match_options: MatchOptions) -> Self {
        self.match_options = Some(match_options);
        self
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_secs(self.wait_interval.max(0) as u64)
    }

    pub fn match_flags(&self) -> i32 {
        self.match_options
            .as_ref()
            .map_or(MQMO_NONE, MatchOptions::flags)
    }

    /// Empty message whose descriptor carries the ids to match
    pub fn template(&self) -> RawMessage {
        let mut message = RawMessage::new();
        if let Some(match_options) = &self.match_options {
            if let Some(id) = &match_options.message_id {
                message.descriptor.message_id = id.clone();
            }
            if let Some(id) = &match_options.correlation_id {
                message.descriptor.correlation_id = id.clone();
            }
        }
        message
    }
}

/// Queue or topic object supplied by the client library
#[async_trait]
pub trait Destination: Send + Sync {
    async fn put(&self, message: RawMessage, options: &PutMessageOptions) -> ListenerResult<()>;

    /// Fill `template` with the next message that satisfies `options`
    ///
    /// Reports `MQRC_NO_MSG_AVAILABLE` as a transport error with that reason code when
    /// nothing matches.
    async fn get(
        &self,
        template: RawMessage,
        options: &GetMessageOptions,
    ) -> ListenerResult<RawMessage>;
}

#[derive(Clone)]
pub struct QueueEndpoint {
    name: String,
    destination: Arc<dyn Destination>,
}

impl QueueEndpoint {
    pub fn new(name: impl Into<String>, destination: Arc<dyn Destination>) -> Self {
        Self {
            name: name.into(),
            destination,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send(&self, envelope: &Envelope, options: &PutMessageOptions) -> ListenerResult<()> {
        let message = encode_envelope(envelope)?;
        debug!(
            queue = %self.name,
            bytes = message.data_length(),
            headers = envelope.header_count(),
            "Putting message"
        );
        self.destination.put(message, options).await
    }

    /// `Ok(None)` when no message is available
    pub async fn receive(&self, options: &GetMessageOptions) -> ListenerResult<Option<Envelope>> {
        match self.destination.get(options.template(), options).await {
            Ok(mut message) => Ok(Some(decode_envelope(&mut message)?)),
            Err(e) if e.is_no_message_available() => {
                debug!(queue = %self.name, "No message available");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for QueueEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEndpoint")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
