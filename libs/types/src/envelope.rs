//! Structured in-memory message

use crate::header::Header;
use crate::property::PropertySet;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// A message as applications see it
///
/// Every addressing field is optional on the send path (only present fields are applied to
/// the outgoing descriptor) and always populated by decode. `headers` and `properties` are
/// `None` after decode when the message carried none; an empty chain is never reported as
/// `Some(vec![])`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub headers: Option<Vec<Header>>,
    pub properties: Option<PropertySet>,
    pub format: Option<String>,
    pub message_id: Option<Vec<u8>>,
    pub correlation_id: Option<Vec<u8>>,
    pub expiry: Option<i32>,
    pub priority: Option<i32>,
    pub persistence: Option<i32>,
    pub message_type: Option<i32>,
    pub put_application_type: Option<i32>,
    pub reply_to_queue_name: Option<String>,
    pub reply_to_queue_manager_name: Option<String>,
    pub encoding: Option<i32>,
    pub character_set: Option<i32>,
    pub accounting_token: Option<Vec<u8>>,
    pub user_id: Option<String>,
}

impl Envelope {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.get_or_insert_with(Vec::new).push(header);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, property: crate::Property) -> Self {
        self.properties
            .get_or_insert_with(PropertySet::new)
            .insert(name.into(), property);
        self
    }

    pub fn header_count(&self) -> usize {
        self.headers.as_ref().map_or(0, Vec::len)
    }

    /// Payload interpreted as UTF-8, replacing invalid sequences
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
