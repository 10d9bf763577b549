//! Raw middleware message buffer
//!
//! [`RawMessage`] is what the transport hands over: a descriptor, a property store and a
//! data buffer with a read cursor. The header codec consumes it destructively by moving
//! the cursor past every header it recognizes.

use crate::constants::{
    MQAT_NO_CONTEXT, MQCCSI_Q_MGR, MQEI_UNLIMITED, MQENC_NATIVE, MQFMT_NONE, MQMT_DATAGRAM,
    MQPER_PERSISTENCE_AS_Q_DEF, MQPRI_PRIORITY_AS_Q_DEF,
};
use crate::errors::MessageError;
use crate::property::{NativeValue, PropertyDescriptor};
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressing and control fields of a message
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct MessageDescriptor {
    pub format: String,
    pub message_id: Vec<u8>,
    pub correlation_id: Vec<u8>,
    pub expiry: i32,
    pub priority: i32,
    pub persistence: i32,
    pub message_type: i32,
    pub put_application_type: i32,
    pub reply_to_queue_name: String,
    pub reply_to_queue_manager_name: String,
    pub encoding: i32,
    pub character_set: i32,
    pub accounting_token: Vec<u8>,
    pub user_id: String,
}

impl Default for MessageDescriptor {
    fn default() -> Self {
        Self {
            format: MQFMT_NONE.to_string(),
            message_id: Vec::new(),
            correlation_id: Vec::new(),
            expiry: MQEI_UNLIMITED,
            priority: MQPRI_PRIORITY_AS_Q_DEF,
            persistence: MQPER_PERSISTENCE_AS_Q_DEF,
            message_type: MQMT_DATAGRAM,
            put_application_type: MQAT_NO_CONTEXT,
            reply_to_queue_name: String::new(),
            reply_to_queue_manager_name: String::new(),
            encoding: MQENC_NATIVE,
            character_set: MQCCSI_Q_MGR,
            accounting_token: Vec::new(),
            user_id: String::new(),
        }
    }
}

/// A property held by the in-memory property store of a [`RawMessage`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StoredProperty {
    pub name: String,
    pub value: NativeValue,
    pub descriptor: PropertyDescriptor,
}

/// Opaque byte buffer with a cursor, as produced and consumed by the transport
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct RawMessage {
    pub descriptor: MessageDescriptor,
    data: Vec<u8>,
    cursor: usize,
    properties: Vec<StoredProperty>,
}

impl RawMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a received buffer; the cursor starts at the beginning of the data
    pub fn from_parts(descriptor: MessageDescriptor, data: Vec<u8>) -> Self {
        Self {
            descriptor,
            data,
            cursor: 0,
            properties: Vec::new(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn data_length(&self) -> usize {
        self.data.len()
    }

    /// Current cursor position
    pub fn data_offset(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), MessageError> {
        if offset > self.data.len() {
            return Err(MessageError::SeekOutOfBounds {
                offset,
                data_length: self.data.len(),
            });
        }
        self.cursor = offset;
        Ok(())
    }

    /// Read `len` bytes at the cursor and advance past them
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], MessageError> {
        if len > self.remaining() {
            return Err(MessageError::ReadPastEnd {
                requested: len,
                offset: self.cursor,
                remaining: self.remaining(),
            });
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.data[start..self.cursor])
    }

    /// Append bytes at the end of the data buffer
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn properties(&self) -> &[StoredProperty] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&StoredProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Insert or replace a property, keeping first-insertion order
    pub fn put_property(&mut self, property: StoredProperty) {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessage")
            .field("message_id", &hex::encode(&self.descriptor.message_id))
            .field("format", &self.descriptor.format)
            .field("data_length", &self.data.len())
            .field("cursor", &self.cursor)
            .field("properties", &self.properties.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_and_read_move_cursor() {
        let mut message = RawMessage::from_parts(MessageDescriptor::default(), b"abcdef".to_vec());
        assert_eq!(message.read_bytes(2).unwrap(), b"ab");
        assert_eq!(message.data_offset(), 2);
        message.seek(0).unwrap();
        assert_eq!(message.remaining(), 6);
    }

    #[test]
    fn test_seek_past_end_is_rejected() {
        let mut message = RawMessage::from_parts(MessageDescriptor::default(), vec![0; 4]);
        assert_eq!(
            message.seek(5),
            Err(MessageError::SeekOutOfBounds {
                offset: 5,
                data_length: 4
            })
        );
        assert!(message.seek(4).is_ok());
        assert_eq!(message.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_reports_remaining() {
        let mut message = RawMessage::from_parts(MessageDescriptor::default(), vec![1, 2, 3]);
        let err = message.read_bytes(4).unwrap_err();
        assert!(matches!(err, MessageError::ReadPastEnd { remaining: 3, .. }));
    }

    #[test]
    fn test_put_property_replaces_by_name() {
        let mut message = RawMessage::new();
        message.put_property(StoredProperty {
            name: "a".into(),
            value: NativeValue::Int(1),
            descriptor: PropertyDescriptor::default(),
        });
        message.put_property(StoredProperty {
            name: "b".into(),
            value: NativeValue::Bool(true),
            descriptor: PropertyDescriptor::default(),
        });
        message.put_property(StoredProperty {
            name: "a".into(),
            value: NativeValue::Int(2),
            descriptor: PropertyDescriptor::default(),
        });

        let names: Vec<_> = message.properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(message.property("a").unwrap().value, NativeValue::Int(2));
    }
}
