//! Typed message properties
//!
//! Properties travel beside the payload, independent of the header chain. Each value is a
//! [`PropertyValue`] variant fixed when the property is built; the client library's own
//! representation is modelled by [`NativeValue`].

use crate::constants::{
    MQCOPY_DEFAULT, MQPD_NONE, MQPD_NO_CONTEXT, MQPD_SUPPORT_OPTIONAL, MQPD_VERSION_1,
};
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Controls how the client library stores and propagates a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PropertyDescriptor {
    pub version: i32,
    pub copy_options: i32,
    pub options: i32,
    pub support: i32,
    pub context: i32,
}

impl Default for PropertyDescriptor {
    fn default() -> Self {
        Self {
            version: MQPD_VERSION_1,
            copy_options: MQCOPY_DEFAULT,
            options: MQPD_NONE,
            support: MQPD_SUPPORT_OPTIONAL,
            context: MQPD_NO_CONTEXT,
        }
    }
}

/// Property value as stored by the client library
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum NativeValue {
    Int(i32),
    Short(i16),
    Long(i64),
    Bool(bool),
    Byte(i8),
    Bytes(Vec<u8>),
    Float(f32),
    Double(f64),
    String(String),
    Char(char),
}

/// Property value as seen by applications
///
/// Integers are always 64-bit here; 32-bit native values widen on decode and narrow on
/// encode. Native values with no matching variant are carried as [`PropertyValue::Opaque`]
/// and are not written back.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    Byte(i8),
    Bytes(Vec<u8>),
    Float(f32),
    Double(f64),
    String(String),
    Opaque(NativeValue),
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

/// A property value with its optional descriptor
///
/// An absent descriptor means the library default ([`PropertyDescriptor::default`]).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Property {
    pub value: PropertyValue,
    #[cfg_attr(feature = "serialization", serde(default, skip_serializing_if = "Option::is_none"))]
    pub descriptor: Option<PropertyDescriptor>,
}

impl Property {
    pub fn new(value: impl Into<PropertyValue>) -> Self {
        Self {
            value: value.into(),
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: PropertyDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Descriptor to hand to the client library
    pub fn effective_descriptor(&self) -> PropertyDescriptor {
        self.descriptor.unwrap_or_default()
    }
}

/// Properties keyed by unique name
pub type PropertySet = BTreeMap<String, Property>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_descriptor_uses_default() {
        let property = Property::new(5i64);
        assert_eq!(property.effective_descriptor(), PropertyDescriptor::default());
        assert_eq!(property.effective_descriptor().copy_options, 22);
    }

    #[test]
    fn test_explicit_descriptor_wins() {
        let descriptor = PropertyDescriptor {
            context: 1,
            ..PropertyDescriptor::default()
        };
        let property = Property::new("x").with_descriptor(descriptor);
        assert_eq!(property.effective_descriptor().context, 1);
    }
}
