//! RFH2 field table values
//!
//! An RFH2 header carries its fields as markup inside folder strings. The in-memory
//! table keeps them as ordered `(folder, field, value)` triples so that repeated names
//! inside one folder survive decode untouched.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Typed value of one RFH2 field
///
/// The wire markup has no 64-bit integer or double precision slot on the encode path:
/// [`FieldValue::Long`] is written as a 32-bit value and [`FieldValue::Double`] as a
/// single precision float. [`FieldValue::normalized`] applies the same narrowing so that
/// callers can compare a table with its round-tripped form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum FieldValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Byte(i8),
    Bytes(Vec<u8>),
    Float(f32),
    Double(f64),
    String(String),
}

impl FieldValue {
    /// Value as it reads back after one encode/decode cycle
    ///
    /// Integers come back widened to `Long` after passing through a 32-bit slot,
    /// doubles come back as `Float`.
    pub fn normalized(&self) -> FieldValue {
        match self {
            FieldValue::Int(v) => FieldValue::Long(i64::from(*v)),
            FieldValue::Long(v) => FieldValue::Long(i64::from(*v as i32)),
            FieldValue::Double(v) => FieldValue::Float(*v as f32),
            other => other.clone(),
        }
    }

    /// Short type label used in logs and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "int",
            FieldValue::Long(_) => "long",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Byte(_) => "byte",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// One entry of an RFH2 field table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Rfh2Field {
    pub folder: String,
    pub field: String,
    pub value: FieldValue,
}

impl Rfh2Field {
    pub fn new(folder: impl Into<String>, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            folder: folder.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}
