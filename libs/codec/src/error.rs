//! Protocol-level errors for header chain and envelope processing
//!
//! Every variant carries enough context (header kind, byte offset, field name) to locate the
//! offending bytes in a captured message dump. "No header here" is never an error: the
//! cascade reports it as a non-match and moves on.

use thiserror::Error;
use types::{HeaderKind, MessageError};

/// Codec errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// A recognized structure runs past the end of the buffer
    #[error("Truncated {context}: need {need} bytes at offset {offset}, buffer has {available}")]
    Truncated {
        need: usize,
        available: usize,
        offset: usize,
        context: String,
    },

    /// A recognized header carries data that cannot be interpreted
    #[error("Malformed {kind} header at offset {offset}: {reason}")]
    MalformedHeader {
        kind: HeaderKind,
        offset: usize,
        reason: String,
    },

    /// Encode was asked to serialize a kind with no in-memory representation
    #[error("Unsupported header kind {kind}: only MQRFH2, MQRFH, MQCIH and MQIIH can be encoded")]
    UnsupportedHeaderKind { kind: HeaderKind },

    /// Character data longer than its fixed-width wire field
    #[error("Field {field} is {actual} bytes, wire slot holds {max}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// An RFH2 field value that does not parse as its declared type
    #[error("Invalid value {value:?} for {folder}.{field} (dt: {data_type})")]
    InvalidFieldValue {
        folder: String,
        field: String,
        data_type: String,
        value: String,
    },

    /// Property store rejected a read or write
    #[error("Property {name}: {reason}")]
    InvalidProperty { name: String, reason: String },

    /// Raw buffer cursor misuse
    #[error("Message buffer error: {0}")]
    Message(#[from] MessageError),
}

impl ProtocolError {
    pub fn truncated(need: usize, available: usize, offset: usize, context: impl Into<String>) -> Self {
        Self::Truncated {
            need,
            available,
            offset,
            context: context.into(),
        }
    }

    pub fn malformed(kind: HeaderKind, offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            kind,
            offset,
            reason: reason.into(),
        }
    }

    pub fn invalid_field_value(
        folder: impl Into<String>,
        field: impl Into<String>,
        data_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidFieldValue {
            folder: folder.into(),
            field: field.into(),
            data_type: data_type.into(),
            value: value.into(),
        }
    }

    pub fn invalid_property(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Errors caused by the caller's input rather than by the bytes on the wire
    pub fn is_encode_side(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnsupportedHeaderKind { .. } | ProtocolError::FieldTooLong { .. }
        )
    }
}

/// Result type for codec operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_display_names_offset() {
        let err = ProtocolError::truncated(36, 20, 8, "MQRFH2 fixed part");
        let text = err.to_string();
        assert!(text.contains("need 36 bytes"));
        assert!(text.contains("offset 8"));
        assert!(text.contains("buffer has 20"));
    }

    #[test]
    fn test_unsupported_kind_is_encode_side() {
        let err = ProtocolError::UnsupportedHeaderKind {
            kind: HeaderKind::Xqh,
        };
        assert!(err.is_encode_side());
        assert!(err.to_string().contains("MQXQH"));
        assert!(!ProtocolError::malformed(HeaderKind::Cih, 0, "bad").is_encode_side());
    }
}
