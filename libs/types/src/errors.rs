//! Error types for raw message buffer access

use thiserror::Error;

/// Errors raised by [`RawMessage`](crate::RawMessage) cursor operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MessageError {
    /// Seek target lies beyond the end of the data buffer
    #[error("Seek to offset {offset} is outside the message data ({data_length} bytes)")]
    SeekOutOfBounds { offset: usize, data_length: usize },

    /// Sequential read requested more bytes than remain after the cursor
    #[error("Read of {requested} bytes at offset {offset} exceeds the {remaining} remaining bytes")]
    ReadPastEnd {
        requested: usize,
        offset: usize,
        remaining: usize,
    },
}
