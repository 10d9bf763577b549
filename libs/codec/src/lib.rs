//! # mqlink Codec
//!
//! ## Purpose
//!
//! Translates between the middleware's binary message form and the structured
//! [`Envelope`](types::Envelope):
//! - Header chain detection, decoding and encoding (RFH2, RFH, CIH, IIH)
//! - Recognition and skipping of every other known header kind
//! - RFH2 folder markup with a typed field table
//! - Typed property encode/decode through the [`PropertyStore`] seam
//! - Envelope assembly from chain, properties, payload and descriptor
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/messaging/listener
//!     ↑           ↓                ↓
//! RawMessage  Header chain     Dispatcher
//! Envelope    Properties       QueueEndpoint
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Data model definitions (belongs in libs/types)
//! - Transport, session or consumer handling (belongs in listener)
//! - Character set conversion beyond ASCII/UTF-8
//!
//! All functions are pure over their inputs and keep no shared state, so concurrent
//! dispatchers can call them without coordination.

pub mod envelope;
pub mod error;
mod folder;
pub mod headers;
pub mod property;
pub mod wire;

pub use envelope::{decode_envelope, encode_envelope};
pub use error::{ProtocolError, ProtocolResult};
pub use headers::{decode_chain, decode_headers, encode_headers, HeaderChain, ParseAttempt, SKIPPABLE_KINDS};
pub use property::{decode_properties, encode_properties, PropertyStore};
pub use wire::{IntegerEncoding, WireReader, WireWriter};
