//! # mqlink Types Library
//!
//! Pure data structures shared by the codec and the listener pipeline.
//!
//! ## Design Philosophy
//!
//! - **Closed header set**: only RFH2, RFH, CIH and IIH have an in-memory form; every other
//!   recognized kind is a [`HeaderKind`] tag and nothing more
//! - **Tagged values**: RFH2 fields and message properties are sum types decided at
//!   construction time, never inspected through runtime type tests
//! - **No back-references**: an [`Envelope`] owns all of its data and never points back at the
//!   [`RawMessage`] it was decoded from
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → libs/codec → libs/messaging/listener
//!     ↑             ↓                  ↓
//! Envelope     Header chain       Dispatcher
//! RawMessage   Property codec     Lifecycle
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Wire encoding rules (belongs in `codec`)
//! - Transport traits or async runtime code (belongs in `listener`)

pub mod constants;
pub mod envelope;
pub mod errors;
pub mod field;
pub mod header;
pub mod property;
pub mod raw;

pub use envelope::Envelope;
pub use errors::MessageError;
pub use field::{FieldValue, Rfh2Field};
pub use header::{CihHeader, Header, HeaderKind, IihHeader, Rfh2Header, RfhHeader};
pub use property::{NativeValue, Property, PropertyDescriptor, PropertySet, PropertyValue};
pub use raw::{MessageDescriptor, RawMessage, StoredProperty};
