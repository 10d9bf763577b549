//! Header chain cascade
//!
//! Headers are detected by content, never by the format names they announce. At every
//! position the structured kinds are tried in a fixed order (RFH2, RFH, CIH, IIH); after a
//! successful parse the cascade restarts from RFH2. When none of them matches, the
//! skippable kinds are tried and, on a match, discarded. The first position where nothing
//! matches is where the payload starts.
//!
//! ## Recognition
//!
//! A kind "matches" when its structure id (and version, for kinds that define one) is
//! present at the cursor. Everything before that point is non-fatal: a short buffer simply
//! means "no header here". Once a kind has matched, a structure that runs past the buffer is
//! [`ProtocolError::Truncated`] and impossible declared lengths are
//! [`ProtocolError::MalformedHeader`].

mod cih;
mod iih;
mod rfh;
mod rfh2;
mod skippable;

use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::{IntegerEncoding, WireReader, WireWriter};
use tracing::{debug, trace};
use types::{Header, HeaderKind, RawMessage};

pub use skippable::SKIPPABLE_KINDS;

/// Outcome of trying one kind at the cursor
#[derive(Debug, Clone, PartialEq)]
pub enum ParseAttempt<T> {
    Parsed(T),
    /// Id or version absent; the cursor is left where it was
    NoMatch,
}

/// Decoded chain plus where the payload begins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderChain {
    pub headers: Vec<Header>,
    /// Kinds recognized and discarded, in wire order
    pub skipped: Vec<HeaderKind>,
    pub payload_offset: usize,
}

type Decoder = fn(&mut WireReader<'_>) -> ProtocolResult<ParseAttempt<Header>>;

const STRUCTURED: [(HeaderKind, Decoder); 4] = [
    (HeaderKind::Rfh2, rfh2::try_decode),
    (HeaderKind::Rfh, rfh::try_decode),
    (HeaderKind::Cih, cih::try_decode),
    (HeaderKind::Iih, iih::try_decode),
];

/// Decode the chain of `buf` starting at `offset`
///
/// `encoding` is the descriptor encoding; it selects integer byte order for every header
/// in the chain.
pub fn decode_chain(buf: &[u8], offset: usize, encoding: i32) -> ProtocolResult<HeaderChain> {
    let mut reader = WireReader::new(buf, offset, IntegerEncoding::from_encoding(encoding));
    let mut chain = HeaderChain::default();

    'cascade: loop {
        let start = reader.position();

        for (kind, decode) in STRUCTURED.iter() {
            match decode(&mut reader)? {
                ParseAttempt::Parsed(header) => {
                    trace!(kind = %kind, offset = start, end = reader.position(), "Parsed header");
                    chain.headers.push(header);
                    continue 'cascade;
                }
                ParseAttempt::NoMatch => reader.seek(start),
            }
        }

        match skippable::try_skip(&mut reader)? {
            ParseAttempt::Parsed(kind) => {
                debug!(kind = %kind, offset = start, "Discarded header without structured form");
                chain.skipped.push(kind);
            }
            ParseAttempt::NoMatch => {
                reader.seek(start);
                break;
            }
        }
    }

    chain.payload_offset = reader.position();
    Ok(chain)
}

/// Decode the chain at the message cursor and leave the cursor at the payload
pub fn decode_headers(message: &mut RawMessage) -> ProtocolResult<HeaderChain> {
    let chain = decode_chain(
        message.data(),
        message.data_offset(),
        message.descriptor.encoding,
    )?;
    message.seek(chain.payload_offset)?;
    Ok(chain)
}

/// Serialize headers in order with the byte order of `encoding`
pub fn encode_headers(headers: &[Header], encoding: i32) -> ProtocolResult<Vec<u8>> {
    let mut writer = WireWriter::new(IntegerEncoding::from_encoding(encoding));
    for header in headers {
        match header {
            Header::Rfh2(h) => rfh2::encode(h, &mut writer)?,
            Header::Rfh(h) => rfh::encode(h, &mut writer)?,
            Header::Cih(h) => cih::encode(h, &mut writer)?,
            Header::Iih(h) => iih::encode(h, &mut writer)?,
            Header::Unsupported { header_kind } => {
                return Err(ProtocolError::UnsupportedHeaderKind { kind: *header_kind })
            }
        }
    }
    Ok(writer.into_bytes())
}

/// Common opening of every header: struc id plus optional version check
///
/// Returns `false` when the bytes are absent or differ, which callers report as
/// [`ParseAttempt::NoMatch`].
pub(crate) fn opens_with(reader: &WireReader<'_>, kind: HeaderKind, versions: &[i32]) -> bool {
    if reader.peek_bytes(0, 4) != Some(kind.struc_id().as_slice()) {
        return false;
    }
    if versions.is_empty() {
        return true;
    }
    matches!(reader.peek_i32(4), Some(v) if versions.contains(&v))
}

/// Ensure a recognized header of `length` bytes fits the remaining buffer
pub(crate) fn require_length(
    reader: &WireReader<'_>,
    kind: HeaderKind,
    length: usize,
) -> ProtocolResult<()> {
    if length > reader.remaining() {
        return Err(ProtocolError::truncated(
            length,
            reader.remaining(),
            reader.position(),
            kind.to_string(),
        ));
    }
    Ok(())
}
