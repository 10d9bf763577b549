//! Kinds that are recognized only so they can be stepped over

use super::{opens_with, require_length, ParseAttempt};
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::WireReader;
use types::HeaderKind;

/// Version field at offset 4 that must accompany the struc id
#[derive(Debug, Clone, Copy)]
enum Version {
    Binary(&'static [i32]),
    /// Character form used by the TMC2 layout
    Chars(&'static [u8; 4]),
}

/// How far to skip once the struc id and version matched
#[derive(Debug, Clone, Copy)]
enum Extent {
    /// Length selected by the version at offset 4
    ByVersion { v1: usize, v2: usize },
    /// StrucLength at offset 8
    Declared,
    Fixed(usize),
}

const V1: Version = Version::Binary(&[1]);

const RULES: [(HeaderKind, Version, Extent); 12] = [
    (HeaderKind::Md, Version::Binary(&[1, 2]), Extent::ByVersion { v1: 324, v2: 364 }),
    (HeaderKind::Mde, Version::Binary(&[2]), Extent::Declared),
    (HeaderKind::Rmh, V1, Extent::Declared),
    (HeaderKind::Saph, V1, Extent::Declared),
    (HeaderKind::Tm, V1, Extent::Fixed(684)),
    (HeaderKind::Tm2, V1, Extent::Fixed(732)),
    (HeaderKind::Tmc2, Version::Chars(b"   2"), Extent::Fixed(732)),
    (HeaderKind::Wih, V1, Extent::Declared),
    (HeaderKind::Xqh, V1, Extent::Fixed(428)),
    (HeaderKind::Dlh, V1, Extent::Fixed(172)),
    (HeaderKind::Dh, V1, Extent::Declared),
    (HeaderKind::Eph, V1, Extent::Declared),
];

fn recognized(reader: &WireReader<'_>, kind: HeaderKind, version: Version) -> bool {
    match version {
        Version::Binary(versions) => opens_with(reader, kind, versions),
        Version::Chars(expected) => {
            opens_with(reader, kind, &[]) && reader.peek_bytes(4, 4) == Some(expected.as_slice())
        }
    }
}

/// Kinds stepped over by the cascade, in the order they are tried
pub const SKIPPABLE_KINDS: [HeaderKind; 12] = [
    HeaderKind::Md,
    HeaderKind::Mde,
    HeaderKind::Rmh,
    HeaderKind::Saph,
    HeaderKind::Tm,
    HeaderKind::Tm2,
    HeaderKind::Tmc2,
    HeaderKind::Wih,
    HeaderKind::Xqh,
    HeaderKind::Dlh,
    HeaderKind::Dh,
    HeaderKind::Eph,
];

/// Step over one skippable header at the cursor
pub(crate) fn try_skip(reader: &mut WireReader<'_>) -> ProtocolResult<ParseAttempt<HeaderKind>> {
    for (kind, version, extent) in RULES {
        if !recognized(reader, kind, version) {
            continue;
        }
        let length = match extent {
            Extent::ByVersion { v1, v2 } => {
                if reader.peek_i32(4) == Some(1) {
                    v1
                } else {
                    v2
                }
            }
            Extent::Fixed(length) => length,
            Extent::Declared => {
                let declared = reader.peek_i32(8).ok_or_else(|| {
                    ProtocolError::truncated(12, reader.remaining(), reader.position(), kind.to_string())
                })?;
                if declared < 12 {
                    return Err(ProtocolError::malformed(
                        kind,
                        reader.position(),
                        format!("StrucLength {} is shorter than its own prefix", declared),
                    ));
                }
                declared as usize
            }
        };
        require_length(reader, kind, length)?;
        reader.skip(length, "skipped header")?;
        return Ok(ParseAttempt::Parsed(kind));
    }
    Ok(ParseAttempt::NoMatch)
}
