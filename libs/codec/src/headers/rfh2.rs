//! MQRFH2: 36 fixed bytes followed by length-prefixed folders
//!
//! ```text
//! StrucId "RFH " | Version 2 | StrucLength | Encoding | CodedCharSetId | Format[8]
//! Flags | NameValueCCSID | (NameValueLength, NameValueData padded to 4)*
//! ```
//!
//! On encode the field table is overlaid onto the folder strings: a folder is re-rendered
//! only when a field changed or was added, otherwise its original markup is written back
//! byte for byte.

use super::{opens_with, require_length, ParseAttempt};
use crate::error::{ProtocolError, ProtocolResult};
use crate::folder::{self, Element, FolderError};
use crate::wire::{trim_padding, WireReader, WireWriter};
use std::collections::HashMap;
use types::{Header, HeaderKind, Rfh2Field, Rfh2Header};

pub(crate) const FIXED_LENGTH: usize = 36;
const VERSION: i32 = 2;

pub(crate) fn try_decode(reader: &mut WireReader<'_>) -> ProtocolResult<ParseAttempt<Header>> {
    if !opens_with(reader, HeaderKind::Rfh2, &[VERSION]) {
        return Ok(ParseAttempt::NoMatch);
    }
    let start = reader.position();
    require_length(reader, HeaderKind::Rfh2, FIXED_LENGTH)?;

    reader.skip(8, "MQRFH2 StrucId/Version")?;
    let struc_length = reader.read_i32("MQRFH2 StrucLength")?;
    if struc_length < FIXED_LENGTH as i32 || struc_length % 4 != 0 {
        return Err(ProtocolError::malformed(
            HeaderKind::Rfh2,
            start,
            format!("StrucLength {} is not a multiple of 4 of at least {}", struc_length, FIXED_LENGTH),
        ));
    }
    let struc_length = struc_length as usize;
    let end = start + struc_length;
    if end > start + reader.remaining() + 12 {
        return Err(ProtocolError::truncated(
            struc_length,
            reader.remaining() + 12,
            start,
            "MQRFH2",
        ));
    }

    let encoding = reader.read_i32("MQRFH2 Encoding")?;
    let coded_char_set_id = reader.read_i32("MQRFH2 CodedCharSetId")?;
    let format = reader.read_chars(8, "MQRFH2 Format")?;
    let flags = reader.read_i32("MQRFH2 Flags")?;
    let name_value_ccsid = reader.read_i32("MQRFH2 NameValueCCSID")?;

    let mut folder_strings = Vec::new();
    let mut fields = Vec::new();
    while reader.position() < end {
        let at = reader.position();
        if end - at < 4 {
            return Err(ProtocolError::malformed(
                HeaderKind::Rfh2,
                at,
                "folder length prefix crosses StrucLength",
            ));
        }
        let length = reader.read_i32("MQRFH2 NameValueLength")?;
        if length < 0 || reader.position() + length as usize > end {
            return Err(ProtocolError::malformed(
                HeaderKind::Rfh2,
                at,
                format!("NameValueLength {} overruns StrucLength {}", length, struc_length),
            ));
        }
        let data = reader.read_bytes(length as usize, "MQRFH2 NameValueData")?;
        let text = std::str::from_utf8(data).map_err(|e| {
            ProtocolError::malformed(HeaderKind::Rfh2, at, format!("folder is not UTF-8: {}", e))
        })?;
        let folder_string = trim_padding(text).to_string();
        fields.extend(folder::folder_fields(&folder_string).map_err(|e| match e {
            FolderError::Markup(reason) => ProtocolError::malformed(HeaderKind::Rfh2, at, reason),
            FolderError::Value(err) => err,
        })?);
        folder_strings.push(folder_string);
    }

    Ok(ParseAttempt::Parsed(Header::Rfh2(Rfh2Header {
        flags,
        encoding,
        coded_char_set_id,
        format,
        name_value_ccsid,
        folder_strings,
        fields,
    })))
}

pub(crate) fn encode(header: &Rfh2Header, writer: &mut WireWriter) -> ProtocolResult<()> {
    let folders = overlay_fields(&header.folder_strings, &header.fields)?;

    let start = writer.len();
    writer.write_bytes(HeaderKind::Rfh2.struc_id());
    writer.write_i32(VERSION);
    writer.write_i32(0);
    writer.write_i32(header.encoding);
    writer.write_i32(header.coded_char_set_id);
    writer.write_chars(&header.format, 8, "MQRFH2.Format")?;
    writer.write_i32(header.flags);
    writer.write_i32(header.name_value_ccsid);

    for folder_string in folders {
        let mut data = folder_string.into_bytes();
        let padded = data.len().div_ceil(4) * 4;
        data.resize(padded, b' ');
        writer.write_i32(data.len() as i32);
        writer.write_bytes(&data);
    }

    writer.patch_i32(start + 8, (writer.len() - start) as i32);
    Ok(())
}

struct FolderSlot {
    original: String,
    root: Option<Element>,
    dirty: bool,
}

/// Merge the field table into the folder strings
///
/// Fields are matched to leaves by folder name, field name and occurrence index. A leaf is
/// rewritten only when its decoded value differs from the field's normalized value; missing
/// leaves are appended and missing folders are created after the existing ones.
pub(crate) fn overlay_fields(
    folder_strings: &[String],
    fields: &[Rfh2Field],
) -> ProtocolResult<Vec<String>> {
    let mut slots = Vec::with_capacity(folder_strings.len());
    for original in folder_strings {
        let markup = trim_padding(original);
        let root = if markup.trim().is_empty() {
            None
        } else {
            Some(folder::parse_folder(markup).map_err(|reason| {
                ProtocolError::malformed(HeaderKind::Rfh2, 0, format!("folder {:?}: {}", markup, reason))
            })?)
        };
        slots.push(FolderSlot {
            original: original.clone(),
            root,
            dirty: false,
        });
    }

    let mut occurrences: HashMap<(&str, &str), usize> = HashMap::new();
    for field in fields {
        let counter = occurrences
            .entry((field.folder.as_str(), field.field.as_str()))
            .or_insert(0);
        let occurrence = *counter;
        *counter += 1;

        let index = match slots
            .iter()
            .position(|s| s.root.as_ref().is_some_and(|r| r.name == field.folder))
        {
            Some(index) => index,
            None => {
                slots.push(FolderSlot {
                    original: String::new(),
                    root: Some(Element::group(&field.folder)),
                    dirty: true,
                });
                slots.len() - 1
            }
        };
        let slot = &mut slots[index];
        let Some(root) = slot.root.as_mut() else {
            continue;
        };

        let (data_type, text) = folder::wire_form(&field.value);
        match root.nth_leaf_mut(&field.field, occurrence) {
            Some(leaf) => {
                if folder::decode_value(&field.folder, leaf)? != field.value.normalized() {
                    leaf.set_value(data_type, text);
                    slot.dirty = true;
                }
            }
            None => {
                root.push_child(Element::leaf(&field.field, data_type, text))
                    .map_err(|reason| ProtocolError::malformed(HeaderKind::Rfh2, 0, reason))?;
                slot.dirty = true;
            }
        }
    }

    Ok(slots
        .into_iter()
        .map(|slot| match (slot.dirty, slot.root) {
            (true, Some(root)) => root.render(),
            _ => slot.original,
        })
        .collect())
}
