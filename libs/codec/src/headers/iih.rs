//! MQIIH: IMS information header, fixed 84 bytes

use super::{opens_with, require_length, ParseAttempt};
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::{WireReader, WireWriter};
use types::{Header, HeaderKind, IihHeader};

const LENGTH: usize = 84;
const VERSION: i32 = 1;

pub(crate) fn try_decode(reader: &mut WireReader<'_>) -> ProtocolResult<ParseAttempt<Header>> {
    if !opens_with(reader, HeaderKind::Iih, &[VERSION]) {
        return Ok(ParseAttempt::NoMatch);
    }
    let start = reader.position();
    if let Some(declared) = reader.peek_i32(8) {
        if declared != LENGTH as i32 {
            return Err(ProtocolError::malformed(
                HeaderKind::Iih,
                start,
                format!("StrucLength {} (expected {})", declared, LENGTH),
            ));
        }
    }
    require_length(reader, HeaderKind::Iih, LENGTH)?;
    reader.skip(12, "MQIIH StrucId/Version/StrucLength")?;

    let header = IihHeader {
        encoding: reader.read_i32("MQIIH Encoding")?,
        coded_char_set_id: reader.read_i32("MQIIH CodedCharSetId")?,
        format: reader.read_chars(8, "MQIIH Format")?,
        flags: reader.read_i32("MQIIH Flags")?,
        l_term_override: reader.read_chars(8, "MQIIH LTermOverride")?,
        mfs_map_name: reader.read_chars(8, "MQIIH MFSMapName")?,
        reply_to_format: reader.read_chars(8, "MQIIH ReplyToFormat")?,
        authenticator: reader.read_chars(8, "MQIIH Authenticator")?,
        tran_instance_id: reader.read_array::<16>("MQIIH TranInstanceId")?,
        tran_state: reader.read_char("MQIIH TranState")?,
        commit_mode: reader.read_char("MQIIH CommitMode")?,
        security_scope: reader.read_char("MQIIH SecurityScope")?,
        reserved: reader.read_char("MQIIH Reserved")?,
    };
    Ok(ParseAttempt::Parsed(Header::Iih(header)))
}

pub(crate) fn encode(header: &IihHeader, writer: &mut WireWriter) -> ProtocolResult<()> {
    writer.write_bytes(HeaderKind::Iih.struc_id());
    writer.write_i32(VERSION);
    writer.write_i32(LENGTH as i32);
    writer.write_i32(header.encoding);
    writer.write_i32(header.coded_char_set_id);
    writer.write_chars(&header.format, 8, "MQIIH.Format")?;
    writer.write_i32(header.flags);
    writer.write_chars(&header.l_term_override, 8, "MQIIH.LTermOverride")?;
    writer.write_chars(&header.mfs_map_name, 8, "MQIIH.MFSMapName")?;
    writer.write_chars(&header.reply_to_format, 8, "MQIIH.ReplyToFormat")?;
    writer.write_chars(&header.authenticator, 8, "MQIIH.Authenticator")?;
    writer.write_bytes(&header.tran_instance_id);
    writer.write_char(header.tran_state, "MQIIH.TranState")?;
    writer.write_char(header.commit_mode, "MQIIH.CommitMode")?;
    writer.write_char(header.security_scope, "MQIIH.SecurityScope")?;
    writer.write_char(header.reserved, "MQIIH.Reserved")?;
    Ok(())
}
