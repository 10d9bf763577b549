//! MQCIH: CICS bridge header, 164 bytes at version 1 and 180 at version 2

use super::{opens_with, require_length, ParseAttempt};
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::{WireReader, WireWriter};
use types::{CihHeader, Header, HeaderKind};

const LENGTH_V1: usize = 164;
const LENGTH_V2: usize = 180;

fn length_for(version: i32) -> Option<usize> {
    match version {
        1 => Some(LENGTH_V1),
        2 => Some(LENGTH_V2),
        _ => None,
    }
}

pub(crate) fn try_decode(reader: &mut WireReader<'_>) -> ProtocolResult<ParseAttempt<Header>> {
    if !opens_with(reader, HeaderKind::Cih, &[1, 2]) {
        return Ok(ParseAttempt::NoMatch);
    }
    let start = reader.position();
    let version = reader.peek_i32(4).unwrap_or_default();
    let Some(expected) = length_for(version) else {
        return Ok(ParseAttempt::NoMatch);
    };
    if let Some(declared) = reader.peek_i32(8) {
        if declared != expected as i32 {
            return Err(ProtocolError::malformed(
                HeaderKind::Cih,
                start,
                format!("version {} declares StrucLength {}, expected {}", version, declared, expected),
            ));
        }
    }
    require_length(reader, HeaderKind::Cih, expected)?;
    reader.skip(12, "MQCIH StrucId/Version/StrucLength")?;

    let mut header = CihHeader {
        version,
        encoding: reader.read_i32("MQCIH Encoding")?,
        coded_char_set_id: reader.read_i32("MQCIH CodedCharSetId")?,
        format: reader.read_chars(8, "MQCIH Format")?,
        flags: reader.read_i32("MQCIH Flags")?,
        return_code: reader.read_i32("MQCIH ReturnCode")?,
        comp_code: reader.read_i32("MQCIH CompCode")?,
        reason: reader.read_i32("MQCIH Reason")?,
        uow_control: reader.read_i32("MQCIH UOWControl")?,
        get_wait_interval: reader.read_i32("MQCIH GetWaitInterval")?,
        link_type: reader.read_i32("MQCIH LinkType")?,
        output_data_length: reader.read_i32("MQCIH OutputDataLength")?,
        facility_keep_time: reader.read_i32("MQCIH FacilityKeepTime")?,
        ads_descriptor: reader.read_i32("MQCIH ADSDescriptor")?,
        conversational_task: reader.read_i32("MQCIH ConversationalTask")?,
        task_end_status: reader.read_i32("MQCIH TaskEndStatus")?,
        facility: reader.read_array::<8>("MQCIH Facility")?,
        function: reader.read_chars(4, "MQCIH Function")?,
        abend_code: reader.read_chars(4, "MQCIH AbendCode")?,
        authenticator: reader.read_chars(8, "MQCIH Authenticator")?,
        reserved1: reader.read_chars(8, "MQCIH Reserved1")?,
        reply_to_format: reader.read_chars(8, "MQCIH ReplyToFormat")?,
        remote_sys_id: reader.read_chars(4, "MQCIH RemoteSysId")?,
        remote_trans_id: reader.read_chars(4, "MQCIH RemoteTransId")?,
        transaction_id: reader.read_chars(4, "MQCIH TransactionId")?,
        facility_like: reader.read_chars(4, "MQCIH FacilityLike")?,
        attention_id: reader.read_chars(4, "MQCIH AttentionId")?,
        start_code: reader.read_chars(4, "MQCIH StartCode")?,
        cancel_code: reader.read_chars(4, "MQCIH CancelCode")?,
        next_transaction_id: reader.read_chars(4, "MQCIH NextTransactionId")?,
        reserved2: reader.read_chars(8, "MQCIH Reserved2")?,
        reserved3: reader.read_chars(8, "MQCIH Reserved3")?,
        ..CihHeader::default()
    };
    if version == 2 {
        header.cursor_position = reader.read_i32("MQCIH CursorPosition")?;
        header.error_offset = reader.read_i32("MQCIH ErrorOffset")?;
        header.input_item = reader.read_i32("MQCIH InputItem")?;
        header.reserved4 = reader.read_i32("MQCIH Reserved4")?;
    }

    Ok(ParseAttempt::Parsed(Header::Cih(header)))
}

pub(crate) fn encode(header: &CihHeader, writer: &mut WireWriter) -> ProtocolResult<()> {
    let length = length_for(header.version).ok_or_else(|| {
        ProtocolError::malformed(
            HeaderKind::Cih,
            writer.len(),
            format!("version {} has no wire layout", header.version),
        )
    })?;

    writer.write_bytes(HeaderKind::Cih.struc_id());
    writer.write_i32(header.version);
    writer.write_i32(length as i32);
    writer.write_i32(header.encoding);
    writer.write_i32(header.coded_char_set_id);
    writer.write_chars(&header.format, 8, "MQCIH.Format")?;
    writer.write_i32(header.flags);
    for value in [
        header.return_code,
        header.comp_code,
        header.reason,
        header.uow_control,
        header.get_wait_interval,
        header.link_type,
        header.output_data_length,
        header.facility_keep_time,
        header.ads_descriptor,
        header.conversational_task,
        header.task_end_status,
    ] {
        writer.write_i32(value);
    }
    writer.write_bytes(&header.facility);
    writer.write_chars(&header.function, 4, "MQCIH.Function")?;
    writer.write_chars(&header.abend_code, 4, "MQCIH.AbendCode")?;
    writer.write_chars(&header.authenticator, 8, "MQCIH.Authenticator")?;
    writer.write_chars(&header.reserved1, 8, "MQCIH.Reserved1")?;
    writer.write_chars(&header.reply_to_format, 8, "MQCIH.ReplyToFormat")?;
    writer.write_chars(&header.remote_sys_id, 4, "MQCIH.RemoteSysId")?;
    writer.write_chars(&header.remote_trans_id, 4, "MQCIH.RemoteTransId")?;
    writer.write_chars(&header.transaction_id, 4, "MQCIH.TransactionId")?;
    writer.write_chars(&header.facility_like, 4, "MQCIH.FacilityLike")?;
    writer.write_chars(&header.attention_id, 4, "MQCIH.AttentionId")?;
    writer.write_chars(&header.start_code, 4, "MQCIH.StartCode")?;
    writer.write_chars(&header.cancel_code, 4, "MQCIH.CancelCode")?;
    writer.write_chars(&header.next_transaction_id, 4, "MQCIH.NextTransactionId")?;
    writer.write_chars(&header.reserved2, 8, "MQCIH.Reserved2")?;
    writer.write_chars(&header.reserved3, 8, "MQCIH.Reserved3")?;
    if header.version == 2 {
        writer.write_i32(header.cursor_position);
        writer.write_i32(header.error_offset);
        writer.write_i32(header.input_item);
        writer.write_i32(header.reserved4);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::IntegerEncoding;

    fn round_trip(header: &CihHeader) -> (usize, CihHeader) {
        let mut writer = WireWriter::new(IntegerEncoding::Reversed);
        encode(header, &mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = WireReader::new(&bytes, 0, IntegerEncoding::Reversed);
        match try_decode(&mut reader).unwrap() {
            ParseAttempt::Parsed(Header::Cih(h)) => (bytes.len(), h),
            other => panic!("expected MQCIH, got {:?}", other),
        }
    }

    #[test]
    fn test_version_two_layout() {
        let header = CihHeader {
            transaction_id: "TRN1".into(),
            facility: *b"\x01\x02\x03\x04\x05\x06\x07\x08",
            cursor_position: 42,
            ..CihHeader::default()
        };
        let (len, decoded) = round_trip(&header);
        assert_eq!(len, LENGTH_V2);
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_version_one_omits_trailing_fields() {
        let header = CihHeader {
            version: 1,
            function: "LINK".into(),
            ..CihHeader::default()
        };
        let (len, decoded) = round_trip(&header);
        assert_eq!(len, LENGTH_V1);
        assert_eq!(decoded.function, "LINK");
        assert_eq!(decoded.version, 1);
    }

    #[test]
    fn test_overlong_transaction_id_is_rejected() {
        let header = CihHeader {
            transaction_id: "TOOLONG".into(),
            ..CihHeader::default()
        };
        let mut writer = WireWriter::new(IntegerEncoding::Normal);
        assert!(matches!(
            encode(&header, &mut writer),
            Err(ProtocolError::FieldTooLong { field: "MQCIH.TransactionId", .. })
        ));
    }

    #[test]
    fn test_unknown_version_is_no_match() {
        let mut writer = WireWriter::new(IntegerEncoding::Normal);
        encode(&CihHeader::default(), &mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        bytes[4..8].copy_from_slice(&3i32.to_be_bytes());
        let mut reader = WireReader::new(&bytes, 0, IntegerEncoding::Normal);
        assert_eq!(try_decode(&mut reader).unwrap(), ParseAttempt::NoMatch);
    }

    #[test]
    fn test_truncated_body_is_error() {
        let mut writer = WireWriter::new(IntegerEncoding::Normal);
        encode(&CihHeader::default(), &mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = WireReader::new(&bytes[..100], 0, IntegerEncoding::Normal);
        assert!(matches!(
            try_decode(&mut reader),
            Err(ProtocolError::Truncated { need: 180, available: 100, .. })
        ));
    }
}
