//! MQRFH version 1: 32 fixed bytes and a blank-separated NameValueString

use super::{opens_with, require_length, ParseAttempt};
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::{trim_padding, WireReader, WireWriter};
use types::constants::MQENC_NATIVE;
use types::{Header, HeaderKind, RfhHeader};

const FIXED_LENGTH: usize = 32;
const VERSION: i32 = 1;

pub(crate) fn try_decode(reader: &mut WireReader<'_>) -> ProtocolResult<ParseAttempt<Header>> {
    if !opens_with(reader, HeaderKind::Rfh, &[VERSION]) {
        return Ok(ParseAttempt::NoMatch);
    }
    let start = reader.position();
    require_length(reader, HeaderKind::Rfh, FIXED_LENGTH)?;

    reader.skip(8, "MQRFH StrucId/Version")?;
    let struc_length = reader.read_i32("MQRFH StrucLength")?;
    if struc_length < FIXED_LENGTH as i32 {
        return Err(ProtocolError::malformed(
            HeaderKind::Rfh,
            start,
            format!("StrucLength {} is below {}", struc_length, FIXED_LENGTH),
        ));
    }
    let struc_length = struc_length as usize;
    if struc_length > reader.remaining() + 12 {
        return Err(ProtocolError::truncated(
            struc_length,
            reader.remaining() + 12,
            start,
            "MQRFH",
        ));
    }

    let encoding = reader.read_i32("MQRFH Encoding")?;
    let coded_char_set_id = reader.read_i32("MQRFH CodedCharSetId")?;
    let format = reader.read_chars(8, "MQRFH Format")?;
    let flags = reader.read_i32("MQRFH Flags")?;

    let data = reader.read_bytes(struc_length - FIXED_LENGTH, "MQRFH NameValueString")?;
    let text = std::str::from_utf8(data).map_err(|e| {
        ProtocolError::malformed(HeaderKind::Rfh, start, format!("NameValueString is not UTF-8: {}", e))
    })?;
    let name_value_pairs = parse_name_values(trim_padding(text))
        .map_err(|reason| ProtocolError::malformed(HeaderKind::Rfh, start, reason))?;

    Ok(ParseAttempt::Parsed(Header::Rfh(RfhHeader {
        flags,
        encoding,
        coded_char_set_id,
        format,
        name_value_pairs,
    })))
}

pub(crate) fn encode(header: &RfhHeader, writer: &mut WireWriter) -> ProtocolResult<()> {
    let mut name_values = render_name_values(&header.name_value_pairs).into_bytes();
    let padded = name_values.len().div_ceil(4) * 4;
    name_values.resize(padded, b' ');

    let encoding = if header.encoding == 0 {
        MQENC_NATIVE
    } else {
        header.encoding
    };

    writer.write_bytes(HeaderKind::Rfh.struc_id());
    writer.write_i32(VERSION);
    writer.write_i32((FIXED_LENGTH + name_values.len()) as i32);
    writer.write_i32(encoding);
    writer.write_i32(header.coded_char_set_id);
    writer.write_chars(&header.format, 8, "MQRFH.Format")?;
    writer.write_i32(header.flags);
    writer.write_bytes(&name_values);
    Ok(())
}

/// Split a NameValueString into pairs
///
/// Tokens are blank separated; a token containing blanks is wrapped in double quotes and a
/// literal quote inside it is doubled.
fn parse_name_values(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    loop {
        while chars.next_if(|c| *c == ' ').is_some() {}
        let Some(first) = chars.next() else {
            break;
        };
        let mut token = String::new();
        if first == '"' {
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        token.push('"');
                    }
                    Some('"') => break,
                    Some(c) => token.push(c),
                    None => return Err(format!("unterminated quoted token {:?}", token)),
                }
            }
        } else {
            token.push(first);
            while let Some(c) = chars.next_if(|c| *c != ' ') {
                token.push(c);
            }
        }
        tokens.push(token);
    }

    if tokens.len() % 2 != 0 {
        return Err(format!("name {:?} has no value", tokens[tokens.len() - 1]));
    }
    Ok(tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn render_name_values(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .flat_map(|(name, value)| [quote(name), quote(value)])
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(token: &str) -> String {
    if token.is_empty() || token.contains([' ', '"']) {
        format!("\"{}\"", token.replace('"', "\"\""))
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::IntegerEncoding;

    #[test]
    fn test_name_values_with_quoting() {
        let pairs = parse_name_values(r#"OPT_APP_GRP "My group" note "say ""hi"""  "#).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("OPT_APP_GRP".to_string(), "My group".to_string()),
                ("note".to_string(), "say \"hi\"".to_string()),
            ]
        );
        assert_eq!(
            render_name_values(&pairs),
            r#"OPT_APP_GRP "My group" note "say ""hi""""#
        );
    }

    #[test]
    fn test_dangling_name_is_rejected() {
        assert!(parse_name_values("a b c").is_err());
        assert!(parse_name_values("a \"open").is_err());
        assert!(parse_name_values("").unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_pads_to_four() {
        let header = RfhHeader::new().with_pair("k", "v").with_pair("empty", "");
        let mut writer = WireWriter::new(IntegerEncoding::Normal);
        encode(&header, &mut writer).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len() % 4, 0);

        let mut reader = WireReader::new(&bytes, 0, IntegerEncoding::Normal);
        let ParseAttempt::Parsed(Header::Rfh(decoded)) = try_decode(&mut reader).unwrap() else {
            panic!("expected MQRFH");
        };
        assert_eq!(decoded, header);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_zero_encoding_is_written_as_native() {
        let header = RfhHeader {
            encoding: 0,
            ..RfhHeader::default()
        };
        let mut writer = WireWriter::new(IntegerEncoding::Normal);
        encode(&header, &mut writer).unwrap();
        assert_eq!(&writer.into_bytes()[12..16], &MQENC_NATIVE.to_be_bytes());
    }
}
