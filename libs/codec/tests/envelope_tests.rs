//! End-to-end envelope encode/decode tests

use codec::{decode_envelope, encode_envelope, ProtocolError};
use proptest::prelude::*;
use types::constants::{MQENC_REVERSED, MQFMT_RF_HEADER_2, MQFMT_STRING};
use types::{
    CihHeader, Envelope, FieldValue, Header, HeaderKind, IihHeader, MessageDescriptor, Property,
    PropertyDescriptor, PropertyValue, RawMessage, Rfh2Field, Rfh2Header, RfhHeader,
};

fn fully_populated() -> Envelope {
    Envelope {
        payload: b"{\"order\":42}".to_vec(),
        headers: Some(vec![
            Header::Rfh2(
                Rfh2Header::new()
                    .with_folder("<mcd><Msd>jms_text</Msd></mcd>")
                    .with_field(Rfh2Field::new("mcd", "Msd", "jms_text"))
                    .with_field(Rfh2Field::new("usr", "count", FieldValue::Int(12)))
                    .with_field(Rfh2Field::new("usr", "ratio", FieldValue::Double(0.25)))
                    .with_field(Rfh2Field::new("usr", "ok", true)),
            ),
            Header::Rfh(RfhHeader::new().with_pair("OPT_APP_GRP", "Group A")),
            Header::Cih(CihHeader {
                function: "LINK".into(),
                transaction_id: "TX01".into(),
                ..CihHeader::default()
            }),
            Header::Iih(IihHeader {
                l_term_override: "LTERM1".into(),
                ..IihHeader::default()
            }),
        ]),
        properties: None,
        format: Some(MQFMT_RF_HEADER_2.to_string()),
        message_id: Some(vec![0xAB; 24]),
        correlation_id: Some(b"corr-0001".to_vec()),
        expiry: Some(6000),
        priority: Some(4),
        persistence: Some(1),
        message_type: Some(1),
        put_application_type: Some(28),
        reply_to_queue_name: Some("REPLY.Q".into()),
        reply_to_queue_manager_name: Some("QM1".into()),
        encoding: Some(MQENC_REVERSED),
        character_set: Some(1208),
        accounting_token: Some(vec![1, 2, 3]),
        user_id: Some("app".into()),
    }
    .with_property("retries", Property::new(3i64))
    .with_property(
        "audit",
        Property::new(true).with_descriptor(PropertyDescriptor {
            context: 1,
            ..PropertyDescriptor::default()
        }),
    )
}

/// What a decode of `envelope` should produce: RFH2 fields as read back from the wire
fn normalized(mut envelope: Envelope) -> Envelope {
    for header in envelope.headers.iter_mut().flatten() {
        if let Header::Rfh2(rfh2) = header {
            for field in rfh2.fields.iter_mut() {
                field.value = field.value.normalized();
            }
            rfh2.folder_strings = vec![
                "<mcd><Msd>jms_text</Msd></mcd>".into(),
                "<usr><count dt='i4'>12</count><ratio dt='r4'>0.25</ratio><ok dt='boolean'>1</ok></usr>"
                    .into(),
            ];
        }
    }
    envelope
}

#[test]
fn test_full_round_trip() {
    let envelope = fully_populated();
    let mut message = encode_envelope(&envelope).expect("encode");
    let decoded = decode_envelope(&mut message).expect("decode");
    assert_eq!(decoded, normalized(envelope));
}

#[test]
fn test_decode_populates_every_addressing_field() {
    let descriptor = MessageDescriptor {
        format: "MQSTR   ".into(),
        reply_to_queue_name: "REPLY.Q                                         ".into(),
        user_id: "app         ".into(),
        ..MessageDescriptor::default()
    };
    let mut message = RawMessage::from_parts(descriptor, b"text".to_vec());
    let decoded = decode_envelope(&mut message).unwrap();

    assert_eq!(decoded.format.as_deref(), Some(MQFMT_STRING));
    assert_eq!(decoded.reply_to_queue_name.as_deref(), Some("REPLY.Q"));
    assert_eq!(decoded.reply_to_queue_manager_name.as_deref(), Some(""));
    assert_eq!(decoded.user_id.as_deref(), Some("app"));
    assert_eq!(decoded.correlation_id, Some(Vec::new()));
    assert_eq!(decoded.accounting_token, Some(Vec::new()));
    assert_eq!(decoded.expiry, Some(-1));
    assert_eq!(decoded.payload, b"text");
}

#[test]
fn test_unsupported_header_fails_encode() {
    let envelope = Envelope::new("x").with_header(Header::Unsupported {
        header_kind: HeaderKind::Xqh,
    });
    let err = encode_envelope(&envelope).unwrap_err();
    assert_eq!(err, ProtocolError::UnsupportedHeaderKind { kind: HeaderKind::Xqh });
    assert!(err.is_encode_side());
}

#[test]
fn test_overlong_header_format_fails_encode() {
    let envelope = Envelope::new("x").with_header(Header::Rfh2(Rfh2Header {
        format: "MQSTRING-TOO-LONG".into(),
        ..Rfh2Header::default()
    }));
    assert!(matches!(
        encode_envelope(&envelope),
        Err(ProtocolError::FieldTooLong { field: "MQRFH2.Format", .. })
    ));
}

#[test]
fn test_truncated_chain_fails_decode() {
    let envelope = Envelope::new("").with_header(Header::Cih(CihHeader::default()));
    let message = encode_envelope(&envelope).unwrap();
    let descriptor = message.descriptor.clone();
    let mut data = message.into_data();
    data.truncate(100);

    let mut damaged = RawMessage::from_parts(descriptor, data);
    assert!(matches!(
        decode_envelope(&mut damaged),
        Err(ProtocolError::Truncated { .. })
    ));
}

proptest! {
    #[test]
    fn prop_int_property_widens_without_loss(value in any::<i32>()) {
        let envelope = Envelope::new("p").with_property("n", Property::new(i64::from(value)));
        let mut message = encode_envelope(&envelope).unwrap();
        let decoded = decode_envelope(&mut message).unwrap();
        let properties = decoded.properties.unwrap();
        prop_assert_eq!(&properties["n"].value, &PropertyValue::Int(i64::from(value)));
    }

    #[test]
    fn prop_payload_survives_any_chain(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let envelope = Envelope::new(payload.clone())
            .with_header(Header::Rfh2(Rfh2Header::new().with_field(Rfh2Field::new("usr", "k", "v"))));
        let mut message = encode_envelope(&envelope).unwrap();
        let decoded = decode_envelope(&mut message).unwrap();
        prop_assert_eq!(&decoded.payload, &payload);
        prop_assert_eq!(decoded.header_count(), 1);
    }
}
