//! Envelope assembly
//!
//! Glues the header chain, the property codec, the payload and the descriptor together.
//! Decode consumes the message cursor; encode builds a fresh [`RawMessage`].

use crate::error::ProtocolResult;
use crate::headers::{decode_headers, encode_headers};
use crate::property::{decode_properties, encode_properties};
use crate::wire::trim_padding;
use tracing::debug;
use types::constants::MQFMT_NONE;
use types::{Envelope, MessageDescriptor, RawMessage};

/// Decode a received message into an [`Envelope`]
///
/// Every addressing field is populated. `headers` and `properties` are `None` when the
/// message carried none.
pub fn decode_envelope(message: &mut RawMessage) -> ProtocolResult<Envelope> {
    let chain = decode_headers(message)?;
    let properties = decode_properties(message)?;
    let payload = message.read_bytes(message.remaining())?.to_vec();

    debug!(
        headers = chain.headers.len(),
        skipped = ?chain.skipped,
        properties = properties.len(),
        payload_len = payload.len(),
        "Decoded message"
    );

    let d = &message.descriptor;
    Ok(Envelope {
        payload,
        headers: (!chain.headers.is_empty()).then_some(chain.headers),
        properties: (!properties.is_empty()).then_some(properties),
        format: Some(trim_padding(&d.format).to_string()),
        message_id: Some(d.message_id.clone()),
        correlation_id: Some(d.correlation_id.clone()),
        expiry: Some(d.expiry),
        priority: Some(d.priority),
        persistence: Some(d.persistence),
        message_type: Some(d.message_type),
        put_application_type: Some(d.put_application_type),
        reply_to_queue_name: Some(trim_padding(&d.reply_to_queue_name).to_string()),
        reply_to_queue_manager_name: Some(trim_padding(&d.reply_to_queue_manager_name).to_string()),
        encoding: Some(d.encoding),
        character_set: Some(d.character_set),
        accounting_token: Some(d.accounting_token.clone()),
        user_id: Some(trim_padding(&d.user_id).to_string()),
    })
}

/// Build a message ready to be put
///
/// Descriptor fields are applied before the header chain is written so the chain uses the
/// declared integer encoding.
pub fn encode_envelope(envelope: &Envelope) -> ProtocolResult<RawMessage> {
    let mut message = RawMessage::new();

    if let Some(properties) = &envelope.properties {
        encode_properties(properties, &mut message)?;
    }
    apply_descriptor(envelope, &mut message.descriptor);

    if let Some(headers) = envelope.headers.as_deref().filter(|h| !h.is_empty()) {
        if envelope.format.is_none() {
            message.descriptor.format = headers[0]
                .kind()
                .format_name()
                .unwrap_or(MQFMT_NONE)
                .to_string();
        }
        let bytes = encode_headers(headers, message.descriptor.encoding)?;
        message.write(&bytes);
    }
    message.write(&envelope.payload);

    debug!(
        headers = envelope.header_count(),
        data_len = message.data_length(),
        format = %message.descriptor.format,
        "Encoded message"
    );
    Ok(message)
}

fn apply_descriptor(envelope: &Envelope, d: &mut MessageDescriptor) {
    if let Some(v) = &envelope.format {
        d.format = v.clone();
    }
    if let Some(v) = &envelope.message_id {
        d.message_id = v.clone();
    }
    if let Some(v) = &envelope.correlation_id {
        d.correlation_id = v.clone();
    }
    if let Some(v) = envelope.expiry {
        d.expiry = v;
    }
    if let Some(v) = envelope.priority {
        d.priority = v;
    }
    if let Some(v) = envelope.persistence {
        d.persistence = v;
    }
    if let Some(v) = envelope.message_type {
        d.message_type = v;
    }
    if let Some(v) = envelope.put_application_type {
        d.put_application_type = v;
    }
    if let Some(v) = &envelope.reply_to_queue_name {
        d.reply_to_queue_name = v.clone();
    }
    if let Some(v) = &envelope.reply_to_queue_manager_name {
        d.reply_to_queue_manager_name = v.clone();
    }
    if let Some(v) = envelope.encoding {
        d.encoding = v;
    }
    if let Some(v) = envelope.character_set {
        d.character_set = v;
    }
    if let Some(v) = &envelope.accounting_token {
        d.accounting_token = v.clone();
    }
    if let Some(v) = &envelope.user_id {
        d.user_id = v.clone();
    }
}
