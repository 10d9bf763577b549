use anyhow::{Context, Result};
use codec::{decode_chain, decode_envelope, encode_envelope};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use types::{Envelope, MessageDescriptor, RawMessage, StoredProperty};

/// What `decode` prints
#[derive(Debug, Serialize)]
pub struct DecodeReport {
    pub envelope: Envelope,
    /// Header kinds that were recognized and discarded, in wire order
    pub skipped_headers: Vec<String>,
    pub payload_offset: usize,
}

/// Descriptor and properties of an encoded message, kept beside its data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub descriptor: MessageDescriptor,
    #[serde(default)]
    pub properties: Vec<StoredProperty>,
}

impl Sidecar {
    pub fn of(message: &RawMessage) -> Self {
        Self {
            descriptor: message.descriptor.clone(),
            properties: message.properties().to_vec(),
        }
    }

    /// Rebuild the message `encode` produced from its data and this sidecar
    pub fn into_message(self, data: Vec<u8>) -> RawMessage {
        let mut message = RawMessage::from_parts(self.descriptor, data);
        for property in self.properties {
            message.put_property(property);
        }
        message
    }
}

/// `message.bin` → `message.bin.descriptor.json`
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".descriptor.json");
    PathBuf::from(name)
}

pub fn write_sidecar(path: &Path, sidecar: &Sidecar) -> Result<()> {
    let json = serde_json::to_string_pretty(sidecar).context("Failed to render descriptor")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_sidecar(path: &Path) -> Result<Sidecar> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid descriptor in {}", path.display()))
}

pub fn read_input(path: &Path, hex: bool) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !hex {
        return Ok(bytes);
    }
    let text = String::from_utf8(bytes).context("Hex input is not valid UTF-8")?;
    parse_hex(&text)
}

/// Hex text with any whitespace between digits
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits).context("Invalid hex input")
}

pub fn decode_buffer(data: Vec<u8>, encoding: i32, format: &str) -> Result<DecodeReport> {
    let descriptor = MessageDescriptor {
        encoding,
        format: format.to_string(),
        ..MessageDescriptor::default()
    };
    decode_message(RawMessage::from_parts(descriptor, data))
}

pub fn decode_message(mut message: RawMessage) -> Result<DecodeReport> {
    let chain = decode_chain(message.data(), 0, message.descriptor.encoding)
        .context("Failed to decode header chain")?;
    debug!(headers = chain.headers.len(), skipped = chain.skipped.len(), "Header chain");

    let envelope = decode_envelope(&mut message).context("Failed to decode message")?;

    Ok(DecodeReport {
        envelope,
        skipped_headers: chain.skipped.iter().map(ToString::to_string).collect(),
        payload_offset: chain.payload_offset,
    })
}

pub fn encode_json(json: &str) -> Result<RawMessage> {
    let envelope: Envelope = serde_json::from_str(json).context("Invalid envelope JSON")?;
    encode_envelope(&envelope).context("Failed to encode envelope")
}

pub fn write_output(path: &Path, data: &[u8], hex: bool) -> Result<()> {
    let result = if hex {
        std::fs::write(path, hex::encode(data))
    } else {
        std::fs::write(path, data)
    };
    result.with_context(|| format!("Failed to write {}", path.display()))
}
