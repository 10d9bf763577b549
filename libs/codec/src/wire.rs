//! Fixed-layout field access with descriptor-selected integer byte order
//!
//! Header structures mix 32-bit integers (whose byte order follows the message encoding)
//! with blank-padded character fields. [`WireReader`] walks a borrowed buffer with a
//! cursor, [`WireWriter`] appends to an owned one.

use crate::error::{ProtocolError, ProtocolResult};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;
use types::constants::{MQENC_INTEGER_MASK, MQENC_INTEGER_REVERSED};

/// Byte order of binary integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerEncoding {
    /// Most significant byte first
    Normal,
    /// Least significant byte first
    Reversed,
}

impl IntegerEncoding {
    /// Decode the integer part of a descriptor `encoding` value
    pub fn from_encoding(encoding: i32) -> Self {
        if encoding & MQENC_INTEGER_MASK == MQENC_INTEGER_REVERSED {
            IntegerEncoding::Reversed
        } else {
            IntegerEncoding::Normal
        }
    }
}

/// Strip the blank and NUL padding the wire uses for fixed-width text
pub(crate) fn trim_padding(text: &str) -> &str {
    text.trim_end_matches([' ', '\0'])
}

pub struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
    encoding: IntegerEncoding,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8], offset: usize, encoding: IntegerEncoding) -> Self {
        let mut cursor = Cursor::new(buf);
        cursor.set_position(offset.min(buf.len()) as u64);
        Self { cursor, encoding }
    }

    pub fn encoding(&self) -> IntegerEncoding {
        self.encoding
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Rewind or advance to an absolute offset
    pub fn seek(&mut self, offset: usize) {
        let len = self.buffer().len();
        self.cursor.set_position(offset.min(len) as u64);
    }

    pub fn remaining(&self) -> usize {
        self.buffer().len() - self.position()
    }

    fn buffer(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    /// Bytes at `position + skip` without moving the cursor
    pub fn peek_bytes(&self, skip: usize, len: usize) -> Option<&'a [u8]> {
        let start = self.position().checked_add(skip)?;
        let end = start.checked_add(len)?;
        self.buffer().get(start..end)
    }

    /// Integer at `position + skip` without moving the cursor
    pub fn peek_i32(&self, skip: usize) -> Option<i32> {
        let bytes = self.peek_bytes(skip, 4)?;
        Some(match self.encoding {
            IntegerEncoding::Normal => BigEndian::read_i32(bytes),
            IntegerEncoding::Reversed => LittleEndian::read_i32(bytes),
        })
    }

    fn ensure(&self, need: usize, context: &str) -> ProtocolResult<()> {
        if need > self.remaining() {
            return Err(ProtocolError::truncated(
                need,
                self.remaining(),
                self.position(),
                context,
            ));
        }
        Ok(())
    }

    pub fn read_i32(&mut self, context: &str) -> ProtocolResult<i32> {
        self.ensure(4, context)?;
        let offset = self.position();
        let value = match self.encoding {
            IntegerEncoding::Normal => self.cursor.read_i32::<BigEndian>(),
            IntegerEncoding::Reversed => self.cursor.read_i32::<LittleEndian>(),
        };
        value.map_err(|_| ProtocolError::truncated(4, 0, offset, context))
    }

    pub fn read_bytes(&mut self, len: usize, context: &str) -> ProtocolResult<&'a [u8]> {
        self.ensure(len, context)?;
        let start = self.position();
        let bytes = &self.buffer()[start..start + len];
        self.cursor.set_position((start + len) as u64);
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self, context: &str) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Fixed-width character field with padding removed
    pub fn read_chars(&mut self, len: usize, context: &str) -> ProtocolResult<String> {
        let bytes = self.read_bytes(len, context)?;
        Ok(trim_padding(&String::from_utf8_lossy(bytes)).to_string())
    }

    /// Single character field
    pub fn read_char(&mut self, context: &str) -> ProtocolResult<char> {
        let bytes = self.read_bytes(1, context)?;
        Ok(char::from(bytes[0]))
    }

    pub fn skip(&mut self, len: usize, context: &str) -> ProtocolResult<()> {
        self.read_bytes(len, context).map(|_| ())
    }
}

pub struct WireWriter {
    buf: Vec<u8>,
    encoding: IntegerEncoding,
}

impl WireWriter {
    pub fn new(encoding: IntegerEncoding) -> Self {
        Self {
            buf: Vec::new(),
            encoding,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0u8; 4];
        match self.encoding {
            IntegerEncoding::Normal => BigEndian::write_i32(&mut bytes, value),
            IntegerEncoding::Reversed => LittleEndian::write_i32(&mut bytes, value),
        }
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Blank-padded fixed-width character field
    pub fn write_chars(&mut self, value: &str, width: usize, field: &'static str) -> ProtocolResult<()> {
        let bytes = value.as_bytes();
        if bytes.len() > width {
            return Err(ProtocolError::FieldTooLong {
                field,
                max: width,
                actual: bytes.len(),
            });
        }
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + width - bytes.len(), b' ');
        Ok(())
    }

    /// Single byte character field; anything above U+00FF has no one-byte form
    pub fn write_char(&mut self, value: char, field: &'static str) -> ProtocolResult<()> {
        let byte = u8::try_from(value).map_err(|_| ProtocolError::FieldTooLong {
            field,
            max: 1,
            actual: value.len_utf8(),
        })?;
        self.buf.push(byte);
        Ok(())
    }

    /// Overwrite a previously written integer, used to back-fill struct lengths
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        let slot = &mut self.buf[offset..offset + 4];
        match self.encoding {
            IntegerEncoding::Normal => BigEndian::write_i32(slot, value),
            IntegerEncoding::Reversed => LittleEndian::write_i32(slot, value),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
