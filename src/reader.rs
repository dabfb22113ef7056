//! Cursor for reading primitive values from an encoded message.

use crate::errors::{ErrorKind, ProtobufError};
use crate::varint::decode_varint;
use crate::wire::{zigzag_decode32, zigzag_decode64, Tag, WireType, END_GROUP, START_GROUP};

/// Reads Protocol Buffers primitives from a byte buffer.
///
/// The basic building blocks of a message are four kinds of primitive:
/// varints, 32-bit values, 64-bit values and length-prefixed byte sequences.
/// `CodedReader` provides methods to read each of these, interpreted as any of
/// the scalar types that share the encoding.
///
/// The read position can be saved and restored with
/// [`position`](Self::position) and [`set_position`](Self::set_position). This
/// allows the same bytes to be read several times under different
/// interpretations.
///
/// ```
/// use protowire::CodedReader;
///
/// let mut reader = CodedReader::new(&[0x08, 0x96, 0x01]);
/// let tag = reader.read_tag()?.unwrap();
/// assert_eq!(tag.field_number, 1);
///
/// let start = reader.position();
/// assert_eq!(reader.read_int32()?, 150);
/// reader.set_position(start)?;
/// assert_eq!(reader.read_sint32()?, 75);
/// assert!(reader.at_end());
/// # Ok::<(), protowire::ProtobufError>(())
/// ```
#[derive(Clone, Debug)]
pub struct CodedReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CodedReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Return the current read position, relative to the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the read position.
    ///
    /// Fails if `pos` lies beyond the end of the buffer.
    pub fn set_position(&mut self, pos: usize) -> Result<(), ProtobufError> {
        if pos > self.buf.len() {
            return Err(ProtobufError::new(ErrorKind::OutOfRange));
        }
        self.pos = pos;
        Ok(())
    }

    /// Return true if all bytes have been read.
    pub fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Return the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read an LEB128-encoded varint of up to 64 bits.
    pub fn read_varint64(&mut self) -> Result<u64, ProtobufError> {
        let (value, len) = decode_varint(&self.buf[self.pos..])?;
        self.pos += len;
        Ok(value)
    }

    /// Read a varint and truncate it to 32 bits.
    ///
    /// The whole varint is consumed, even if it is longer than the 5 bytes
    /// needed for a 32-bit value.
    pub fn read_varint32(&mut self) -> Result<u32, ProtobufError> {
        self.read_varint64().map(|v| v as u32)
    }

    pub fn read_int32(&mut self) -> Result<i32, ProtobufError> {
        self.read_varint64().map(|v| v as i32)
    }

    pub fn read_int64(&mut self) -> Result<i64, ProtobufError> {
        self.read_varint64().map(|v| v as i64)
    }

    pub fn read_uint32(&mut self) -> Result<u32, ProtobufError> {
        self.read_varint32()
    }

    pub fn read_uint64(&mut self) -> Result<u64, ProtobufError> {
        self.read_varint64()
    }

    /// Read a zigzag-encoded `sint32` value.
    pub fn read_sint32(&mut self) -> Result<i32, ProtobufError> {
        self.read_varint32().map(zigzag_decode32)
    }

    /// Read a zigzag-encoded `sint64` value.
    pub fn read_sint64(&mut self) -> Result<i64, ProtobufError> {
        self.read_varint64().map(zigzag_decode64)
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtobufError> {
        self.read_varint64().map(|v| v != 0)
    }

    /// Read the value of a field whose schema type is an enum.
    pub fn read_enum(&mut self) -> Result<i32, ProtobufError> {
        self.read_int32()
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtobufError> {
        let bytes = self.read_raw(N)?;
        let mut array = [0; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    /// Read a 4-byte little-endian value.
    pub fn read_fixed32(&mut self) -> Result<u32, ProtobufError> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Read an 8-byte little-endian value.
    pub fn read_fixed64(&mut self) -> Result<u64, ProtobufError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_sfixed32(&mut self) -> Result<i32, ProtobufError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_sfixed64(&mut self) -> Result<i64, ProtobufError> {
        self.read_array().map(i64::from_le_bytes)
    }

    pub fn read_float(&mut self) -> Result<f32, ProtobufError> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_double(&mut self) -> Result<f64, ProtobufError> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Read `len` raw bytes.
    fn read_raw(&mut self, len: usize) -> Result<&'a [u8], ProtobufError> {
        if len > self.remaining() {
            return Err(ProtobufError::new(ErrorKind::OutOfRange));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read a varint length prefix followed by that many bytes.
    ///
    /// The returned slice borrows from the reader's buffer.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], ProtobufError> {
        let start = self.pos;
        let len = self.read_varint64()?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        match self.read_raw(len) {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                self.pos = start;
                Err(err)
            }
        }
    }

    /// Read a length-delimited UTF-8 string.
    pub fn read_string(&mut self) -> Result<&'a str, ProtobufError> {
        let bytes = self.read_length_delimited()?;
        std::str::from_utf8(bytes).map_err(|_| ProtobufError::new(ErrorKind::InvalidUtf8))
    }

    /// Read the next field tag.
    ///
    /// Returns `Ok(None)` at the end of the buffer.
    pub fn read_tag(&mut self) -> Result<Option<Tag>, ProtobufError> {
        if self.at_end() {
            return Ok(None);
        }
        let raw = self.read_varint64()?;
        let raw = u32::try_from(raw).map_err(|_| ProtobufError::new(ErrorKind::InvalidFieldNumber))?;
        let tag = Tag::from_raw(raw);
        if tag.field_number == 0 {
            return Err(ProtobufError::new(ErrorKind::InvalidFieldNumber));
        }
        Ok(Some(tag))
    }

    /// Skip over the value of a field whose tag has just been read.
    ///
    /// Groups are skipped up to and including their matching end marker. A
    /// stray end-of-group marker, or wire types 6 and 7, fail with
    /// [`ErrorKind::UnsupportedWireType`].
    pub fn skip_field(&mut self, tag: Tag) -> Result<(), ProtobufError> {
        let result = match tag.wire_type {
            START_GROUP => self.skip_group(tag.field_number),
            _ => match tag.wire_type()? {
                WireType::Varint => self.read_varint64().map(|_| ()),
                WireType::Fixed64 => self.read_raw(8).map(|_| ()),
                WireType::LengthDelimited => self.read_length_delimited().map(|_| ()),
                WireType::Fixed32 => self.read_raw(4).map(|_| ()),
            },
        };
        result.map_err(|err| err.with_field(tag.field_number, tag.wire_type))
    }

    fn skip_group(&mut self, field_number: u32) -> Result<(), ProtobufError> {
        // Field numbers of the groups still open, innermost last.
        let mut open = vec![field_number];
        while let Some(&current) = open.last() {
            let tag = self
                .read_tag()?
                .ok_or_else(|| ProtobufError::new(ErrorKind::OutOfRange))?;
            match tag.wire_type {
                START_GROUP => open.push(tag.field_number),
                END_GROUP if tag.field_number == current => {
                    open.pop();
                }
                END_GROUP => {
                    return Err(ProtobufError::new(ErrorKind::UnsupportedWireType(END_GROUP))
                        .with_field(tag.field_number, tag.wire_type));
                }
                _ => self.skip_field(tag)?,
            }
        }
        Ok(())
    }
}
