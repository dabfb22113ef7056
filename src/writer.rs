use crate::varint::encode_varint;
use crate::wire::{make_tag, zigzag_encode32, zigzag_encode64, WireType};

/// Appends Protocol Buffers primitives to a growable buffer.
///
/// This is the write-side counterpart of [`CodedReader`](crate::CodedReader).
/// Each `write_*` method encodes only the value. Fields are written by calling
/// [`write_tag`](Self::write_tag) first.
#[derive(Clone, Debug, Default)]
pub struct CodedWriter {
    buf: Vec<u8>,
}

impl CodedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Return the number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write a tag. `field_number` must be in `1..=MAX_FIELD_NUMBER`.
    /// [`write_field`](crate::write_field) checks this before writing.
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        self.write_varint32(make_tag(field_number, wire_type));
    }

    pub fn write_varint32(&mut self, val: u32) {
        encode_varint(val as u64, &mut self.buf);
    }

    pub fn write_varint64(&mut self, val: u64) {
        encode_varint(val, &mut self.buf);
    }

    /// Write an `int32` value.
    ///
    /// Negative values are sign-extended and always take 10 bytes, so that
    /// readers may decode them as `int64`.
    pub fn write_int32(&mut self, val: i32) {
        self.write_varint64(val as i64 as u64);
    }

    pub fn write_int64(&mut self, val: i64) {
        self.write_varint64(val as u64);
    }

    pub fn write_uint32(&mut self, val: u32) {
        self.write_varint32(val);
    }

    pub fn write_uint64(&mut self, val: u64) {
        self.write_varint64(val);
    }

    pub fn write_sint32(&mut self, val: i32) {
        self.write_varint32(zigzag_encode32(val));
    }

    pub fn write_sint64(&mut self, val: i64) {
        self.write_varint64(zigzag_encode64(val));
    }

    pub fn write_bool(&mut self, val: bool) {
        self.buf.push(val as u8);
    }

    pub fn write_enum(&mut self, val: i32) {
        self.write_int32(val);
    }

    pub fn write_fixed32(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_sfixed32(&mut self, val: i32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_sfixed64(&mut self, val: i64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_float(&mut self, val: f32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_double(&mut self, val: f64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Write a varint length prefix followed by `data`.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.write_varint64(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Append already-encoded bytes without a length prefix.
    pub fn write_raw(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }
}
