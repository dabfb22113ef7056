//! Serialize a field-tagged value graph into the wire format.

use crate::errors::{ErrorKind, ProtobufError};
use crate::wire::{WireType, MAX_FIELD_NUMBER};
use crate::wrappers::{Fixed32, Fixed64, Packed, SFixed32, SFixed64, SInt32, SInt64};
use crate::writer::CodedWriter;

/// A value of a single field in a [`MessageNode`].
///
/// The variant determines the wire encoding. Plain integers are written as
/// varints. Use the wrapper variants for zigzag or fixed-width encodings.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Fixed32(u32),
    Fixed64(u64),
    SFixed32(i32),
    SFixed64(i64),
    SInt32(i32),
    SInt64(i64),
    Message(MessageNode),
    Packed(Packed),

    /// Unpacked repeated field. Each element is written with its own tag.
    Repeated(Vec<FieldValue>),
}

impl FieldValue {
    /// Return a name for the kind of value, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Fixed32(_) => "fixed32",
            Self::Fixed64(_) => "fixed64",
            Self::SFixed32(_) => "sfixed32",
            Self::SFixed64(_) => "sfixed64",
            Self::SInt32(_) => "sint32",
            Self::SInt64(_) => "sint64",
            Self::Message(_) => "message",
            Self::Packed(packed) => packed.kind_name(),
            Self::Repeated(_) => "repeated",
        }
    }

    /// Return the wire type this value is written with. A repeated value
    /// reports the wire type of its first element.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Bool(_)
            | Self::Int32(_)
            | Self::Int64(_)
            | Self::UInt32(_)
            | Self::UInt64(_)
            | Self::SInt32(_)
            | Self::SInt64(_) => WireType::Varint,
            Self::Float(_) | Self::Fixed32(_) | Self::SFixed32(_) => WireType::Fixed32,
            Self::Double(_) | Self::Fixed64(_) | Self::SFixed64(_) => WireType::Fixed64,
            Self::String(_) | Self::Bytes(_) | Self::Message(_) | Self::Packed(_) => {
                WireType::LengthDelimited
            }
            Self::Repeated(items) => items
                .first()
                .map(FieldValue::wire_type)
                .unwrap_or(WireType::LengthDelimited),
        }
    }
}

macro_rules! impl_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for FieldValue {
            fn from(val: $type) -> Self {
                Self::$variant(val.into())
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i32, Int32);
impl_from!(i64, Int64);
impl_from!(u32, UInt32);
impl_from!(u64, UInt64);
impl_from!(f32, Float);
impl_from!(f64, Double);
impl_from!(String, String);
impl_from!(&str, String);
impl_from!(Vec<u8>, Bytes);
impl_from!(&[u8], Bytes);
impl_from!(Fixed32, Fixed32);
impl_from!(Fixed64, Fixed64);
impl_from!(SFixed32, SFixed32);
impl_from!(SFixed64, SFixed64);
impl_from!(SInt32, SInt32);
impl_from!(SInt64, SInt64);
impl_from!(MessageNode, Message);
impl_from!(Packed, Packed);
impl_from!(Vec<FieldValue>, Repeated);

/// An in-memory message: an ordered list of `(field_number, value)` pairs.
///
/// Fields are written in insertion order. Adding the same field number more
/// than once writes it more than once.
///
/// ```
/// use protowire::{MessageNode, SInt32};
///
/// let msg = MessageNode::new()
///     .field(1, "Ada")
///     .field(2, 7)
///     .field(3, SInt32(-1))
///     .message(4, MessageNode::new().field(1, true));
/// let bytes = msg.encode()?;
/// assert_eq!(bytes[..5], [0x0a, 0x03, b'A', b'd', b'a']);
/// # Ok::<(), protowire::ProtobufError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageNode {
    fields: Vec<(u32, FieldValue)>,
}

impl MessageNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, field_number: u32, value: impl Into<FieldValue>) -> Self {
        self.push(field_number, value);
        self
    }

    /// Append a field in place.
    pub fn push(&mut self, field_number: u32, value: impl Into<FieldValue>) {
        self.fields.push((field_number, value.into()));
    }

    pub fn message(self, field_number: u32, msg: MessageNode) -> Self {
        self.field(field_number, FieldValue::Message(msg))
    }

    pub fn bytes(self, field_number: u32, data: impl Into<Vec<u8>>) -> Self {
        self.field(field_number, FieldValue::Bytes(data.into()))
    }

    pub fn fixed32(self, field_number: u32, val: u32) -> Self {
        self.field(field_number, Fixed32(val))
    }

    pub fn fixed64(self, field_number: u32, val: u64) -> Self {
        self.field(field_number, Fixed64(val))
    }

    pub fn sfixed32(self, field_number: u32, val: i32) -> Self {
        self.field(field_number, SFixed32(val))
    }

    pub fn sfixed64(self, field_number: u32, val: i64) -> Self {
        self.field(field_number, SFixed64(val))
    }

    pub fn sint32(self, field_number: u32, val: i32) -> Self {
        self.field(field_number, SInt32(val))
    }

    pub fn sint64(self, field_number: u32, val: i64) -> Self {
        self.field(field_number, SInt64(val))
    }

    /// Append an unpacked repeated field.
    pub fn repeated<T: Into<FieldValue>>(
        self,
        field_number: u32,
        vals: impl IntoIterator<Item = T>,
    ) -> Self {
        let vals = vals.into_iter().map(Into::into).collect();
        self.field(field_number, FieldValue::Repeated(vals))
    }

    pub fn packed_int32(self, field_number: u32, vals: impl Into<Vec<i32>>) -> Self {
        self.field(field_number, Packed::int32(vals))
    }

    pub fn packed_int64(self, field_number: u32, vals: impl Into<Vec<i64>>) -> Self {
        self.field(field_number, Packed::int64(vals))
    }

    pub fn packed_uint32(self, field_number: u32, vals: impl Into<Vec<u32>>) -> Self {
        self.field(field_number, Packed::uint32(vals))
    }

    pub fn packed_uint64(self, field_number: u32, vals: impl Into<Vec<u64>>) -> Self {
        self.field(field_number, Packed::uint64(vals))
    }

    pub fn packed_sint32(self, field_number: u32, vals: impl Into<Vec<i32>>) -> Self {
        self.field(field_number, Packed::sint32(vals))
    }

    pub fn packed_sint64(self, field_number: u32, vals: impl Into<Vec<i64>>) -> Self {
        self.field(field_number, Packed::sint64(vals))
    }

    pub fn packed_bool(self, field_number: u32, vals: impl Into<Vec<bool>>) -> Self {
        self.field(field_number, Packed::bool(vals))
    }

    pub fn packed_float(self, field_number: u32, vals: impl Into<Vec<f32>>) -> Self {
        self.field(field_number, Packed::float(vals))
    }

    pub fn packed_double(self, field_number: u32, vals: impl Into<Vec<f64>>) -> Self {
        self.field(field_number, Packed::double(vals))
    }

    pub fn packed_fixed32(self, field_number: u32, vals: impl Into<Vec<u32>>) -> Self {
        self.field(field_number, Packed::fixed32(vals))
    }

    pub fn packed_fixed64(self, field_number: u32, vals: impl Into<Vec<u64>>) -> Self {
        self.field(field_number, Packed::fixed64(vals))
    }

    pub fn packed_sfixed32(self, field_number: u32, vals: impl Into<Vec<i32>>) -> Self {
        self.field(field_number, Packed::sfixed32(vals))
    }

    pub fn packed_sfixed64(self, field_number: u32, vals: impl Into<Vec<i64>>) -> Self {
        self.field(field_number, Packed::sfixed64(vals))
    }

    /// Return the fields in insertion order.
    pub fn fields(&self) -> &[(u32, FieldValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode this message. Equivalent to [`encode`].
    pub fn encode(&self) -> Result<Vec<u8>, ProtobufError> {
        encode(self)
    }
}

impl<V: Into<FieldValue>> FromIterator<(u32, V)> for MessageNode {
    fn from_iter<I: IntoIterator<Item = (u32, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(n, v)| (n, v.into())).collect(),
        }
    }
}

/// Encode a message into a new buffer.
pub fn encode(msg: &MessageNode) -> Result<Vec<u8>, ProtobufError> {
    let mut writer = CodedWriter::new();
    write_message(&mut writer, msg)?;
    Ok(writer.into_bytes())
}

/// Append the fields of `msg` to `writer`.
pub fn write_message(writer: &mut CodedWriter, msg: &MessageNode) -> Result<(), ProtobufError> {
    for (field_number, value) in &msg.fields {
        write_field(writer, *field_number, value)?;
    }
    Ok(())
}

/// Write a single field, including its tag.
pub fn write_field(
    writer: &mut CodedWriter,
    field_number: u32,
    value: &FieldValue,
) -> Result<(), ProtobufError> {
    if field_number == 0 || field_number > MAX_FIELD_NUMBER {
        return Err(ProtobufError::new(ErrorKind::InvalidFieldNumber)
            .with_field(field_number, value.wire_type() as u8));
    }

    match value {
        FieldValue::Repeated(items) => {
            for item in items {
                if matches!(item, FieldValue::Repeated(_) | FieldValue::Packed(_)) {
                    return Err(ProtobufError::new(ErrorKind::UnsupportedEncodeValueKind(
                        item.kind_name(),
                    ))
                    .with_field(field_number, WireType::LengthDelimited as u8));
                }
                write_field(writer, field_number, item)?;
            }
        }
        FieldValue::Packed(packed) => {
            if packed.is_empty() {
                return Ok(());
            }
            let mut payload = CodedWriter::new();
            packed.write_elements(&mut payload);
            writer.write_tag(field_number, WireType::LengthDelimited);
            writer.write_bytes(payload.as_bytes());
        }
        FieldValue::Message(msg) => {
            // The length prefix comes first, so encode into a temporary buffer.
            let mut nested = CodedWriter::new();
            write_message(&mut nested, msg)?;
            writer.write_tag(field_number, WireType::LengthDelimited);
            writer.write_bytes(nested.as_bytes());
        }
        FieldValue::Bool(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_bool(*v);
        }
        FieldValue::Int32(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_int32(*v);
        }
        FieldValue::Int64(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_int64(*v);
        }
        FieldValue::UInt32(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_uint32(*v);
        }
        FieldValue::UInt64(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_uint64(*v);
        }
        FieldValue::SInt32(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_sint32(*v);
        }
        FieldValue::SInt64(v) => {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_sint64(*v);
        }
        FieldValue::Float(v) => {
            writer.write_tag(field_number, WireType::Fixed32);
            writer.write_float(*v);
        }
        FieldValue::Fixed32(v) => {
            writer.write_tag(field_number, WireType::Fixed32);
            writer.write_fixed32(*v);
        }
        FieldValue::SFixed32(v) => {
            writer.write_tag(field_number, WireType::Fixed32);
            writer.write_sfixed32(*v);
        }
        FieldValue::Double(v) => {
            writer.write_tag(field_number, WireType::Fixed64);
            writer.write_double(*v);
        }
        FieldValue::Fixed64(v) => {
            writer.write_tag(field_number, WireType::Fixed64);
            writer.write_fixed64(*v);
        }
        FieldValue::SFixed64(v) => {
            writer.write_tag(field_number, WireType::Fixed64);
            writer.write_sfixed64(*v);
        }
        FieldValue::String(s) => {
            writer.write_tag(field_number, WireType::LengthDelimited);
            writer.write_string(s);
        }
        FieldValue::Bytes(b) => {
            writer.write_tag(field_number, WireType::LengthDelimited);
            writer.write_bytes(b);
        }
    }
    Ok(())
}
