//! Decode messages without a schema.
//!
//! The wire format identifies how to find the end of each value but not what
//! the value means. A varint could hold any of eight scalar types, and a
//! length-delimited value could be a string, raw bytes, a packed repeated
//! field or a nested message. [`SchemalessDecoder`] records every
//! interpretation that is consistent with the data, keyed by field number
//! and [`ValueType`].
//!
//! Malformed input is a normal case. Unless
//! [`throw_on_error`](DecoderOptions::throw_on_error) is set, decoding stops
//! at the first field that fails and returns everything decoded before it.

use smallvec::SmallVec;

use crate::errors::{ErrorKind, ProtobufError};
use crate::options::DecoderOptions;
use crate::reader::CodedReader;
use crate::record::{FieldSink, PropertyTree, RawRecord};
use crate::value::{Scalar, Value, ValueType, FIXED32_TYPES, FIXED64_TYPES, VARINT_TYPES};
use crate::wire::{Tag, WireType, START_GROUP};

/// Interpretations of one value, buffered so a field is recorded only if
/// every interpretation could be read.
type Interpretations<T> = SmallVec<[(ValueType, T); 8]>;

/// Schema-less decoder.
///
/// The decoder is generic over the result shape. Use [`decode_record`] or
/// [`decode_tree`] for the two built-in shapes.
#[derive(Clone, Debug)]
pub struct SchemalessDecoder<'a> {
    options: &'a DecoderOptions,
}

impl<'a> SchemalessDecoder<'a> {
    pub fn new(options: &'a DecoderOptions) -> Self {
        Self { options }
    }

    /// Decode a top-level message.
    pub fn decode<S: FieldSink>(&self, bytes: &[u8]) -> Result<S, ProtobufError> {
        self.decode_message(bytes, 0, self.options.throw_on_error)
    }

    /// Decode the fields of a message at nesting level `depth`.
    ///
    /// If `strict` is false, the first failing field ends the message and the
    /// fields decoded so far are returned.
    fn decode_message<S: FieldSink>(
        &self,
        bytes: &[u8],
        depth: usize,
        strict: bool,
    ) -> Result<S, ProtobufError> {
        let mut sink = S::new(self.options);
        let mut reader = CodedReader::new(bytes);

        loop {
            let tag = match reader.read_tag() {
                Ok(Some(tag)) => tag,
                Ok(None) => break,
                Err(err) if strict => return Err(err),
                Err(err) => {
                    log::debug!(
                        "stopped decoding at offset {}: {}",
                        reader.position(),
                        err
                    );
                    break;
                }
            };

            if let Err(err) = self.decode_field(&mut reader, tag, depth, &mut sink) {
                let err = err.with_field(tag.field_number, tag.wire_type);
                if strict {
                    return Err(err);
                }
                log::debug!(
                    "ignoring field {} with wire type {}: {}",
                    tag.field_number,
                    tag.wire_type,
                    err
                );
                break;
            }
        }

        Ok(sink)
    }

    fn decode_field<S: FieldSink>(
        &self,
        reader: &mut CodedReader,
        tag: Tag,
        depth: usize,
        sink: &mut S,
    ) -> Result<(), ProtobufError> {
        if tag.wire_type == START_GROUP {
            // Groups are skipped and recorded nowhere.
            return reader.skip_field(tag);
        }

        let include_all = self.options.include_all_possible_types;
        let types: &[ValueType] = match tag.wire_type()? {
            WireType::Varint if include_all => &VARINT_TYPES,
            WireType::Varint => &[ValueType::Int64],
            WireType::Fixed32 if include_all => &FIXED32_TYPES,
            WireType::Fixed32 => &[ValueType::Fixed32],
            WireType::Fixed64 if include_all => &FIXED64_TYPES,
            WireType::Fixed64 => &[ValueType::Fixed64],
            WireType::LengthDelimited => {
                let data = reader.read_length_delimited()?;
                return self.decode_length_delimited(data, tag.field_number, depth, sink);
            }
        };

        let start = reader.position();
        let mut values: Interpretations<Scalar> = SmallVec::new();
        for &ty in types {
            reader.set_position(start)?;
            values.push((ty, ty.read(reader)?));
        }
        for (ty, value) in values {
            sink.insert(tag.field_number, ty, Value::Scalar(value));
        }
        Ok(())
    }

    fn decode_length_delimited<S: FieldSink>(
        &self,
        data: &[u8],
        field_number: u32,
        depth: usize,
        sink: &mut S,
    ) -> Result<(), ProtobufError> {
        // The nested attempt is the only step that can fail, so it runs
        // before anything is recorded.
        let nested = self.try_nested::<S>(data, field_number, depth)?;

        sink.insert(
            field_number,
            ValueType::Bytes,
            Value::Scalar(Scalar::Bytes(data.to_vec())),
        );
        if let Some(s) = self.options.string_encoding.decode(data) {
            sink.insert(
                field_number,
                ValueType::String,
                Value::Scalar(Scalar::String(s.into_owned())),
            );
        }

        let include_all = self.options.include_all_possible_types;
        let packed_types: [&[ValueType]; 3] = if include_all {
            [&VARINT_TYPES, &FIXED32_TYPES, &FIXED64_TYPES]
        } else {
            [
                &[ValueType::Int64],
                &[ValueType::Fixed32],
                &[ValueType::Fixed64],
            ]
        };
        for types in packed_types {
            match read_packed(data, types) {
                Some(columns) => {
                    for (ty, vals) in columns {
                        sink.insert(field_number, ty, Value::Packed(vals));
                    }
                }
                None => log::trace!(
                    "field {} is not a packed {} run",
                    field_number,
                    types[0]
                ),
            }
        }

        if let Some(msg) = nested {
            sink.insert(field_number, ValueType::Message, Value::Message(Box::new(msg)));
        }
        Ok(())
    }

    /// Try to decode `data` as a message nested one level below `depth`.
    ///
    /// Returns `Ok(None)` if the attempt is disabled or fails. The only error
    /// returned is [`ErrorKind::NestingDepthExceeded`], and only if
    /// `throw_on_error` is set.
    fn try_nested<S: FieldSink>(
        &self,
        data: &[u8],
        field_number: u32,
        depth: usize,
    ) -> Result<Option<S>, ProtobufError> {
        if !self.options.attempt_nested_message_deserialization {
            return Ok(None);
        }

        let max_depth = self.options.max_nesting_depth;
        let depth = depth + 1;
        if depth > max_depth {
            if self.options.throw_on_error {
                return Err(ProtobufError::new(ErrorKind::NestingDepthExceeded(
                    max_depth,
                )));
            }
            log::warn!(
                "not decoding field {} as a message: nesting depth exceeds {}",
                field_number,
                max_depth
            );
            return Ok(None);
        }

        match self.decode_message(data, depth, true) {
            Ok(msg) => Ok(Some(msg)),
            Err(err) if matches!(err.kind(), ErrorKind::NestingDepthExceeded(_)) => Err(err),
            Err(err) => {
                log::trace!("field {} is not a message: {}", field_number, err);
                Ok(None)
            }
        }
    }
}

/// Read `data` as a packed run of values, reading each element as every type
/// in `types`.
///
/// Returns one column of values per type, or `None` unless the whole span
/// divides into valid elements.
fn read_packed(data: &[u8], types: &[ValueType]) -> Option<Interpretations<Vec<Scalar>>> {
    if data.is_empty() {
        return None;
    }

    let mut columns: Interpretations<Vec<Scalar>> =
        types.iter().map(|&ty| (ty, Vec::new())).collect();
    let mut reader = CodedReader::new(data);
    while !reader.at_end() {
        let start = reader.position();
        for (ty, column) in columns.iter_mut() {
            reader.set_position(start).ok()?;
            column.push(ty.read(&mut reader).ok()?);
        }
    }
    Some(columns)
}

/// Decode a message into a flat [`RawRecord`].
pub fn decode_record(bytes: &[u8], options: &DecoderOptions) -> Result<RawRecord, ProtobufError> {
    SchemalessDecoder::new(options).decode(bytes)
}

/// Decode a message into a nested [`PropertyTree`].
///
/// ```
/// use protowire::{decode_tree, DecoderOptions, MessageNode};
///
/// let bytes = MessageNode::new()
///     .message(3, MessageNode::new().field(1, 42u32))
///     .encode()?;
/// let tree = decode_tree(&bytes, &DecoderOptions::default())?;
/// let inner = tree.nested("Message_3")?;
/// assert_eq!(inner.get_u64("UInt64_1")?, 42);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode_tree(bytes: &[u8], options: &DecoderOptions) -> Result<PropertyTree, ProtobufError> {
    SchemalessDecoder::new(options).decode(bytes)
}

#[cfg(test)]
mod tests {
    use protowire_testing::{hex, TestCases, WireBuilder};

    use super::{decode_record, decode_tree};
    use crate::encoder::MessageNode;
    use crate::errors::ErrorKind;
    use crate::options::{DecoderOptions, StringEncoding};
    use crate::record::RawRecord;
    use crate::value::{Scalar, Value, ValueType};
    use crate::wire::{END_GROUP, START_GROUP};

    fn strict() -> DecoderOptions {
        DecoderOptions {
            throw_on_error: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_varint_fan_out() {
        let bytes = WireBuilder::new().varint(1, 150).finish();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        assert_eq!(
            record.type_names(1),
            ["int32", "int64", "uint32", "uint64", "sint32", "sint64", "bool", "enum"]
        );
        assert_eq!(record.get_i32((1, ValueType::Int32)), Ok(150));
        assert_eq!(record.get_i64((1, ValueType::SInt64)), Ok(75));
        assert_eq!(record.get_bool((1, ValueType::Bool)), Ok(true));
        assert_eq!(record.get_i32((1, ValueType::Enum)), Ok(150));
    }

    #[test]
    fn test_fixed_fan_out() {
        let bytes = WireBuilder::new()
            .fixed32(2, (-2.5f32).to_bits())
            .fixed64(3, u64::MAX)
            .finish();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        assert_eq!(record.type_names(2), ["fixed32", "sfixed32", "float"]);
        assert_eq!(record.get_f32((2, ValueType::Float)), Ok(-2.5));
        assert_eq!(record.type_names(3), ["fixed64", "sfixed64", "double"]);
        assert_eq!(record.get_u64((3, ValueType::Fixed64)), Ok(u64::MAX));
        assert_eq!(record.get_i64((3, ValueType::SFixed64)), Ok(-1));
    }

    #[test]
    fn test_single_interpretation() {
        let opts = DecoderOptions {
            include_all_possible_types: false,
            ..Default::default()
        };
        let bytes = WireBuilder::new()
            .varint(1, u64::MAX)
            .fixed32(2, 7)
            .fixed64(3, 9)
            .finish();
        let record = decode_record(&bytes, &opts).unwrap();

        assert_eq!(record.type_names(1), ["int64"]);
        assert_eq!(record.get_i64((1, ValueType::Int64)), Ok(-1));
        assert_eq!(record.type_names(2), ["fixed32"]);
        assert_eq!(record.type_names(3), ["fixed64"]);
    }

    #[test]
    fn test_repeated_merge() {
        let bytes = WireBuilder::new().varint(5, 1).varint(5, 2).finish();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        let list = record.get_key("5(int32)[]").unwrap();
        let expected = [
            Value::Scalar(Scalar::Int32(1)),
            Value::Scalar(Scalar::Int32(2)),
        ];
        assert_eq!(list.values(), expected);
        assert_eq!(record.get_key("5(int32)").unwrap().values(), expected);
        assert!(record.keys().contains(&"5(sint64)[]".to_string()));
    }

    #[test]
    fn test_custom_suffix() {
        let opts = DecoderOptions {
            repeated_field_key_suffix: "_all".into(),
            ..Default::default()
        };
        let bytes = WireBuilder::new().varint(5, 1).varint(5, 2).finish();
        let record = decode_record(&bytes, &opts).unwrap();
        assert_eq!(record.get_key("5(uint32)_all").map(|e| e.len()), Some(2));
        assert!(record.get_key("5(uint32)[]").is_none());
    }

    #[test]
    fn test_length_delimited() {
        let bytes = WireBuilder::new().string(2, "hi").finish();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        assert_eq!(record.get_str((2, ValueType::String)), Ok("hi"));
        assert_eq!(record.get_bytes((2, ValueType::Bytes)), Ok(&b"hi"[..]));

        // "hi" is also two valid varints, and a valid message containing
        // field 13 = 105.
        let packed: Vec<_> = record.get_repeated(2, ValueType::UInt32);
        assert_eq!(packed, [&Scalar::UInt32(0x68), &Scalar::UInt32(0x69)]);
        let nested = record.nested(2).unwrap();
        assert_eq!(nested.get_u32((13, ValueType::UInt32)), Ok(0x69));

        // Two bytes are not a whole number of fixed-width values.
        assert!(record.get(2, ValueType::Fixed32).is_none());
        assert!(record.get(2, ValueType::Fixed64).is_none());
    }

    #[test]
    fn test_packed_varints() {
        let bytes = MessageNode::new()
            .packed_int32(4, [1, 300, 3])
            .encode()
            .unwrap();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        let vals: Vec<i32> = record
            .get_repeated(4, ValueType::Int32)
            .into_iter()
            .map(|s| s.as_i32().unwrap())
            .collect();
        assert_eq!(vals, [1, 300, 3]);
    }

    #[test]
    fn test_packed_fixed() {
        let bytes = MessageNode::new()
            .packed_fixed32(1, [1, 2])
            .encode()
            .unwrap();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        // 8 bytes are both two fixed32 values and one fixed64 value.
        let fixed32: Vec<_> = record.get_repeated(1, ValueType::Fixed32);
        assert_eq!(fixed32, [&Scalar::UInt32(1), &Scalar::UInt32(2)]);
        let fixed64: Vec<_> = record.get_repeated(1, ValueType::Fixed64);
        assert_eq!(fixed64, [&Scalar::UInt64(1 | (2 << 32))]);
    }

    #[test]
    fn test_empty_length_delimited() {
        let bytes = WireBuilder::new().bytes(1, &[]).finish();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        assert_eq!(record.type_names(1), ["bytes", "string", "message"]);
        assert!(record.nested(1).unwrap().is_empty());
    }

    #[test]
    fn test_string_encoding() {
        #[derive(Debug)]
        struct Case {
            encoding: StringEncoding,
            expected: Option<&'static str>,
        }

        let cases = [
            Case {
                encoding: StringEncoding::Utf8,
                expected: None,
            },
            Case {
                encoding: StringEncoding::Utf8Lossy,
                expected: Some("\u{fffd}"),
            },
            Case {
                encoding: StringEncoding::Latin1,
                expected: Some("\u{ff}"),
            },
        ];

        cases.test_each(|case| {
            let opts = DecoderOptions {
                string_encoding: case.encoding,
                ..Default::default()
            };
            let bytes = WireBuilder::new().bytes(1, &[0xff]).finish();
            let record = decode_record(&bytes, &opts).unwrap();
            assert_eq!(record.get_str((1, ValueType::String)).ok(), case.expected);
        });
    }

    #[test]
    fn test_nested_message() {
        let bytes = MessageNode::new()
            .field(1, "outer")
            .message(
                2,
                MessageNode::new()
                    .field(1, 7u32)
                    .message(2, MessageNode::new().sint32(1, -1)),
            )
            .encode()
            .unwrap();
        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();

        let inner = record.nested(2).unwrap();
        assert_eq!(inner.get_u32((1, ValueType::UInt32)), Ok(7));
        let innermost = inner.nested(2).unwrap();
        assert_eq!(innermost.get_i32((1, ValueType::SInt32)), Ok(-1));
    }

    #[test]
    fn test_nested_disabled() {
        let opts = DecoderOptions {
            attempt_nested_message_deserialization: false,
            ..Default::default()
        };
        let bytes = WireBuilder::new()
            .message(2, WireBuilder::new().varint(1, 1))
            .finish();
        let record = decode_record(&bytes, &opts).unwrap();
        assert!(record.get(2, ValueType::Message).is_none());
        assert!(record.get(2, ValueType::Bytes).is_some());
    }

    /// Build a message whose field 1 embeds a message of the same form,
    /// `levels` times.
    fn deeply_nested(levels: usize) -> Vec<u8> {
        let mut msg = WireBuilder::new().varint(2, 1);
        for _ in 0..levels {
            msg = WireBuilder::new().message(1, msg);
        }
        msg.finish()
    }

    fn nesting_depth(record: &RawRecord) -> usize {
        let mut depth = 0;
        let mut current = record;
        while let Ok(next) = current.nested(1) {
            depth += 1;
            current = next;
        }
        depth
    }

    #[test]
    fn test_nesting_limit() {
        let bytes = deeply_nested(100);

        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();
        assert_eq!(nesting_depth(&record), 64);

        let err = decode_record(&bytes, &strict()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NestingDepthExceeded(64));

        // Nesting within the limit succeeds in either mode.
        let bytes = deeply_nested(10);
        let record = decode_record(&bytes, &strict()).unwrap();
        assert_eq!(nesting_depth(&record), 10);
    }

    #[test]
    fn test_zero_nesting_depth() {
        let opts = DecoderOptions {
            max_nesting_depth: 0,
            ..Default::default()
        };
        let record = decode_record(&deeply_nested(1), &opts).unwrap();
        assert_eq!(nesting_depth(&record), 0);
        assert!(record.get(1, ValueType::Bytes).is_some());
    }

    #[test]
    fn test_partial_result() {
        #[derive(Debug)]
        struct Case {
            tail: Vec<u8>,
            error: ErrorKind,
        }

        let cases = [
            // Truncated varint.
            Case {
                tail: hex("10 96"),
                error: ErrorKind::OutOfRange,
            },
            // Wire type 7.
            Case {
                tail: hex("17 01"),
                error: ErrorKind::UnsupportedWireType(7),
            },
            // Length prefix beyond the end of the buffer.
            Case {
                tail: hex("12 09 00"),
                error: ErrorKind::OutOfRange,
            },
            // Field number zero.
            Case {
                tail: hex("00 01"),
                error: ErrorKind::InvalidFieldNumber,
            },
        ];

        cases.test_each(|case| {
            let bytes = WireBuilder::new().varint(1, 1).raw(&case.tail).finish();

            let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();
            assert_eq!(record.field_numbers(), [1]);

            let err = decode_record(&bytes, &strict()).unwrap_err();
            assert_eq!(err.kind(), &case.error);
        });
    }

    #[test]
    fn test_error_reports_field() {
        let bytes = hex("08 01 10 96");
        let err = decode_record(&bytes, &strict()).unwrap_err();
        assert_eq!(err.field(), Some(2));
        assert_eq!(err.wire_type(), Some(0));
    }

    #[test]
    fn test_groups_are_skipped() {
        let bytes = WireBuilder::new()
            .raw_tag(1, START_GROUP)
            .varint(2, 5)
            .raw_tag(1, END_GROUP)
            .varint(3, 9)
            .finish();
        let record = decode_record(&bytes, &strict()).unwrap();
        assert_eq!(record.field_numbers(), [3]);
    }

    #[test]
    fn test_unterminated_nested_groups() {
        let bytes = vec![0x0b; 1_000_000];

        let record = decode_record(&bytes, &DecoderOptions::default()).unwrap();
        assert!(record.is_empty());

        let err = decode_record(&bytes, &strict()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::OutOfRange);
        assert_eq!(err.field(), Some(1));
    }

    #[test]
    fn test_decode_tree() {
        let bytes = WireBuilder::new()
            .varint(1, 3)
            .varint(1, 4)
            .string(2, "Ada")
            .finish();
        let tree = decode_tree(&bytes, &DecoderOptions::default()).unwrap();

        assert_eq!(tree.get_i32("SInt32_1"), Ok(2));
        assert_eq!(tree.get("Int32_1[]").map(|e| e.len()), Some(2));
        assert_eq!(tree.get_str("String_2"), Ok("Ada"));
        assert!(tree.names().contains(&"Bytes_2".to_string()));
        // "Ada" starts with a 64-bit field that runs past the end.
        assert!(tree.nested("Message_2").is_err());
    }

    #[test]
    fn test_empty_input() {
        let record = decode_record(&[], &strict()).unwrap();
        assert!(record.is_empty());
    }
}
