//! Tags, wire types and zigzag encoding.
//!
//! See <https://protobuf.dev/programming-guides/encoding/#structure>.

use crate::errors::{ErrorKind, ProtobufError};

/// Largest field number allowed by the Protocol Buffers language.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Raw wire type of the deprecated proto2 start-of-group marker.
pub const START_GROUP: u8 = 3;

/// Raw wire type of the deprecated proto2 end-of-group marker.
pub const END_GROUP: u8 = 4;

/// Byte layout of an encoded field value.
///
/// This identifies how to find the end of a value, not what the value means.
/// A `Varint` may hold any of eight scalar types for example.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = ProtobufError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            _ => Err(ProtobufError::new(ErrorKind::UnsupportedWireType(val))),
        }
    }
}

/// A decoded field tag.
///
/// The wire type is kept in raw form since a valid message may contain
/// group markers, which have no [`WireType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub field_number: u32,
    pub wire_type: u8,
}

impl Tag {
    pub fn new(field_number: u32, wire_type: WireType) -> Self {
        Self {
            field_number,
            wire_type: wire_type as u8,
        }
    }

    /// Split a raw tag value into its field number and wire type.
    pub fn from_raw(tag: u32) -> Self {
        let (field_number, wire_type) = split_tag(tag);
        Self {
            field_number,
            wire_type,
        }
    }

    /// Return the raw tag value as written on the wire.
    pub fn to_raw(self) -> u32 {
        (self.field_number << 3) | self.wire_type as u32
    }

    /// Return the wire type, if it is one that carries a value.
    pub fn wire_type(self) -> Result<WireType, ProtobufError> {
        WireType::try_from(self.wire_type)
            .map_err(|err| err.with_field(self.field_number, self.wire_type))
    }
}

/// Pack a field number and wire type into a tag.
pub fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    debug_assert!(field_number <= MAX_FIELD_NUMBER);
    (field_number << 3) | wire_type as u32
}

/// Split a tag into `(field_number, raw_wire_type)`.
pub fn split_tag(tag: u32) -> (u32, u8) {
    (tag >> 3, (tag & 0x7) as u8)
}

pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

pub fn zigzag_decode32(u: u32) -> i32 {
    ((u >> 1) as i32) ^ -((u & 1) as i32)
}

pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn zigzag_decode64(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

#[cfg(test)]
mod tests {
    use protowire_testing::TestCases;

    use super::{
        make_tag, split_tag, zigzag_decode32, zigzag_decode64, zigzag_encode32,
        zigzag_encode64, Tag, WireType, MAX_FIELD_NUMBER,
    };
    use crate::errors::ErrorKind;

    #[test]
    fn test_tag_round_trip() {
        let wire_types = [
            WireType::Varint,
            WireType::Fixed64,
            WireType::LengthDelimited,
            WireType::Fixed32,
        ];
        let fields = [1, 2, 15, 16, 2047, 2048, 1 << 20, MAX_FIELD_NUMBER];

        for field in fields {
            for wire_type in wire_types {
                let tag = make_tag(field, wire_type);
                assert_eq!(split_tag(tag), (field, wire_type as u8));

                let parsed = Tag::from_raw(tag);
                assert_eq!(parsed, Tag::new(field, wire_type));
                assert_eq!(parsed.wire_type().unwrap(), wire_type);
                assert_eq!(parsed.to_raw(), tag);
            }
        }
    }

    #[test]
    fn test_known_tags() {
        // Field 1 varint, field 2 length-delimited.
        assert_eq!(make_tag(1, WireType::Varint), 0x08);
        assert_eq!(make_tag(2, WireType::LengthDelimited), 0x12);
        assert_eq!(make_tag(5, WireType::Fixed32), 0x2d);
    }

    #[test]
    fn test_unsupported_wire_type() {
        for raw in [3, 4, 6, 7] {
            let err = Tag::from_raw((9 << 3) | raw as u32).wire_type().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedWireType(raw));
            assert_eq!(err.field(), Some(9));
        }
    }

    #[test]
    fn test_zigzag32() {
        #[derive(Debug)]
        struct Case {
            value: i32,
            encoded: u32,
        }

        let cases = [
            Case { value: 0, encoded: 0 },
            Case { value: -1, encoded: 1 },
            Case { value: 1, encoded: 2 },
            Case { value: -2, encoded: 3 },
            Case {
                value: i32::MAX,
                encoded: u32::MAX - 1,
            },
            Case {
                value: i32::MIN,
                encoded: u32::MAX,
            },
        ];

        cases.test_each(|&Case { value, encoded }| {
            assert_eq!(zigzag_encode32(value), encoded);
            assert_eq!(zigzag_decode32(encoded), value);
        });
    }

    #[test]
    fn test_zigzag64() {
        for value in [0, 1, -1, -1337, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode64(zigzag_encode64(value)), value);
        }
        assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);
        assert_eq!(zigzag_encode64(-1), 1);
    }
}
