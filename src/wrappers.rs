//! Wrappers that select the wire encoding of a value.
//!
//! A plain integer handed to the [encoder](crate::encoder) is always written
//! as a non-zigzag varint. The newtypes in this module select one of the other
//! encodings that share the same semantic type, and [`Packed`] marks a
//! sequence for packed repeated encoding.

use crate::writer::CodedWriter;

macro_rules! wrapper {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
        pub struct $name(pub $inner);

        impl From<$inner> for $name {
            fn from(val: $inner) -> Self {
                Self(val)
            }
        }

        impl From<$name> for $inner {
            fn from(val: $name) -> Self {
                val.0
            }
        }
    };
}

wrapper!(
    /// An unsigned 32-bit value written as 4 little-endian bytes.
    Fixed32,
    u32
);
wrapper!(
    /// An unsigned 64-bit value written as 8 little-endian bytes.
    Fixed64,
    u64
);
wrapper!(
    /// A signed 32-bit value written as 4 little-endian bytes.
    SFixed32,
    i32
);
wrapper!(
    /// A signed 64-bit value written as 8 little-endian bytes.
    SFixed64,
    i64
);
wrapper!(
    /// A signed 32-bit value written as a zigzag-encoded varint.
    SInt32,
    i32
);
wrapper!(
    /// A signed 64-bit value written as a zigzag-encoded varint.
    SInt64,
    i64
);

/// A homogeneous sequence written as a packed repeated field.
///
/// All elements are encoded back to back inside a single length-delimited
/// value which shares one tag. Only scalar numeric types can be packed.
#[derive(Clone, Debug, PartialEq)]
pub enum Packed {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    SInt32(Vec<i32>),
    SInt64(Vec<i64>),
    Bool(Vec<bool>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Fixed32(Vec<u32>),
    Fixed64(Vec<u64>),
    SFixed32(Vec<i32>),
    SFixed64(Vec<i64>),
}

impl Packed {
    pub fn int32(vals: impl Into<Vec<i32>>) -> Self {
        Self::Int32(vals.into())
    }

    pub fn int64(vals: impl Into<Vec<i64>>) -> Self {
        Self::Int64(vals.into())
    }

    pub fn uint32(vals: impl Into<Vec<u32>>) -> Self {
        Self::UInt32(vals.into())
    }

    pub fn uint64(vals: impl Into<Vec<u64>>) -> Self {
        Self::UInt64(vals.into())
    }

    pub fn sint32(vals: impl Into<Vec<i32>>) -> Self {
        Self::SInt32(vals.into())
    }

    pub fn sint64(vals: impl Into<Vec<i64>>) -> Self {
        Self::SInt64(vals.into())
    }

    pub fn bool(vals: impl Into<Vec<bool>>) -> Self {
        Self::Bool(vals.into())
    }

    pub fn float(vals: impl Into<Vec<f32>>) -> Self {
        Self::Float(vals.into())
    }

    pub fn double(vals: impl Into<Vec<f64>>) -> Self {
        Self::Double(vals.into())
    }

    pub fn fixed32(vals: impl Into<Vec<u32>>) -> Self {
        Self::Fixed32(vals.into())
    }

    pub fn fixed64(vals: impl Into<Vec<u64>>) -> Self {
        Self::Fixed64(vals.into())
    }

    pub fn sfixed32(vals: impl Into<Vec<i32>>) -> Self {
        Self::SFixed32(vals.into())
    }

    pub fn sfixed64(vals: impl Into<Vec<i64>>) -> Self {
        Self::SFixed64(vals.into())
    }

    /// Return the number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) | Self::SInt32(v) | Self::SFixed32(v) => v.len(),
            Self::Int64(v) | Self::SInt64(v) | Self::SFixed64(v) => v.len(),
            Self::UInt32(v) | Self::Fixed32(v) => v.len(),
            Self::UInt64(v) | Self::Fixed64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a name for this kind of value, eg. `"packed sint32"`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int32(_) => "packed int32",
            Self::Int64(_) => "packed int64",
            Self::UInt32(_) => "packed uint32",
            Self::UInt64(_) => "packed uint64",
            Self::SInt32(_) => "packed sint32",
            Self::SInt64(_) => "packed sint64",
            Self::Bool(_) => "packed bool",
            Self::Float(_) => "packed float",
            Self::Double(_) => "packed double",
            Self::Fixed32(_) => "packed fixed32",
            Self::Fixed64(_) => "packed fixed64",
            Self::SFixed32(_) => "packed sfixed32",
            Self::SFixed64(_) => "packed sfixed64",
        }
    }

    /// Write the concatenated element encodings, without tag or length.
    pub(crate) fn write_elements(&self, writer: &mut CodedWriter) {
        fn each<T: Copy>(vals: &[T], writer: &mut CodedWriter, f: fn(&mut CodedWriter, T)) {
            for &val in vals {
                f(writer, val);
            }
        }

        match self {
            Self::Int32(v) => each(v, writer, CodedWriter::write_int32),
            Self::Int64(v) => each(v, writer, CodedWriter::write_int64),
            Self::UInt32(v) => each(v, writer, CodedWriter::write_uint32),
            Self::UInt64(v) => each(v, writer, CodedWriter::write_uint64),
            Self::SInt32(v) => each(v, writer, CodedWriter::write_sint32),
            Self::SInt64(v) => each(v, writer, CodedWriter::write_sint64),
            Self::Bool(v) => each(v, writer, CodedWriter::write_bool),
            Self::Float(v) => each(v, writer, CodedWriter::write_float),
            Self::Double(v) => each(v, writer, CodedWriter::write_double),
            Self::Fixed32(v) => each(v, writer, CodedWriter::write_fixed32),
            Self::Fixed64(v) => each(v, writer, CodedWriter::write_fixed64),
            Self::SFixed32(v) => each(v, writer, CodedWriter::write_sfixed32),
            Self::SFixed64(v) => each(v, writer, CodedWriter::write_sfixed64),
        }
    }
}

#[cfg(test)]
mod tests {
    use protowire_testing::hex;

    use super::{Fixed32, Packed, SInt32};
    use crate::reader::CodedReader;
    use crate::writer::CodedWriter;

    #[test]
    fn test_wrapper_conversions() {
        let x: SInt32 = (-1337).into();
        assert_eq!(x, SInt32(-1337));
        assert_eq!(i32::from(x), -1337);
        assert_eq!(u32::from(Fixed32(5)), 5);
    }

    #[test]
    fn test_packed_elements() {
        let packed = Packed::int32([1, 300, 3]);
        assert_eq!(packed.len(), 3);
        assert_eq!(packed.kind_name(), "packed int32");

        let mut writer = CodedWriter::new();
        packed.write_elements(&mut writer);
        assert_eq!(writer.as_bytes(), hex("01 ac 02 03"));

        let mut reader = CodedReader::new(writer.as_bytes());
        let mut decoded = Vec::new();
        while !reader.at_end() {
            decoded.push(reader.read_int32().unwrap());
        }
        assert_eq!(decoded, [1, 300, 3]);
    }

    #[test]
    fn test_packed_fixed_width() {
        let packed = Packed::sfixed64(vec![-1, 2]);
        let mut writer = CodedWriter::new();
        packed.write_elements(&mut writer);
        assert_eq!(writer.position(), 16);
        assert!(Packed::float(Vec::new()).is_empty());
    }
}
