//! Values produced by the schema-less decoder.

use std::error::Error;
use std::fmt;

use crate::errors::ProtobufError;
use crate::reader::CodedReader;

/// Name of a scalar type that a field value was decoded as.
///
/// The wire format only records how to find the end of a value. A
/// schema-less decode therefore records one entry per type that is
/// compatible with the wire type, identified by a `ValueType`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Bool,
    Enum,
    Fixed32,
    SFixed32,
    Float,
    Fixed64,
    SFixed64,
    Double,
    String,
    Bytes,
    Message,
}

/// Interpretations of a varint value.
pub const VARINT_TYPES: [ValueType; 8] = [
    ValueType::Int32,
    ValueType::Int64,
    ValueType::UInt32,
    ValueType::UInt64,
    ValueType::SInt32,
    ValueType::SInt64,
    ValueType::Bool,
    ValueType::Enum,
];

/// Interpretations of a 32-bit fixed-width value.
pub const FIXED32_TYPES: [ValueType; 3] =
    [ValueType::Fixed32, ValueType::SFixed32, ValueType::Float];

/// Interpretations of a 64-bit fixed-width value.
pub const FIXED64_TYPES: [ValueType; 3] =
    [ValueType::Fixed64, ValueType::SFixed64, ValueType::Double];

const ALL_TYPES: [ValueType; 17] = [
    ValueType::Int32,
    ValueType::Int64,
    ValueType::UInt32,
    ValueType::UInt64,
    ValueType::SInt32,
    ValueType::SInt64,
    ValueType::Bool,
    ValueType::Enum,
    ValueType::Fixed32,
    ValueType::SFixed32,
    ValueType::Float,
    ValueType::Fixed64,
    ValueType::SFixed64,
    ValueType::Double,
    ValueType::String,
    ValueType::Bytes,
    ValueType::Message,
];

impl ValueType {
    /// Return the `.proto` keyword for this type, or `"enum"` / `"message"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::SInt32 => "sint32",
            Self::SInt64 => "sint64",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::Fixed32 => "fixed32",
            Self::SFixed32 => "sfixed32",
            Self::Float => "float",
            Self::Fixed64 => "fixed64",
            Self::SFixed64 => "sfixed64",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Message => "message",
        }
    }

    /// Return the capitalized name used for property tree keys, eg. `SInt32`.
    pub fn property_name(self) -> &'static str {
        match self {
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::SInt32 => "SInt32",
            Self::SInt64 => "SInt64",
            Self::Bool => "Bool",
            Self::Enum => "Enum",
            Self::Fixed32 => "Fixed32",
            Self::SFixed32 => "SFixed32",
            Self::Float => "Float",
            Self::Fixed64 => "Fixed64",
            Self::SFixed64 => "SFixed64",
            Self::Double => "Double",
            Self::String => "String",
            Self::Bytes => "Bytes",
            Self::Message => "Message",
        }
    }

    /// Look up a type by the name returned from [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_TYPES.into_iter().find(|ty| ty.name() == name)
    }

    /// Look up a type by the name returned from
    /// [`property_name`](Self::property_name).
    pub fn from_property_name(name: &str) -> Option<Self> {
        ALL_TYPES.into_iter().find(|ty| ty.property_name() == name)
    }

    /// Return true if `name` is one of the `.proto` scalar type keywords.
    ///
    /// `enum` and `message` are not keywords for field types and return false.
    pub fn is_scalar_keyword(name: &str) -> bool {
        Self::from_name(name).is_some_and(|ty| !matches!(ty, Self::Enum | Self::Message))
    }

    /// Read a value of this type from `reader`.
    ///
    /// `Message` values cannot be read as a scalar and are returned as bytes.
    pub(crate) fn read(self, reader: &mut CodedReader) -> Result<Scalar, ProtobufError> {
        let scalar = match self {
            Self::Int32 | Self::Enum => Scalar::Int32(reader.read_int32()?),
            Self::Int64 => Scalar::Int64(reader.read_int64()?),
            Self::UInt32 => Scalar::UInt32(reader.read_uint32()?),
            Self::UInt64 => Scalar::UInt64(reader.read_uint64()?),
            Self::SInt32 => Scalar::Int32(reader.read_sint32()?),
            Self::SInt64 => Scalar::Int64(reader.read_sint64()?),
            Self::Bool => Scalar::Bool(reader.read_bool()?),
            Self::Fixed32 => Scalar::UInt32(reader.read_fixed32()?),
            Self::SFixed32 => Scalar::Int32(reader.read_sfixed32()?),
            Self::Float => Scalar::Float(reader.read_float()?),
            Self::Fixed64 => Scalar::UInt64(reader.read_fixed64()?),
            Self::SFixed64 => Scalar::Int64(reader.read_sfixed64()?),
            Self::Double => Scalar::Double(reader.read_double()?),
            Self::String => Scalar::String(reader.read_string()?.to_string()),
            Self::Bytes | Self::Message => Scalar::Bytes(reader.read_length_delimited()?.to_vec()),
        };
        Ok(scalar)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned by typed accessors on decoded values.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupError {
    /// No value exists under the requested key.
    NotFound,

    /// A value exists but has a different kind.
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "value not found"),
            Self::WrongType { expected, found } => {
                write!(f, "expected {} value but found {}", expected, found)
            }
        }
    }
}

impl Error for LookupError {}

/// A single decoded scalar.
///
/// Interpretations that share a representation share a variant. For example
/// `sint32`, `sfixed32` and `enum` values are all stored as `Int32`.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

macro_rules! scalar_accessor {
    ($name:ident, $variant:ident, $type:ty, $expected:literal) => {
        pub fn $name(&self) -> Result<$type, LookupError> {
            match self {
                Self::$variant(v) => Ok(*v),
                other => Err(LookupError::WrongType {
                    expected: $expected,
                    found: other.kind_name(),
                }),
            }
        }
    };
}

impl Scalar {
    /// Return a name for the representation of this value.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Bool(_) => "bool",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    scalar_accessor!(as_i32, Int32, i32, "int32");
    scalar_accessor!(as_i64, Int64, i64, "int64");
    scalar_accessor!(as_u32, UInt32, u32, "uint32");
    scalar_accessor!(as_u64, UInt64, u64, "uint64");
    scalar_accessor!(as_bool, Bool, bool, "bool");
    scalar_accessor!(as_f32, Float, f32, "float");
    scalar_accessor!(as_f64, Double, f64, "double");

    pub fn as_str(&self) -> Result<&str, LookupError> {
        match self {
            Self::String(s) => Ok(s.as_str()),
            other => Err(LookupError::WrongType {
                expected: "string",
                found: other.kind_name(),
            }),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], LookupError> {
        match self {
            Self::Bytes(b) => Ok(b.as_slice()),
            other => Err(LookupError::WrongType {
                expected: "bytes",
                found: other.kind_name(),
            }),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Bytes(bytes) => {
                write!(f, "[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One interpretation of one field occurrence.
///
/// `M` is the container type used for nested messages.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<M> {
    Scalar(Scalar),

    /// A length-delimited value read as a packed run of scalars.
    Packed(Vec<Scalar>),

    /// A length-delimited value decoded as a nested message.
    Message(Box<M>),
}

impl<M> Value<M> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.kind_name(),
            Self::Packed(_) => "packed",
            Self::Message(_) => "message",
        }
    }

    pub fn as_scalar(&self) -> Result<&Scalar, LookupError> {
        match self {
            Self::Scalar(s) => Ok(s),
            other => Err(LookupError::WrongType {
                expected: "scalar",
                found: other.kind_name(),
            }),
        }
    }

    pub fn as_packed(&self) -> Result<&[Scalar], LookupError> {
        match self {
            Self::Packed(vals) => Ok(vals.as_slice()),
            other => Err(LookupError::WrongType {
                expected: "packed",
                found: other.kind_name(),
            }),
        }
    }

    pub fn as_message(&self) -> Result<&M, LookupError> {
        match self {
            Self::Message(msg) => Ok(msg.as_ref()),
            other => Err(LookupError::WrongType {
                expected: "message",
                found: other.kind_name(),
            }),
        }
    }

    /// Return the scalars in this value. A packed run yields each element
    /// and a message yields nothing.
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            Self::Scalar(s) => std::slice::from_ref(s),
            Self::Packed(vals) => vals.as_slice(),
            Self::Message(_) => &[],
        }
    }
}

/// All values recorded under one `(field, type)` key.
///
/// A key written once holds a `Single` value. Writing it again converts it to
/// a `Repeated` list, in wire order.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry<M> {
    Single(Value<M>),
    Repeated(Vec<Value<M>>),
}

impl<M> Entry<M> {
    /// Return all values in wire order.
    pub fn values(&self) -> &[Value<M>] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Repeated(vals) => vals.as_slice(),
        }
    }

    /// Return the most recently written value.
    pub fn last(&self) -> Option<&Value<M>> {
        self.values().last()
    }

    pub fn first(&self) -> Option<&Value<M>> {
        self.values().first()
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self, Self::Repeated(_))
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Append `value`, converting a single value into a list.
    pub(crate) fn push(&mut self, value: Value<M>) {
        match self {
            Self::Repeated(vals) => vals.push(value),
            Self::Single(_) => {
                let prev = std::mem::replace(self, Self::Repeated(Vec::with_capacity(2)));
                if let (Self::Single(prev), Self::Repeated(vals)) = (prev, &mut *self) {
                    vals.push(prev);
                    vals.push(value);
                }
            }
        }
    }
}
