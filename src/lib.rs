//! protowire encodes and decodes the Protocol Buffers binary wire format,
//! with or without a schema.
//!
//! # Encoding
//!
//! Messages are built as a tree of [`MessageNode`]s, where each field holds a
//! [`FieldValue`]. Plain Rust integers are encoded as varints. Use the
//! wrapper types ([`SInt32`], [`Fixed64`] etc.) or the matching builder
//! methods to select another encoding, and [`Packed`] for packed repeated
//! fields.
//!
//! # Decoding without a schema
//!
//! The wire format does not record which type was used to encode a value,
//! only how to find its end. [`decode_record`] and [`decode_tree`] therefore
//! return every interpretation compatible with the wire type of each value.
//! A varint is available as `int32`, `uint64`, `sint64`, `bool` and so on,
//! and a length-delimited value as bytes, a string, packed numbers and a
//! nested message, where these decode successfully.
//!
//! ```
//! use protowire::{decode_record, DecoderOptions, MessageNode, ValueType};
//!
//! let bytes = MessageNode::new().field(1, -2i32).encode()?;
//! let record = decode_record(&bytes, &DecoderOptions::default())?;
//!
//! assert_eq!(record.get_i32((1, ValueType::Int32))?, -2);
//! assert_eq!(record.get_u64((1, ValueType::UInt64))?, u64::MAX - 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Decoding with a schema
//!
//! When message descriptors are available, load them into a
//! [`TypeRegistry`] and use [`decode_with_schema`] to get exactly one value
//! per declared field, addressed by field name.
//!
//! # Errors
//!
//! By default decoding is lenient. Fields after a malformed one are dropped
//! and the fields decoded so far are returned. Set
//! [`DecoderOptions::throw_on_error`] to get a [`ProtobufError`] instead.
//!
//! Diagnostics are emitted using the [log](https://docs.rs/log) crate.

mod encoder;
mod errors;
mod guided;
mod options;
mod reader;
mod record;
mod schema;
mod schemaless;
mod value;
mod writer;
mod wrappers;

pub mod varint;
pub mod wire;

pub use encoder::{encode, write_field, write_message, FieldValue, MessageNode};
pub use errors::{ErrorKind, FromJsonError, ProtobufError};
pub use guided::{decode_with_schema, SchemaDecoder, Structured, StructuredMessage};
pub use options::{DecoderOptions, StringEncoding};
pub use reader::CodedReader;
pub use record::{property_name, record_key, FieldSink, PropertyTree, RawRecord};
pub use schema::{
    FieldKind, ResolvedField, ResolvedMessage, SchemaEnum, SchemaEnumValue, SchemaExtension,
    SchemaField, SchemaFile, SchemaMessage, SchemaOneof, TypeRegistry,
};
pub use schemaless::{decode_record, decode_tree, SchemalessDecoder};
pub use value::{
    Entry, LookupError, Scalar, Value, ValueType, FIXED32_TYPES, FIXED64_TYPES, VARINT_TYPES,
};
pub use wire::{Tag, WireType};
pub use writer::CodedWriter;
pub use wrappers::{Fixed32, Fixed64, Packed, SFixed32, SFixed64, SInt32, SInt64};
