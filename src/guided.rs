//! Schema-guided decoding.
//!
//! A guided decode runs the schema-less decoder once and then uses the
//! resolved message descriptors in a [`TypeRegistry`] to pick exactly one
//! interpretation for each declared field.

use std::fmt;

use crate::errors::{ErrorKind, ProtobufError};
use crate::options::DecoderOptions;
use crate::record::RawRecord;
use crate::schema::{FieldKind, ResolvedField, ResolvedMessage, TypeRegistry};
use crate::schemaless::decode_record;
use crate::value::{LookupError, Scalar, ValueType};

/// Value of a field in a [`StructuredMessage`].
#[derive(Clone, Debug, PartialEq)]
pub enum Structured {
    Scalar(Scalar),
    Message(StructuredMessage),

    /// Values of a repeated field, in wire order.
    List(Vec<Structured>),

    /// Entries of a map field in wire order. Keys are unique.
    Map(Vec<(Scalar, Structured)>),
}

impl Structured {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.kind_name(),
            Self::Message(_) => "message",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn as_scalar(&self) -> Result<&Scalar, LookupError> {
        match self {
            Self::Scalar(s) => Ok(s),
            other => Err(wrong_type("scalar", other)),
        }
    }

    pub fn as_message(&self) -> Result<&StructuredMessage, LookupError> {
        match self {
            Self::Message(m) => Ok(m),
            other => Err(wrong_type("message", other)),
        }
    }

    pub fn as_list(&self) -> Result<&[Structured], LookupError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(wrong_type("list", other)),
        }
    }

    pub fn as_map(&self) -> Result<&[(Scalar, Structured)], LookupError> {
        match self {
            Self::Map(entries) => Ok(entries),
            other => Err(wrong_type("map", other)),
        }
    }
}

fn wrong_type(expected: &'static str, found: &Structured) -> LookupError {
    LookupError::WrongType {
        expected,
        found: found.kind_name(),
    }
}

impl fmt::Display for Structured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{}", s),
            Self::Message(m) => write!(f, "{}", m),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", key, value)?;
                }
                if entries.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
        }
    }
}

/// Result of a schema-guided decode, addressed by declared field name.
///
/// Fields appear in declaration order. Fields that were absent from the
/// input are omitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructuredMessage {
    type_name: String,
    fields: Vec<(String, Structured)>,
}

impl StructuredMessage {
    /// Return the fully qualified name of the message type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Structured> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn scalar(&self, name: &str) -> Result<&Scalar, LookupError> {
        self.get(name).ok_or(LookupError::NotFound)?.as_scalar()
    }

    pub fn get_i32(&self, name: &str) -> Result<i32, LookupError> {
        self.scalar(name)?.as_i32()
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, LookupError> {
        self.scalar(name)?.as_i64()
    }

    pub fn get_u32(&self, name: &str) -> Result<u32, LookupError> {
        self.scalar(name)?.as_u32()
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, LookupError> {
        self.scalar(name)?.as_u64()
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, LookupError> {
        self.scalar(name)?.as_bool()
    }

    pub fn get_f32(&self, name: &str) -> Result<f32, LookupError> {
        self.scalar(name)?.as_f32()
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, LookupError> {
        self.scalar(name)?.as_f64()
    }

    pub fn get_str(&self, name: &str) -> Result<&str, LookupError> {
        self.scalar(name)?.as_str()
    }

    pub fn get_bytes(&self, name: &str) -> Result<&[u8], LookupError> {
        self.scalar(name)?.as_bytes()
    }

    pub fn get_message(&self, name: &str) -> Result<&StructuredMessage, LookupError> {
        self.get(name).ok_or(LookupError::NotFound)?.as_message()
    }

    pub fn get_list(&self, name: &str) -> Result<&[Structured], LookupError> {
        self.get(name).ok_or(LookupError::NotFound)?.as_list()
    }

    pub fn get_map(&self, name: &str) -> Result<&[(Scalar, Structured)], LookupError> {
        self.get(name).ok_or(LookupError::NotFound)?.as_map()
    }

    /// Iterate over `(name, value)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Structured)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for StructuredMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", name, value)?;
        }
        write!(f, " }}")
    }
}

/// Decodes messages of types known to a [`TypeRegistry`].
pub struct SchemaDecoder<'a> {
    registry: &'a TypeRegistry,
    options: DecoderOptions,
}

impl<'a> SchemaDecoder<'a> {
    /// Create a decoder.
    ///
    /// The schema-less pass always records every interpretation, attempts
    /// nested messages and collects repeated fields. Other options are used
    /// as given.
    pub fn new(registry: &'a TypeRegistry, options: &DecoderOptions) -> Self {
        Self {
            registry,
            options: DecoderOptions {
                include_all_possible_types: true,
                attempt_nested_message_deserialization: true,
                handle_repeated_fields: true,
                ..options.clone()
            },
        }
    }

    /// Decode `bytes` as a message of type `root`, given by its fully
    /// qualified name.
    pub fn decode(&self, bytes: &[u8], root: &str) -> Result<StructuredMessage, ProtobufError> {
        let message = self
            .registry
            .message(root)
            .ok_or_else(|| ProtobufError::new(ErrorKind::SchemaTypeNotFound(root.to_string())))?;
        let record = decode_record(bytes, &self.options)
            .map_err(|err| err.with_context(format!("decoding {}", message.full_name)))?;
        Ok(self.convert_message(&record, message))
    }

    fn convert_message(&self, record: &RawRecord, message: &ResolvedMessage) -> StructuredMessage {
        let fields = message
            .fields
            .iter()
            .filter_map(|field| {
                let value = self.convert_field(record, field, &message.full_name)?;
                Some((field.name.clone(), value))
            })
            .collect();
        StructuredMessage {
            type_name: message.full_name.clone(),
            fields,
        }
    }

    fn convert_field(
        &self,
        record: &RawRecord,
        field: &ResolvedField,
        parent: &str,
    ) -> Option<Structured> {
        let number = field.number;
        match &field.kind {
            FieldKind::Scalar(ty) => scalar_field(record, number, *ty, field.repeated),
            FieldKind::Enum(_) => scalar_field(record, number, ValueType::Enum, field.repeated),
            FieldKind::Message(type_name) => {
                let message = self.registry.message(type_name)?;
                let mut values: Vec<_> = record
                    .repeated_nested(number)
                    .into_iter()
                    .map(|nested| Structured::Message(self.convert_message(nested, message)))
                    .collect();
                collapse(&mut values, field.repeated)
            }
            FieldKind::Map { key, value } => {
                let entries = record.repeated_nested(number);
                if entries.is_empty() {
                    return None;
                }
                let mut map: Vec<(Scalar, Structured)> = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = last_scalar(entry, 1, *key).unwrap_or_else(|| zero_value(*key));
                    let value = self.map_value(entry, value);
                    match map.iter_mut().find(|(k, _)| *k == key) {
                        Some(existing) => existing.1 = value,
                        None => map.push((key, value)),
                    }
                }
                Some(Structured::Map(map))
            }
            FieldKind::Unresolved(type_name) => {
                let value = unresolved_field(record, number, field.repeated);
                if value.is_some() {
                    log::warn!(
                        "type '{}' of field '{}' in '{}' not found, exposing raw value",
                        type_name,
                        field.name,
                        parent
                    );
                }
                value
            }
        }
    }

    /// Convert the value of a map entry, substituting the default value when
    /// the entry omits it.
    fn map_value(&self, entry: &RawRecord, kind: &FieldKind) -> Structured {
        let value_field = ResolvedField {
            name: "value".to_string(),
            number: 2,
            repeated: false,
            kind: kind.clone(),
        };
        if let Some(value) = self.convert_field(entry, &value_field, "map entry") {
            return value;
        }
        match kind {
            FieldKind::Scalar(ty) => Structured::Scalar(zero_value(*ty)),
            FieldKind::Message(type_name) => Structured::Message(StructuredMessage {
                type_name: type_name.clone(),
                fields: Vec::new(),
            }),
            FieldKind::Enum(_) | FieldKind::Unresolved(_) | FieldKind::Map { .. } => {
                Structured::Scalar(zero_value(ValueType::Enum))
            }
        }
    }
}

/// Decode `bytes` as a message of type `root` using the descriptors in
/// `registry`.
///
/// ```
/// use protowire::{
///     decode_with_schema, DecoderOptions, MessageNode, SchemaField, SchemaFile, SchemaMessage,
///     TypeRegistry,
/// };
///
/// let person = SchemaMessage::new("Person")
///     .field(SchemaField::new("name", 1, "string"))
///     .field(SchemaField::new("id", 2, "int32"));
/// let registry = TypeRegistry::new(&[SchemaFile::new("demo").message(person)]);
///
/// let bytes = MessageNode::new().field(1, "Ada").field(2, 7i32).encode()?;
/// let msg = decode_with_schema(&bytes, &registry, "demo.Person", &DecoderOptions::default())?;
/// assert_eq!(msg.get_str("name")?, "Ada");
/// assert_eq!(msg.get_i32("id")?, 7);
/// assert_eq!(msg.len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode_with_schema(
    bytes: &[u8],
    registry: &TypeRegistry,
    root: &str,
    options: &DecoderOptions,
) -> Result<StructuredMessage, ProtobufError> {
    SchemaDecoder::new(registry, options).decode(bytes, root)
}

fn last_scalar(record: &RawRecord, number: u32, ty: ValueType) -> Option<Scalar> {
    record.get_repeated(number, ty).last().map(|s| (*s).clone())
}

fn scalar_field(
    record: &RawRecord,
    number: u32,
    ty: ValueType,
    repeated: bool,
) -> Option<Structured> {
    let mut values: Vec<_> = record
        .get_repeated(number, ty)
        .into_iter()
        .map(|s| Structured::Scalar(s.clone()))
        .collect();
    collapse(&mut values, repeated)
}

/// Turn the values of a field into its structured form: the last value of a
/// singular field, or a list for a repeated field.
fn collapse(values: &mut Vec<Structured>, repeated: bool) -> Option<Structured> {
    if values.is_empty() {
        None
    } else if repeated {
        Some(Structured::List(std::mem::take(values)))
    } else {
        values.pop()
    }
}

fn unresolved_field(record: &RawRecord, number: u32, repeated: bool) -> Option<Structured> {
    if repeated {
        return scalar_field(record, number, ValueType::Bytes, true);
    }
    // Length-delimited values are exposed as bytes, not as packed integers.
    let varint = record.get(number, ValueType::Enum).and_then(|entry| {
        entry
            .values()
            .iter()
            .rev()
            .find_map(|v| v.as_scalar().ok())
    });
    varint
        .cloned()
        .or_else(|| last_scalar(record, number, ValueType::Bytes))
        .map(Structured::Scalar)
}

/// Default value of a scalar type, used for map entries which omit their key
/// or value.
fn zero_value(ty: ValueType) -> Scalar {
    match ty {
        ValueType::Int32 | ValueType::SInt32 | ValueType::SFixed32 | ValueType::Enum => {
            Scalar::Int32(0)
        }
        ValueType::Int64 | ValueType::SInt64 | ValueType::SFixed64 => Scalar::Int64(0),
        ValueType::UInt32 | ValueType::Fixed32 => Scalar::UInt32(0),
        ValueType::UInt64 | ValueType::Fixed64 => Scalar::UInt64(0),
        ValueType::Bool => Scalar::Bool(false),
        ValueType::Float => Scalar::Float(0.),
        ValueType::Double => Scalar::Double(0.),
        ValueType::String => Scalar::String(String::new()),
        ValueType::Bytes | ValueType::Message => Scalar::Bytes(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use protowire_testing::{TestCases, WireBuilder};

    use super::{decode_with_schema, Structured};
    use crate::encoder::MessageNode;
    use crate::errors::ErrorKind;
    use crate::options::DecoderOptions;
    use crate::schema::{
        SchemaEnum, SchemaExtension, SchemaField, SchemaFile, SchemaMessage, TypeRegistry,
    };
    use crate::value::{LookupError, Scalar};
    use crate::wrappers::SInt32;

    fn registry() -> TypeRegistry {
        let file = SchemaFile::new("demo")
            .message(
                SchemaMessage::new("Person")
                    .field(SchemaField::new("name", 1, "string"))
                    .field(SchemaField::new("id", 2, "int32"))
                    .field(SchemaField::new("address", 3, "Address"))
                    .field(SchemaField::repeated("emails", 4, "string"))
                    .field(SchemaField::repeated("scores", 5, "sint32"))
                    .field(SchemaField::new("kind", 6, "Kind"))
                    .field(SchemaField::map("labels", 7, "string", "int64"))
                    .field(SchemaField::repeated("friends", 8, "Person"))
                    .field(SchemaField::new("blob", 9, "Unknown"))
                    .field(SchemaField::repeated("blobs", 10, "Unknown"))
                    .field(SchemaField::new("legacy", 11, "Unknown"))
                    .nested_enum(SchemaEnum::new("Kind").value("HUMAN", 0).value("ROBOT", 1)),
            )
            .message(
                SchemaMessage::new("Address")
                    .field(SchemaField::new("city", 1, "string"))
                    .field(SchemaField::new("zip", 2, "fixed32")),
            )
            .extension(
                SchemaExtension::new("Person").field(SchemaField::new("nickname", 100, "string")),
            );
        TypeRegistry::new(&[file])
    }

    fn decode(bytes: &[u8]) -> super::StructuredMessage {
        decode_with_schema(bytes, &registry(), "demo.Person", &DecoderOptions::default()).unwrap()
    }

    #[test]
    fn test_person() {
        let bytes = MessageNode::new()
            .field(1, "Ada")
            .field(2, 7i32)
            .encode()
            .unwrap();
        let person = decode(&bytes);

        assert_eq!(person.type_name(), "demo.Person");
        let fields: Vec<_> = person.fields().collect();
        assert_eq!(
            fields,
            [
                ("name", &Structured::Scalar(Scalar::String("Ada".into()))),
                ("id", &Structured::Scalar(Scalar::Int32(7))),
            ]
        );
        assert_eq!(person.to_string(), r#"{ name: "Ada", id: 7 }"#);
    }

    #[test]
    fn test_scalar_fields() {
        let bytes = MessageNode::new()
            .field(2, 1i32)
            .field(2, -5i32)
            .field(4, "a@example.com")
            .field(4, "b@example.com")
            .packed_sint32(5, vec![-1, 2])
            .field(5, SInt32(-3))
            .field(6, 1i32)
            .field(100, "Dot")
            .encode()
            .unwrap();
        let person = decode(&bytes);

        // Singular fields keep the last value.
        assert_eq!(person.get_i32("id"), Ok(-5));

        let emails: Vec<_> = person
            .get_list("emails")
            .unwrap()
            .iter()
            .map(|v| v.as_scalar().unwrap().as_str().unwrap())
            .collect();
        assert_eq!(emails, ["a@example.com", "b@example.com"]);

        let scores: Vec<_> = person
            .get_list("scores")
            .unwrap()
            .iter()
            .map(|v| v.as_scalar().unwrap().as_i32().unwrap())
            .collect();
        assert_eq!(scores, [-1, 2, -3]);

        assert_eq!(person.get_i32("kind"), Ok(1));
        assert_eq!(person.get_str("nickname"), Ok("Dot"));
    }

    #[test]
    fn test_nested_messages() {
        let address = MessageNode::new()
            .field(1, "Paris")
            .fixed32(2, 75001)
            .encode()
            .unwrap();
        let friend = |name: &str| MessageNode::new().field(1, name);
        let bytes = MessageNode::new()
            .bytes(3, address)
            .message(8, friend("Bob"))
            .message(8, friend("Cy"))
            .encode()
            .unwrap();
        let person = decode(&bytes);

        let address = person.get_message("address").unwrap();
        assert_eq!(address.type_name(), "demo.Address");
        assert_eq!(address.get_str("city"), Ok("Paris"));
        assert_eq!(address.get_u32("zip"), Ok(75001));

        let friends: Vec<_> = person
            .get_list("friends")
            .unwrap()
            .iter()
            .map(|f| f.as_message().unwrap().get_str("name").unwrap())
            .collect();
        assert_eq!(friends, ["Bob", "Cy"]);
    }

    #[test]
    fn test_map_field() {
        let entry = |key: Option<&str>, value: i64| {
            let mut node = MessageNode::new();
            if let Some(key) = key {
                node = node.field(1, key);
            }
            node.field(2, value)
        };
        let bytes = MessageNode::new()
            .message(7, entry(Some("a"), 1))
            .message(7, entry(Some("b"), 2))
            .message(7, entry(Some("a"), 3))
            .message(7, entry(None, 4))
            .encode()
            .unwrap();
        let person = decode(&bytes);

        let labels = person.get_map("labels").unwrap();
        assert_eq!(
            labels,
            [
                (Scalar::String("a".into()), Structured::Scalar(Scalar::Int64(3))),
                (Scalar::String("b".into()), Structured::Scalar(Scalar::Int64(2))),
                (Scalar::String("".into()), Structured::Scalar(Scalar::Int64(4))),
            ]
        );
    }

    #[test]
    fn test_unresolved_types() {
        #[derive(Debug)]
        struct Case {
            bytes: Vec<u8>,
            field: &'static str,
            expected: Structured,
        }

        let cases = [
            Case {
                bytes: WireBuilder::new().varint(11, 42).finish(),
                field: "legacy",
                expected: Structured::Scalar(Scalar::Int32(42)),
            },
            Case {
                bytes: WireBuilder::new().bytes(9, &[0xff, 0x01]).finish(),
                field: "blob",
                expected: Structured::Scalar(Scalar::Bytes(vec![0xff, 0x01])),
            },
            Case {
                bytes: WireBuilder::new()
                    .bytes(10, &[1])
                    .bytes(10, &[2, 3])
                    .finish(),
                field: "blobs",
                expected: Structured::List(vec![
                    Structured::Scalar(Scalar::Bytes(vec![1])),
                    Structured::Scalar(Scalar::Bytes(vec![2, 3])),
                ]),
            },
        ];

        cases.test_each_value(|case| {
            let person = decode(&case.bytes);
            assert_eq!(person.get(case.field), Some(&case.expected));
            assert_eq!(person.len(), 1);
        });
    }

    #[test]
    fn test_absent_and_wrong_type() {
        let person = decode(&[]);
        assert!(person.is_empty());
        assert_eq!(person.to_string(), "{}");
        assert_eq!(person.get_str("name"), Err(LookupError::NotFound));

        let bytes = MessageNode::new().field(4, "x").encode().unwrap();
        let person = decode(&bytes);
        assert_eq!(
            person.get_str("emails"),
            Err(LookupError::WrongType {
                expected: "scalar",
                found: "list"
            })
        );
    }

    #[test]
    fn test_missing_root() {
        let err = decode_with_schema(&[], &registry(), "demo.Robot", &DecoderOptions::default())
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::SchemaTypeNotFound("demo.Robot".into())
        );

        // Unqualified names are not looked up.
        let err = decode_with_schema(&[], &registry(), "Person", &DecoderOptions::default())
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SchemaTypeNotFound(_)));
    }

    #[test]
    fn test_malformed_input() {
        let bytes = WireBuilder::new()
            .bytes(1, b"Ada")
            .raw(&[0x10, 0xff])
            .finish();

        // Lenient decodes keep the fields before the error.
        let person = decode(&bytes);
        assert_eq!(person.get_str("name"), Ok("Ada"));
        assert!(person.get("id").is_none());

        let options = DecoderOptions {
            throw_on_error: true,
            ..Default::default()
        };
        let err = decode_with_schema(&bytes, &registry(), "demo.Person", &options).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::OutOfRange);
        assert_eq!(err.field(), Some(2));
    }
}
