//! Message descriptors and the resolved type table.
//!
//! Descriptors are produced by a `.proto` parser outside this crate, either
//! constructed in code or deserialized from JSON. [`TypeRegistry`] resolves
//! every type reference in them once, up front, so that decoding only needs
//! table lookups.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::errors::FromJsonError;
use crate::value::ValueType;

/// Descriptors from one `.proto` file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaFile {
    /// Package name, eg. `"google.protobuf"`. Empty if the file has no
    /// package statement.
    pub package: String,
    pub messages: Vec<SchemaMessage>,
    pub enums: Vec<SchemaEnum>,

    /// `extend` blocks at the top level of the file.
    pub extensions: Vec<SchemaExtension>,
}

impl SchemaFile {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    pub fn message(mut self, message: SchemaMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enum_type(mut self, enum_type: SchemaEnum) -> Self {
        self.enums.push(enum_type);
        self
    }

    pub fn extension(mut self, extension: SchemaExtension) -> Self {
        self.extensions.push(extension);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaMessage {
    /// Simple name of the message, without package or enclosing messages.
    pub name: String,
    pub fields: Vec<SchemaField>,
    pub oneofs: Vec<SchemaOneof>,
    pub nested_messages: Vec<SchemaMessage>,
    pub nested_enums: Vec<SchemaEnum>,

    /// `extend` blocks declared inside this message.
    pub extensions: Vec<SchemaExtension>,
}

impl SchemaMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn oneof(mut self, oneof: SchemaOneof) -> Self {
        self.oneofs.push(oneof);
        self
    }

    pub fn nested_message(mut self, message: SchemaMessage) -> Self {
        self.nested_messages.push(message);
        self
    }

    pub fn nested_enum(mut self, enum_type: SchemaEnum) -> Self {
        self.nested_enums.push(enum_type);
        self
    }

    pub fn extension(mut self, extension: SchemaExtension) -> Self {
        self.extensions.push(extension);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaField {
    pub name: String,
    pub number: u32,

    /// Declared type: a scalar keyword or the name of a message or enum,
    /// as written in the source. For map fields this is the value type.
    #[serde(rename = "type")]
    pub type_name: String,
    pub repeated: bool,

    /// Key type of a `map<K, V>` field.
    pub map_key: Option<String>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number,
            type_name: type_name.into(),
            repeated: false,
            map_key: None,
        }
    }

    /// Create a `repeated` field.
    pub fn repeated(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self {
            repeated: true,
            ..Self::new(name, number, type_name)
        }
    }

    /// Create a `map<key_type, value_type>` field.
    pub fn map(
        name: impl Into<String>,
        number: u32,
        key_type: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            map_key: Some(key_type.into()),
            ..Self::new(name, number, value_type)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaOneof {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaEnum {
    pub name: String,
    pub values: Vec<SchemaEnumValue>,
}

impl SchemaEnum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push(SchemaEnumValue {
            name: name.into(),
            number,
        });
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaEnumValue {
    pub name: String,
    pub number: i32,
}

/// An `extend Type { ... }` block.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchemaExtension {
    /// Name of the extended message, as written in the source.
    pub extendee: String,
    pub fields: Vec<SchemaField>,
}

impl SchemaExtension {
    pub fn new(extendee: impl Into<String>) -> Self {
        Self {
            extendee: extendee.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }
}

/// Resolved type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// A scalar type keyword such as `int32` or `string`.
    Scalar(ValueType),

    /// An enum type, with its fully qualified name.
    Enum(String),

    /// A message type, with its fully qualified name.
    Message(String),

    /// A `map<K, V>` field.
    Map {
        key: ValueType,
        value: Box<FieldKind>,
    },

    /// A type name that matched no known message or enum.
    Unresolved(String),
}

/// A field with its type resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub number: u32,
    pub repeated: bool,
    pub kind: FieldKind,
}

/// A message with all fields resolved, including fields from `oneof`s and
/// from extensions.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMessage {
    /// Fully qualified name, eg. `"pkg.Outer.Inner"`.
    pub full_name: String,

    /// Fields in declaration order: regular fields, then `oneof` fields, then
    /// extension fields.
    pub fields: Vec<ResolvedField>,
}

/// Table of all messages known to a decode, keyed by fully qualified name.
///
/// ```
/// use protowire::{FieldKind, SchemaField, SchemaFile, SchemaMessage, TypeRegistry};
///
/// let file = SchemaFile::new("zoo")
///     .message(
///         SchemaMessage::new("Animal")
///             .field(SchemaField::new("name", 1, "string"))
///             .field(SchemaField::new("habitat", 2, "Habitat")),
///     )
///     .message(SchemaMessage::new("Habitat"));
/// let registry = TypeRegistry::new(&[file]);
///
/// let animal = registry.message("zoo.Animal").unwrap();
/// assert_eq!(animal.fields[1].kind, FieldKind::Message("zoo.Habitat".into()));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    messages: FxHashMap<String, ResolvedMessage>,
    enums: FxHashSet<String>,

    /// Distinct package names, in file order.
    packages: Vec<String>,
}

/// Join a scope and a name with a `.`, unless the scope is empty.
fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// A message declaration paired with its fully qualified name.
struct Declared<'a> {
    full_name: String,
    message: &'a SchemaMessage,
}

/// Declared extension paired with the scope it was declared in.
struct DeclaredExtension<'a> {
    scope: String,
    extension: &'a SchemaExtension,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaJson {
    Files(Vec<SchemaFile>),
    File(SchemaFile),
}

impl TypeRegistry {
    /// Build the table from a set of files.
    ///
    /// If several files declare a message with the same qualified name, the
    /// first declaration is used.
    pub fn new(files: &[SchemaFile]) -> Self {
        let mut declared = Vec::new();
        let mut extensions = Vec::new();
        let mut enums = FxHashSet::default();

        for file in files {
            for enum_type in &file.enums {
                enums.insert(qualify(&file.package, &enum_type.name));
            }
            for extension in &file.extensions {
                extensions.push(DeclaredExtension {
                    scope: file.package.clone(),
                    extension,
                });
            }
            for message in &file.messages {
                collect_message(
                    &file.package,
                    message,
                    &mut declared,
                    &mut extensions,
                    &mut enums,
                );
            }
        }

        let mut packages: Vec<String> = Vec::new();
        for file in files {
            if !file.package.is_empty() && !packages.contains(&file.package) {
                packages.push(file.package.clone());
            }
        }

        let mut registry = TypeRegistry {
            messages: FxHashMap::default(),
            enums,
            packages,
        };
        let names: FxHashSet<&str> = declared.iter().map(|d| d.full_name.as_str()).collect();

        for Declared { full_name, message } in &declared {
            if registry.messages.contains_key(full_name) {
                continue;
            }
            let oneof_fields = message.oneofs.iter().flat_map(|o| &o.fields);
            let fields = message
                .fields
                .iter()
                .chain(oneof_fields)
                .map(|field| registry.resolve_field(field, full_name, &names))
                .collect();
            registry.messages.insert(
                full_name.clone(),
                ResolvedMessage {
                    full_name: full_name.clone(),
                    fields,
                },
            );
        }

        for DeclaredExtension { scope, extension } in &extensions {
            let Some(target) = registry.resolve_name(&extension.extendee, scope, |name| {
                names.contains(name)
            }) else {
                log::warn!(
                    "extended message '{}' not found in scope '{}'",
                    extension.extendee,
                    scope
                );
                continue;
            };
            let fields: Vec<_> = extension
                .fields
                .iter()
                .map(|field| registry.resolve_field(field, scope, &names))
                .collect();
            if let Some(message) = registry.messages.get_mut(&target) {
                message.fields.extend(fields);
            }
        }

        registry
    }

    /// Parse descriptors from JSON and build the table.
    ///
    /// The JSON may hold a single [`SchemaFile`] object or an array of them.
    pub fn from_json(json: &str) -> Result<Self, FromJsonError> {
        let files = match serde_json::from_str(json).map_err(FromJsonError::JsonError)? {
            SchemaJson::Files(files) => files,
            SchemaJson::File(file) => vec![file],
        };
        Ok(Self::new(&files))
    }

    /// Load descriptors from a JSON file. See [`from_json`](Self::from_json).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, FromJsonError> {
        let content = std::fs::read_to_string(path).map_err(FromJsonError::IoError)?;
        Self::from_json(&content)
    }

    /// Look up a message by fully qualified name. A leading `.` is ignored.
    pub fn message(&self, full_name: &str) -> Option<&ResolvedMessage> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.messages.get(full_name)
    }

    /// Return true if `full_name` is a known enum.
    pub fn is_enum(&self, full_name: &str) -> bool {
        self.enums.contains(full_name.strip_prefix('.').unwrap_or(full_name))
    }

    /// Return the fully qualified names of all messages, sorted.
    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn resolve_field(
        &self,
        field: &SchemaField,
        scope: &str,
        messages: &FxHashSet<&str>,
    ) -> ResolvedField {
        let value_kind = self.resolve_type(&field.type_name, scope, messages);
        let (kind, repeated) = match &field.map_key {
            Some(key_name) if ValueType::is_scalar_keyword(key_name) => {
                let kind = match ValueType::from_name(key_name) {
                    Some(key) => FieldKind::Map {
                        key,
                        value: Box::new(value_kind),
                    },
                    None => FieldKind::Unresolved(key_name.clone()),
                };
                (kind, true)
            }
            Some(key_name) => (
                FieldKind::Unresolved(format!("map<{}, {}>", key_name, field.type_name)),
                true,
            ),
            None => (value_kind, field.repeated),
        };
        ResolvedField {
            name: field.name.clone(),
            number: field.number,
            repeated,
            kind,
        }
    }

    fn resolve_type(&self, type_name: &str, scope: &str, messages: &FxHashSet<&str>) -> FieldKind {
        if ValueType::is_scalar_keyword(type_name) {
            if let Some(ty) = ValueType::from_name(type_name) {
                return FieldKind::Scalar(ty);
            }
        }
        let exists = |name: &str| messages.contains(name) || self.enums.contains(name);
        match self.resolve_name(type_name, scope, exists) {
            Some(name) if messages.contains(name.as_str()) => FieldKind::Message(name),
            Some(name) => FieldKind::Enum(name),
            None => FieldKind::Unresolved(type_name.to_string()),
        }
    }

    /// Find the fully qualified name that `name`, used inside `scope`,
    /// refers to.
    ///
    /// A name starting with `.` is already fully qualified. Otherwise the
    /// name is looked up in `scope` and then in each enclosing scope, then
    /// as written, then by its last segment alone, and finally inside each
    /// known package.
    fn resolve_name(
        &self,
        name: &str,
        scope: &str,
        exists: impl Fn(&str) -> bool,
    ) -> Option<String> {
        if let Some(full_name) = name.strip_prefix('.') {
            return exists(full_name).then(|| full_name.to_string());
        }

        let mut scope = scope;
        loop {
            let candidate = qualify(scope, name);
            if exists(candidate.as_str()) {
                return Some(candidate);
            }
            if scope.is_empty() {
                break;
            }
            scope = scope.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("");
        }

        if let Some((_, bare)) = name.rsplit_once('.') {
            if exists(bare) {
                return Some(bare.to_string());
            }
        }

        self.packages
            .iter()
            .map(|package| qualify(package, name))
            .find(|candidate| exists(candidate.as_str()))
    }
}

fn collect_message<'a>(
    scope: &str,
    message: &'a SchemaMessage,
    declared: &mut Vec<Declared<'a>>,
    extensions: &mut Vec<DeclaredExtension<'a>>,
    enums: &mut FxHashSet<String>,
) {
    let full_name = qualify(scope, &message.name);
    for enum_type in &message.nested_enums {
        enums.insert(qualify(&full_name, &enum_type.name));
    }
    for extension in &message.extensions {
        extensions.push(DeclaredExtension {
            scope: full_name.clone(),
            extension,
        });
    }
    for nested in &message.nested_messages {
        collect_message(&full_name, nested, declared, extensions, enums);
    }
    declared.push(Declared { full_name, message });
}
