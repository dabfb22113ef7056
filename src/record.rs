//! Result shapes of the schema-less decoder.
//!
//! Both shapes hold the same data, one entry per `(field number, value type)`
//! pair, in the order the entries were first seen. They differ in how entries
//! are addressed:
//!
//! - [`RawRecord`] uses keys of the form `"{field}({type})"`, eg. `"1(int32)"`.
//! - [`PropertyTree`] uses names of the form `"{Type}_{field}"`, eg. `"Int32_1"`.
//!
//! A key which was written more than once holds a list. The list can also be
//! addressed by the key followed by the configured repeated-field suffix, eg.
//! `"1(int32)[]"`. The suffixed key is a view onto the same list.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::options::DecoderOptions;
use crate::value::{Entry, LookupError, Scalar, Value, ValueType};

/// Receiver for the values produced by
/// [`SchemalessDecoder`](crate::SchemalessDecoder).
pub trait FieldSink: Sized {
    /// Create an empty container configured by `options`.
    fn new(options: &DecoderOptions) -> Self;

    /// Record one interpretation of one field occurrence.
    fn insert(&mut self, field_number: u32, ty: ValueType, value: Value<Self>);
}

/// Ordered `(field, type) -> Entry` table shared by both result shapes.
#[derive(Clone, Debug)]
struct FieldTable<M> {
    entries: Vec<(u32, ValueType, Entry<M>)>,
    index: FxHashMap<(u32, ValueType), usize>,
    merge_repeated: bool,
    suffix: String,
}

impl<M> FieldTable<M> {
    fn new(options: &DecoderOptions) -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
            merge_repeated: options.handle_repeated_fields,
            suffix: options.repeated_field_key_suffix.clone(),
        }
    }

    fn insert(&mut self, field_number: u32, ty: ValueType, value: Value<M>) {
        let key = (field_number, ty);
        if let Some(&idx) = self.index.get(&key) {
            let entry = &mut self.entries[idx].2;
            if self.merge_repeated {
                entry.push(value);
            } else {
                *entry = Entry::Single(value);
            }
        } else {
            self.index.insert(key, self.entries.len());
            self.entries.push((field_number, ty, Entry::Single(value)));
        }
    }

    fn get(&self, field_number: u32, ty: ValueType) -> Option<&Entry<M>> {
        let idx = *self.index.get(&(field_number, ty))?;
        Some(&self.entries[idx].2)
    }

    /// Look up an entry, or the list mirror of a repeated entry if `mirror`
    /// is true.
    fn get_or_mirror(&self, field_number: u32, ty: ValueType, mirror: bool) -> Option<&Entry<M>> {
        self.get(field_number, ty)
            .filter(|entry| !mirror || entry.is_repeated())
    }

    /// Split the repeated-field suffix from a key, if present.
    fn strip_suffix<'a>(&self, key: &'a str) -> (&'a str, bool) {
        if self.suffix.is_empty() {
            return (key, false);
        }
        match key.strip_suffix(self.suffix.as_str()) {
            Some(base) => (base, true),
            None => (key, false),
        }
    }

    /// Return the latest value of an entry.
    fn last(&self, field_number: u32, ty: ValueType) -> Result<&Value<M>, LookupError> {
        self.get(field_number, ty)
            .and_then(Entry::last)
            .ok_or(LookupError::NotFound)
    }

    fn scalar(&self, field_number: u32, ty: ValueType) -> Result<&Scalar, LookupError> {
        self.last(field_number, ty)?.as_scalar()
    }

    fn field_numbers(&self) -> Vec<u32> {
        let mut seen = FxHashSet::default();
        self.entries
            .iter()
            .map(|(field_number, _, _)| *field_number)
            .filter(|field_number| seen.insert(*field_number))
            .collect()
    }

    fn types(&self, field_number: u32) -> impl Iterator<Item = ValueType> + '_ {
        self.entries
            .iter()
            .filter(move |(n, _, _)| *n == field_number)
            .map(|(_, ty, _)| *ty)
    }

    /// Return all keys, rendered by `render`, followed by a mirror key for
    /// each repeated entry.
    fn keys(&self, render: impl Fn(u32, ValueType) -> String) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.entries.len());
        for (field_number, ty, entry) in &self.entries {
            let key = render(*field_number, *ty);
            let mirror = entry
                .is_repeated()
                .then(|| format!("{}{}", key, self.suffix));
            keys.push(key);
            keys.extend(mirror);
        }
        keys
    }

    fn fmt_with(
        &self,
        f: &mut fmt::Formatter<'_>,
        render: impl Fn(u32, ValueType) -> String,
    ) -> fmt::Result
    where
        M: fmt::Display,
    {
        write!(f, "{{")?;
        for (i, (field_number, ty, entry)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: ", render(*field_number, *ty))?;
            match entry {
                Entry::Single(value) => fmt_value(f, value)?,
                Entry::Repeated(values) => {
                    write!(f, "[")?;
                    for (j, value) in values.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        fmt_value(f, value)?;
                    }
                    write!(f, "]")?;
                }
            }
        }
        if self.entries.is_empty() {
            write!(f, "}}")
        } else {
            write!(f, " }}")
        }
    }
}

fn fmt_value<M: fmt::Display>(f: &mut fmt::Formatter<'_>, value: &Value<M>) -> fmt::Result {
    match value {
        Value::Scalar(s) => write!(f, "{}", s),
        Value::Packed(vals) => {
            write!(f, "packed[")?;
            for (i, s) in vals.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", s)?;
            }
            write!(f, "]")
        }
        Value::Message(msg) => write!(f, "{}", msg),
    }
}

impl<M: PartialEq> PartialEq for FieldTable<M> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// Typed accessors which return the latest scalar value of an entry.
macro_rules! typed_getters {
    ($key:ty, $lookup:ident) => {
        pub fn get_i32(&self, key: $key) -> Result<i32, LookupError> {
            self.$lookup(key)?.as_i32()
        }

        pub fn get_i64(&self, key: $key) -> Result<i64, LookupError> {
            self.$lookup(key)?.as_i64()
        }

        pub fn get_u32(&self, key: $key) -> Result<u32, LookupError> {
            self.$lookup(key)?.as_u32()
        }

        pub fn get_u64(&self, key: $key) -> Result<u64, LookupError> {
            self.$lookup(key)?.as_u64()
        }

        pub fn get_bool(&self, key: $key) -> Result<bool, LookupError> {
            self.$lookup(key)?.as_bool()
        }

        pub fn get_f32(&self, key: $key) -> Result<f32, LookupError> {
            self.$lookup(key)?.as_f32()
        }

        pub fn get_f64(&self, key: $key) -> Result<f64, LookupError> {
            self.$lookup(key)?.as_f64()
        }

        pub fn get_str(&self, key: $key) -> Result<&str, LookupError> {
            self.$lookup(key)?.as_str()
        }

        pub fn get_bytes(&self, key: $key) -> Result<&[u8], LookupError> {
            self.$lookup(key)?.as_bytes()
        }
    };
}

/// Flat result of a schema-less decode, keyed by `"{field}({type})"`.
///
/// ```
/// use protowire::{decode_record, DecoderOptions, ValueType};
///
/// // Field 1 = 150, field 2 = "hi"
/// let bytes = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'];
/// let record = decode_record(&bytes, &DecoderOptions::default())?;
///
/// assert_eq!(record.get_u32((1, ValueType::UInt32)), Ok(150));
/// assert_eq!(record.get_i32((1, ValueType::SInt32)), Ok(75));
/// assert_eq!(record.get_str((2, ValueType::String)), Ok("hi"));
/// assert!(record.get_key("1(bool)").is_some());
/// # Ok::<(), protowire::ProtobufError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    table: FieldTable<RawRecord>,
}

impl FieldSink for RawRecord {
    fn new(options: &DecoderOptions) -> Self {
        Self {
            table: FieldTable::new(options),
        }
    }

    fn insert(&mut self, field_number: u32, ty: ValueType, value: Value<Self>) {
        self.table.insert(field_number, ty, value);
    }
}

impl Default for RawRecord {
    fn default() -> Self {
        <Self as FieldSink>::new(&DecoderOptions::default())
    }
}

/// Render the key of an entry in a [`RawRecord`].
pub fn record_key(field_number: u32, ty: ValueType) -> String {
    format!("{}({})", field_number, ty.name())
}

impl RawRecord {
    /// Return the entry for a field decoded as type `ty`.
    pub fn get(&self, field_number: u32, ty: ValueType) -> Option<&Entry<RawRecord>> {
        self.table.get(field_number, ty)
    }

    /// Look up an entry by its string key, eg. `"1(int32)"` or `"1(int32)[]"`.
    ///
    /// The suffixed form only exists for entries that hold a list.
    pub fn get_key(&self, key: &str) -> Option<&Entry<RawRecord>> {
        let (base, mirror) = self.table.strip_suffix(key);
        let (number, ty) = base.split_once('(')?;
        let ty = ValueType::from_name(ty.strip_suffix(')')?)?;
        let number = number.parse().ok()?;
        self.table.get_or_mirror(number, ty, mirror)
    }

    /// Return every scalar recorded for a field decoded as `ty`, in wire
    /// order. Packed runs are flattened.
    pub fn get_repeated(&self, field_number: u32, ty: ValueType) -> Vec<&Scalar> {
        self.get(field_number, ty)
            .map(|entry| entry.values().iter().flat_map(Value::scalars).collect())
            .unwrap_or_default()
    }

    fn scalar_at(&self, (field_number, ty): (u32, ValueType)) -> Result<&Scalar, LookupError> {
        self.table.scalar(field_number, ty)
    }

    typed_getters!((u32, ValueType), scalar_at);

    /// Return the latest nested-message interpretation of a field.
    pub fn nested(&self, field_number: u32) -> Result<&RawRecord, LookupError> {
        self.table.last(field_number, ValueType::Message)?.as_message()
    }

    /// Return every nested-message interpretation of a field, in wire order.
    pub fn repeated_nested(&self, field_number: u32) -> Vec<&RawRecord> {
        self.get(field_number, ValueType::Message)
            .map(|entry| {
                entry
                    .values()
                    .iter()
                    .filter_map(|v| v.as_message().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Return the distinct field numbers in the order they were first seen.
    pub fn field_numbers(&self) -> Vec<u32> {
        self.table.field_numbers()
    }

    /// Return the names of the types a field was decoded as.
    pub fn type_names(&self, field_number: u32) -> Vec<&'static str> {
        self.table.types(field_number).map(ValueType::name).collect()
    }

    /// Return all keys, including the list mirror keys of repeated entries.
    pub fn keys(&self) -> Vec<String> {
        self.table.keys(record_key)
    }

    /// Iterate over `(field_number, type, entry)` in first-seen order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, ValueType, &Entry<RawRecord>)> {
        self.table.entries.iter().map(|(n, ty, e)| (*n, *ty, e))
    }

    /// Return the number of entries, not counting list mirrors.
    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.table.fmt_with(f, record_key)
    }
}

/// Nested result of a schema-less decode, addressed by property names of the
/// form `"{Type}_{field}"`.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyTree {
    table: FieldTable<PropertyTree>,
}

impl FieldSink for PropertyTree {
    fn new(options: &DecoderOptions) -> Self {
        Self {
            table: FieldTable::new(options),
        }
    }

    fn insert(&mut self, field_number: u32, ty: ValueType, value: Value<Self>) {
        self.table.insert(field_number, ty, value);
    }
}

impl Default for PropertyTree {
    fn default() -> Self {
        <Self as FieldSink>::new(&DecoderOptions::default())
    }
}

/// Render the name of an entry in a [`PropertyTree`].
pub fn property_name(field_number: u32, ty: ValueType) -> String {
    format!("{}_{}", ty.property_name(), field_number)
}

impl PropertyTree {
    /// Return the entry with a given property name, eg. `"SInt64_2"` or
    /// `"SInt64_2[]"`.
    pub fn get(&self, name: &str) -> Option<&Entry<PropertyTree>> {
        let (number, ty, mirror) = self.parse_name(name)?;
        self.table.get_or_mirror(number, ty, mirror)
    }

    fn parse_name(&self, name: &str) -> Option<(u32, ValueType, bool)> {
        let (base, mirror) = self.table.strip_suffix(name);
        let (ty, number) = base.rsplit_once('_')?;
        Some((
            number.parse().ok()?,
            ValueType::from_property_name(ty)?,
            mirror,
        ))
    }

    fn scalar_named(&self, name: &str) -> Result<&Scalar, LookupError> {
        let (number, ty, mirror) = self.parse_name(name).ok_or(LookupError::NotFound)?;
        if mirror {
            return Err(LookupError::WrongType {
                expected: "scalar",
                found: "list",
            });
        }
        self.table.scalar(number, ty)
    }

    typed_getters!(&str, scalar_named);

    /// Return the latest nested message stored under `name`, eg. `"Message_3"`.
    pub fn nested(&self, name: &str) -> Result<&PropertyTree, LookupError> {
        let entry = self.get(name).ok_or(LookupError::NotFound)?;
        entry.last().ok_or(LookupError::NotFound)?.as_message()
    }

    /// Return all property names, including list mirrors.
    pub fn names(&self) -> Vec<String> {
        self.table.keys(property_name)
    }

    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }
}

impl fmt::Display for PropertyTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.table.fmt_with(f, property_name)
    }
}
