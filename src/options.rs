use std::borrow::Cow;
use std::path::Path;

use serde::Deserialize;

use crate::errors::FromJsonError;

/// How the bytes of a length-delimited value are converted to a string
/// interpretation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    /// Strict UTF-8. Invalid data produces no string interpretation.
    #[default]
    Utf8,

    /// UTF-8 with invalid sequences replaced by U+FFFD.
    Utf8Lossy,

    /// ISO-8859-1. Every byte maps to the code point with the same value.
    Latin1,
}

impl StringEncoding {
    /// Decode `bytes` as a string, or return `None` if they are invalid in
    /// this encoding.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            Self::Utf8Lossy => Some(String::from_utf8_lossy(bytes)),
            Self::Latin1 => Some(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
        }
    }
}

/// Options that control a schema-less decode.
///
/// This can be created in code or loaded from JSON. Fields missing from the
/// JSON keep their default values.
///
/// ```
/// use protowire::DecoderOptions;
///
/// let opts = DecoderOptions::from_json(r#"{ "max_nesting_depth": 8 }"#)?;
/// assert_eq!(opts.max_nesting_depth, 8);
/// assert!(opts.include_all_possible_types);
/// # Ok::<(), protowire::FromJsonError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Maximum depth of nested messages below the top-level message. A value
    /// of zero disables nested decoding.
    pub max_nesting_depth: usize,

    /// Record every interpretation compatible with a value's wire type. When
    /// false, only one interpretation is recorded per value.
    pub include_all_possible_types: bool,

    /// Collect the values of a field that occurs more than once into a list.
    /// When false, later values replace earlier ones.
    pub handle_repeated_fields: bool,

    /// Try to decode every length-delimited value as a nested message.
    pub attempt_nested_message_deserialization: bool,

    /// Return the first error instead of a partial result.
    pub throw_on_error: bool,

    pub string_encoding: StringEncoding,

    /// Suffix of the key under which the list of a repeated field is
    /// mirrored, eg. `"1(int32)[]"`.
    pub repeated_field_key_suffix: String,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            include_all_possible_types: true,
            handle_repeated_fields: true,
            attempt_nested_message_deserialization: true,
            throw_on_error: false,
            string_encoding: StringEncoding::Utf8,
            repeated_field_key_suffix: "[]".to_string(),
        }
    }
}

impl DecoderOptions {
    /// Parse options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, FromJsonError> {
        serde_json::from_str(json).map_err(FromJsonError::JsonError)
    }

    /// Load options from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FromJsonError> {
        let content = std::fs::read_to_string(path).map_err(FromJsonError::IoError)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use protowire_testing::TestCases;

    use super::{DecoderOptions, StringEncoding};
    use crate::errors::FromJsonError;

    #[test]
    fn test_defaults() {
        let opts = DecoderOptions::default();
        assert_eq!(opts.max_nesting_depth, 64);
        assert!(opts.include_all_possible_types);
        assert!(opts.handle_repeated_fields);
        assert!(opts.attempt_nested_message_deserialization);
        assert!(!opts.throw_on_error);
        assert_eq!(opts.string_encoding, StringEncoding::Utf8);
        assert_eq!(opts.repeated_field_key_suffix, "[]");

        assert_eq!(DecoderOptions::from_json("{}").unwrap(), opts);
    }

    #[test]
    fn test_from_json() {
        let opts = DecoderOptions::from_json(
            r#"{
                "throw_on_error": true,
                "string_encoding": "latin1",
                "repeated_field_key_suffix": "_list"
            }"#,
        )
        .unwrap();
        assert!(opts.throw_on_error);
        assert_eq!(opts.string_encoding, StringEncoding::Latin1);
        assert_eq!(opts.repeated_field_key_suffix, "_list");
        assert_eq!(opts.max_nesting_depth, 64);

        let err = DecoderOptions::from_json(r#"{ "max_nesting_depth": -1 }"#).unwrap_err();
        assert!(matches!(err, FromJsonError::JsonError(_)));
    }

    #[test]
    fn test_string_encoding() {
        #[derive(Debug)]
        struct Case {
            encoding: StringEncoding,
            bytes: &'static [u8],
            expected: Option<&'static str>,
        }

        let cases = [
            Case {
                encoding: StringEncoding::Utf8,
                bytes: "héllo".as_bytes(),
                expected: Some("héllo"),
            },
            Case {
                encoding: StringEncoding::Utf8,
                bytes: &[0xff, 0x41],
                expected: None,
            },
            Case {
                encoding: StringEncoding::Utf8Lossy,
                bytes: &[0xff, 0x41],
                expected: Some("\u{fffd}A"),
            },
            Case {
                encoding: StringEncoding::Latin1,
                bytes: &[0x63, 0x61, 0x66, 0xe9],
                expected: Some("café"),
            },
        ];

        cases.test_each(|case| {
            let decoded = case.encoding.decode(case.bytes);
            assert_eq!(decoded.as_deref(), case.expected);
        });
    }
}
