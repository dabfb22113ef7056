use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::varint::VarintError;

/// Errors encoding or decoding Protocol Buffers messages.
#[derive(Debug)]
pub struct ProtobufError {
    kind: ErrorKind,
    field: Option<u32>,
    wire_type: Option<u8>,
    context: Option<String>,
}

impl ProtobufError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            field: None,
            wire_type: None,
            context: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Return the field number that was being processed when the error
    /// occurred.
    pub fn field(&self) -> Option<u32> {
        self.field
    }

    /// Return the raw wire type of the field being processed.
    pub fn wire_type(&self) -> Option<u8> {
        self.wire_type
    }

    /// Return the message type associated with this error, if known.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Associate the field number and wire type in progress with this error.
    ///
    /// Location information that is already present is kept, so that errors
    /// raised inside nested messages report the innermost field.
    pub fn with_field(mut self, field: u32, wire_type: u8) -> Self {
        if self.field.is_none() {
            self.field = Some(field);
            self.wire_type = Some(wire_type);
        }
        self
    }

    /// Associate a message type name with this error.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if self.context.is_none() {
            self.context = Some(context.into());
        }
        self
    }
}

impl Display for ProtobufError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "error in message {}", context)?;
        } else {
            write!(f, "error")?;
        }
        if let Some(field) = self.field {
            write!(f, " field {}", field)?;
        }
        if let Some(wire_type) = self.wire_type {
            write!(f, " (wire type {})", wire_type)?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl Error for ProtobufError {}

impl From<ErrorKind> for ProtobufError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<VarintError> for ProtobufError {
    fn from(val: VarintError) -> Self {
        match val {
            VarintError::Eof => Self::new(ErrorKind::OutOfRange),
            VarintError::InvalidVarint => Self::new(ErrorKind::MalformedVarint),
        }
    }
}

/// Enum describing the kind of a [`ProtobufError`] error.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A read needed more bytes than remain in the buffer, or a position
    /// outside the buffer was requested.
    OutOfRange,

    /// A varint was longer than 10 bytes or encoded more than 64 bits.
    MalformedVarint,

    /// A tag used a wire type this codec does not handle.
    ///
    /// Protocol Buffers uses 3 bits for the wire type but only defines six
    /// values, two of which (the deprecated group markers) are only skipped.
    UnsupportedWireType(u8),

    /// A field number was zero or above
    /// [`MAX_FIELD_NUMBER`](crate::wire::MAX_FIELD_NUMBER).
    InvalidFieldNumber,

    /// A string field contained invalid UTF-8.
    InvalidUtf8,

    /// A value in an encoder input graph cannot be expressed on the wire.
    UnsupportedEncodeValueKind(&'static str),

    /// Nested messages exceeded the configured maximum depth.
    NestingDepthExceeded(usize),

    /// A message type name could not be found in the schema.
    SchemaTypeNotFound(String),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::OutOfRange => write!(f, "read past end of buffer"),
            ErrorKind::MalformedVarint => write!(f, "malformed varint"),
            ErrorKind::UnsupportedWireType(wt) => write!(f, "unsupported wire type {}", wt),
            ErrorKind::InvalidFieldNumber => write!(f, "invalid field number"),
            ErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8 in string"),
            ErrorKind::UnsupportedEncodeValueKind(kind) => {
                write!(f, "unsupported value kind for encoding: {}", kind)
            }
            ErrorKind::NestingDepthExceeded(max) => {
                write!(f, "maximum nesting depth of {} exceeded", max)
            }
            ErrorKind::SchemaTypeNotFound(name) => {
                write!(f, "message type '{}' not found in schema", name)
            }
        }
    }
}

/// Errors returned when loading descriptors or options from JSON.
#[derive(Debug)]
pub enum FromJsonError {
    /// There was an error reading the JSON data from a file.
    IoError(std::io::Error),
    /// There was an error decoding the JSON data.
    JsonError(serde_json::Error),
}

impl Display for FromJsonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(err) => Display::fmt(err, f),
            Self::JsonError(err) => write!(f, "JSON error {}", err),
        }
    }
}

impl Error for FromJsonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::JsonError(err) => Some(err),
        }
    }
}
