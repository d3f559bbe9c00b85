//! Error types.
//!
//! One enum per concern. The decoding core only ever returns these; it is up
//! to the batch orchestrator (or the caller) to decide whether a failure is
//! logged and skipped or surfaced.

use std::fmt;

use serde_json::Value;

/// Failure while reading the protobuf wire format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("exhausted buffer at offset {offset}: needed {needed} bytes, {available} available")]
    Exhausted {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType { wire_type: u8, offset: usize },

    #[error("varint longer than 10 bytes at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("invalid field number 0 at offset {offset}")]
    InvalidFieldNumber { offset: usize },
}

/// Failure parsing a read path-query or a write path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid path `{path}` at position {position}: {message}")]
    Syntax {
        path: String,
        position: usize,
        message: String,
    },

    #[error("invalid output path `{path}`: {reason}")]
    InvalidOutput { path: String, reason: String },
}

/// Failure inside a single step function.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("gunzip failed: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] WireError),

    #[error("invalid JWT: {0}")]
    Jwt(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: ValueKind,
    },
}

/// Failure of a whole decode run. The index is the position of the
/// offending step in the adapter's pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("step {index} ({function}) failed: {source}")]
    Step {
        index: usize,
        function: &'static str,
        #[source]
        source: StepError,
    },

    #[error("step {index}: mapInput `{path}` resolved to {found}, expected an array")]
    MapInputNotArray {
        index: usize,
        path: String,
        found: ValueKind,
    },

    #[error("step {index}: cannot write `{path}` through a non-container value")]
    OutputConflict { index: usize, path: String },
}

/// Failure loading or validating an adapter catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("adapter {adapter}: {message}")]
    InvalidAdapter { adapter: String, message: String },

    #[error("duplicate adapter id {0}")]
    DuplicateAdapter(String),

    #[error("adapter {adapter} declares tracker {declared} but is listed under {enclosing}")]
    TrackerMismatch {
        adapter: String,
        declared: String,
        enclosing: String,
    },
}

/// Failure flattening a HAR document.
#[derive(Debug, thiserror::Error)]
pub enum HarError {
    #[error("invalid HAR JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid base64 body in entry {entry}: {source}")]
    Body {
        entry: usize,
        #[source]
        source: base64::DecodeError,
    },
}

/// Coarse JSON value type, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}
