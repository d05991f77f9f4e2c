//! Clarity value wire format: the type-tagged binary encoding returned by
//! read-only contract calls and carried in transaction call arguments.
//!
//! - `decode`: bytes / hex → `ClarityValue`, plus typed helpers
//!   (`decode_uint`, `decode_tuple`, ...)
//! - `encode`: `ClarityValue` → bytes / hex, used for call arguments
//! - `principal`: c32check rendering and validation of account identifiers

pub mod decode;
pub mod encode;
pub mod principal;

use std::collections::BTreeMap;
use std::fmt;

pub use decode::{
    decode_ascii_string, decode_bool, decode_hex, decode_principal, decode_tuple, decode_uint,
    decode_value, DecodeError, DecodeErrorKind,
};
pub use encode::{encode_ascii_string, encode_bool, encode_uint, to_hex};
pub use principal::Principal;

// ─── Type tags ───────────────────────────────────────────────────────────────

pub const TAG_INT: u8 = 0x00;
pub const TAG_UINT: u8 = 0x01;
pub const TAG_BUFFER: u8 = 0x02;
pub const TAG_TRUE: u8 = 0x03;
pub const TAG_FALSE: u8 = 0x04;
pub const TAG_STANDARD_PRINCIPAL: u8 = 0x05;
pub const TAG_CONTRACT_PRINCIPAL: u8 = 0x06;
pub const TAG_RESPONSE_OK: u8 = 0x07;
pub const TAG_RESPONSE_ERR: u8 = 0x08;
pub const TAG_OPTIONAL_NONE: u8 = 0x09;
pub const TAG_OPTIONAL_SOME: u8 = 0x0a;
pub const TAG_LIST: u8 = 0x0b;
pub const TAG_TUPLE: u8 = 0x0c;
pub const TAG_STRING_ASCII: u8 = 0x0d;
pub const TAG_STRING_UTF8: u8 = 0x0e;

/// A decoded Clarity value.
///
/// Tuples are kept in a `BTreeMap`, so two encodings that differ only in
/// field order decode to equal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    Principal(Principal),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(BTreeMap<String, ClarityValue>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    /// Short type label used in decode errors and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Buffer(_) => "buffer",
            Self::Bool(_) => "bool",
            Self::Principal(_) => "principal",
            Self::ResponseOk(_) => "response-ok",
            Self::ResponseErr(_) => "response-err",
            Self::OptionalNone => "none",
            Self::OptionalSome(_) => "some",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::StringAscii(_) => "string-ascii",
            Self::StringUtf8(_) => "string-utf8",
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringAscii(s) | Self::StringUtf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_principal(&self) -> Option<&Principal> {
        match self {
            Self::Principal(p) => Some(p),
            _ => None,
        }
    }

    /// Strip a `(ok ...)` wrapper if present. `(err ...)` is returned as-is
    /// so the caller can decide how to surface it.
    pub fn unwrap_ok(self) -> ClarityValue {
        match self {
            Self::ResponseOk(inner) => *inner,
            other => other,
        }
    }

    /// Collapse an optional: `none` → `None`, `(some v)` → `Some(v)`,
    /// anything else is treated as already present.
    pub fn into_optional(self) -> Option<ClarityValue> {
        match self {
            Self::OptionalNone => None,
            Self::OptionalSome(inner) => Some(*inner),
            other => Some(other),
        }
    }
}

impl fmt::Display for ClarityValue {
    /// Renders the Clarity `repr` syntax, e.g. `u5`, `(ok true)`,
    /// `(tuple (title "x"))`. For logging only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "u{v}"),
            Self::Buffer(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Principal(p) => write!(f, "'{p}"),
            Self::ResponseOk(v) => write!(f, "(ok {v})"),
            Self::ResponseErr(v) => write!(f, "(err {v})"),
            Self::OptionalNone => write!(f, "none"),
            Self::OptionalSome(v) => write!(f, "(some {v})"),
            Self::List(items) => {
                write!(f, "(list")?;
                for item in items {
                    write!(f, " {item}")?;
                }
                write!(f, ")")
            }
            Self::Tuple(fields) => {
                write!(f, "(tuple")?;
                for (name, value) in fields {
                    write!(f, " ({name} {value})")?;
                }
                write!(f, ")")
            }
            Self::StringAscii(s) => write!(f, "{s:?}"),
            Self::StringUtf8(s) => write!(f, "u{s:?}"),
        }
    }
}
