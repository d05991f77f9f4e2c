use super::principal::Principal;
use super::*;
use std::collections::BTreeMap;
use thiserror::Error;

/// Clarity caps type nesting at 32; anything deeper is malformed.
const MAX_DEPTH: usize = 32;

/// Tuple field names and contract names are at most 128 bytes.
const MAX_NAME_LEN: usize = 128;

/// A malformed or truncated wire value.
///
/// `offset` is the byte position where decoding failed. For type mismatches
/// detected after a value was fully decoded, it is the start of that value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("unexpected end of input, needed {needed} more bytes")]
    UnexpectedEnd { needed: usize },
    #[error("unknown type tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("non-ASCII byte 0x{0:02x} in string-ascii")]
    InvalidAscii(u8),
    #[error("invalid UTF-8 in string-utf8")]
    InvalidUtf8,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("principal version {0} out of range")]
    InvalidPrincipalVersion(u8),
    #[error("missing tuple field `{0}`")]
    MissingField(String),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("nesting deeper than 32 levels")]
    DepthExceeded,
}

impl DecodeError {
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }

    pub(crate) fn mismatch(offset: usize, expected: &'static str, found: &ClarityValue) -> Self {
        Self::new(
            offset,
            DecodeErrorKind::UnexpectedType {
                expected,
                found: found.type_name(),
            },
        )
    }
}

// ─── Typed entry points ──────────────────────────────────────────────────────

/// Decode a complete value. Trailing bytes are an error.
pub fn decode_value(bytes: &[u8]) -> Result<ClarityValue, DecodeError> {
    let mut reader = Reader::new(bytes);
    let value = reader.value(0)?;
    if reader.remaining() > 0 {
        return Err(reader.err(DecodeErrorKind::TrailingBytes(reader.remaining())));
    }
    Ok(value)
}

/// Decode a hex string (with or without `0x`).
pub fn decode_hex(input: &str) -> Result<ClarityValue, DecodeError> {
    let bytes = hex_to_bytes(input)?;
    decode_value(&bytes)
}

pub fn decode_uint(bytes: &[u8]) -> Result<u128, DecodeError> {
    match decode_value(bytes)? {
        ClarityValue::UInt(v) => Ok(v),
        other => Err(DecodeError::mismatch(0, "uint", &other)),
    }
}

pub fn decode_bool(bytes: &[u8]) -> Result<bool, DecodeError> {
    match decode_value(bytes)? {
        ClarityValue::Bool(v) => Ok(v),
        other => Err(DecodeError::mismatch(0, "bool", &other)),
    }
}

pub fn decode_ascii_string(bytes: &[u8]) -> Result<String, DecodeError> {
    match decode_value(bytes)? {
        ClarityValue::StringAscii(s) => Ok(s),
        other => Err(DecodeError::mismatch(0, "string-ascii", &other)),
    }
}

/// Decode a principal into its canonical c32check text form.
pub fn decode_principal(bytes: &[u8]) -> Result<String, DecodeError> {
    match decode_value(bytes)? {
        ClarityValue::Principal(p) => Ok(p.to_string()),
        other => Err(DecodeError::mismatch(0, "principal", &other)),
    }
}

/// Decode a tuple and return exactly the requested fields.
///
/// Field order in the encoding is irrelevant. Extra fields are ignored;
/// a requested field that is absent is an error.
pub fn decode_tuple(
    bytes: &[u8],
    field_names: &[&str],
) -> Result<BTreeMap<String, ClarityValue>, DecodeError> {
    match decode_value(bytes)? {
        ClarityValue::Tuple(fields) => select_fields(fields, field_names),
        other => Err(DecodeError::mismatch(0, "tuple", &other)),
    }
}

pub(crate) fn select_fields(
    mut fields: BTreeMap<String, ClarityValue>,
    field_names: &[&str],
) -> Result<BTreeMap<String, ClarityValue>, DecodeError> {
    let mut selected = BTreeMap::new();
    for name in field_names {
        let value = fields.remove(*name).ok_or_else(|| {
            DecodeError::new(0, DecodeErrorKind::MissingField((*name).to_string()))
        })?;
        selected.insert((*name).to_string(), value);
    }
    Ok(selected)
}

pub(crate) fn hex_to_bytes(input: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| {
        let offset = match e {
            hex::FromHexError::InvalidHexCharacter { index, .. } => index / 2,
            _ => digits.len() / 2,
        };
        DecodeError::new(offset, DecodeErrorKind::InvalidHex(e.to_string()))
    })
}

// ─── Reader ──────────────────────────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(self.pos, kind)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(self.err(DecodeErrorKind::UnexpectedEnd {
                needed: n - self.remaining(),
            }));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32_be(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u128_bytes(&mut self) -> Result<[u8; 16], DecodeError> {
        let mut out = [0u8; 16];
        out.copy_from_slice(self.take(16)?);
        Ok(out)
    }

    fn value(&mut self, depth: usize) -> Result<ClarityValue, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(self.err(DecodeErrorKind::DepthExceeded));
        }
        let tag_offset = self.pos;
        let tag = self.u8()?;

        let value = match tag {
            TAG_INT => ClarityValue::Int(i128::from_be_bytes(self.u128_bytes()?)),
            TAG_UINT => ClarityValue::UInt(u128::from_be_bytes(self.u128_bytes()?)),
            TAG_BUFFER => {
                let len = self.u32_be()? as usize;
                ClarityValue::Buffer(self.take(len)?.to_vec())
            }
            TAG_TRUE => ClarityValue::Bool(true),
            TAG_FALSE => ClarityValue::Bool(false),
            TAG_STANDARD_PRINCIPAL => ClarityValue::Principal(self.principal(false)?),
            TAG_CONTRACT_PRINCIPAL => ClarityValue::Principal(self.principal(true)?),
            TAG_RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.value(depth + 1)?)),
            TAG_RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.value(depth + 1)?)),
            TAG_OPTIONAL_NONE => ClarityValue::OptionalNone,
            TAG_OPTIONAL_SOME => ClarityValue::OptionalSome(Box::new(self.value(depth + 1)?)),
            TAG_LIST => {
                let len = self.u32_be()? as usize;
                // Every element takes at least one byte, so a length larger
                // than the remaining input is truncated anyway.
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            TAG_TUPLE => {
                let count = self.u32_be()? as usize;
                let mut fields = BTreeMap::new();
                for _ in 0..count {
                    let name = self.name()?;
                    let value = self.value(depth + 1)?;
                    fields.insert(name, value);
                }
                ClarityValue::Tuple(fields)
            }
            TAG_STRING_ASCII => {
                let len = self.u32_be()? as usize;
                let start = self.pos;
                let raw = self.take(len)?;
                if let Some(i) = raw.iter().position(|b| !b.is_ascii()) {
                    return Err(DecodeError::new(
                        start + i,
                        DecodeErrorKind::InvalidAscii(raw[i]),
                    ));
                }
                // Checked above: every byte is ASCII, hence valid UTF-8.
                ClarityValue::StringAscii(raw.iter().map(|&b| b as char).collect())
            }
            TAG_STRING_UTF8 => {
                let len = self.u32_be()? as usize;
                let start = self.pos;
                let raw = self.take(len)?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| {
                        DecodeError::new(start + e.valid_up_to(), DecodeErrorKind::InvalidUtf8)
                    })?
                    .to_string();
                ClarityValue::StringUtf8(s)
            }
            other => {
                return Err(DecodeError::new(
                    tag_offset,
                    DecodeErrorKind::UnknownTag(other),
                ))
            }
        };

        Ok(value)
    }

    fn principal(&mut self, is_contract: bool) -> Result<Principal, DecodeError> {
        let version_offset = self.pos;
        let version = self.u8()?;
        if version >= 32 {
            return Err(DecodeError::new(
                version_offset,
                DecodeErrorKind::InvalidPrincipalVersion(version),
            ));
        }
        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(self.take(20)?);
        let contract_name = if is_contract {
            Some(self.name()?)
        } else {
            None
        };
        Ok(Principal {
            version,
            hash160,
            contract_name,
        })
    }

    /// u8 length-prefixed ASCII name (tuple keys, contract names).
    fn name(&mut self) -> Result<String, DecodeError> {
        let len_offset = self.pos;
        let len = self.u8()? as usize;
        if len == 0 || len > MAX_NAME_LEN {
            return Err(DecodeError::new(
                len_offset,
                DecodeErrorKind::InvalidName(format!("length {len}")),
            ));
        }
        let start = self.pos;
        let raw = self.take(len)?;
        if let Some(i) = raw.iter().position(|b| !b.is_ascii_graphic()) {
            return Err(DecodeError::new(
                start + i,
                DecodeErrorKind::InvalidName(format!("byte 0x{:02x}", raw[i])),
            ));
        }
        Ok(raw.iter().map(|&b| b as char).collect())
    }
}
