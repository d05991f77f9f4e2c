use super::*;

/// `0x01` + 16-byte big-endian.
pub fn encode_uint(value: u128) -> Vec<u8> {
    let mut out = Vec::with_capacity(17);
    out.push(TAG_UINT);
    out.extend_from_slice(&value.to_be_bytes());
    out
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    vec![if value { TAG_TRUE } else { TAG_FALSE }]
}

/// Returns `None` if `value` contains non-ASCII characters.
pub fn encode_ascii_string(value: &str) -> Option<Vec<u8>> {
    if !value.is_ascii() {
        return None;
    }
    let mut out = Vec::with_capacity(5 + value.len());
    out.push(TAG_STRING_ASCII);
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Some(out)
}

/// Lowercase hex with a `0x` prefix, the form the read-only call API expects.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

impl ClarityValue {
    /// Consensus serialization. Tuple fields are written in name order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.serialize())
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(v) => {
                out.push(TAG_INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::UInt(v) => out.extend_from_slice(&encode_uint(*v)),
            Self::Buffer(b) => {
                out.push(TAG_BUFFER);
                out.extend_from_slice(&(b.len() as u32).to_be_bytes());
                out.extend_from_slice(b);
            }
            Self::Bool(v) => out.extend_from_slice(&encode_bool(*v)),
            Self::Principal(p) => {
                match &p.contract_name {
                    Some(_) => out.push(TAG_CONTRACT_PRINCIPAL),
                    None => out.push(TAG_STANDARD_PRINCIPAL),
                }
                out.push(p.version);
                out.extend_from_slice(&p.hash160);
                if let Some(name) = &p.contract_name {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                }
            }
            Self::ResponseOk(v) => {
                out.push(TAG_RESPONSE_OK);
                v.write_to(out);
            }
            Self::ResponseErr(v) => {
                out.push(TAG_RESPONSE_ERR);
                v.write_to(out);
            }
            Self::OptionalNone => out.push(TAG_OPTIONAL_NONE),
            Self::OptionalSome(v) => {
                out.push(TAG_OPTIONAL_SOME);
                v.write_to(out);
            }
            Self::List(items) => {
                out.push(TAG_LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            Self::Tuple(fields) => {
                out.push(TAG_TUPLE);
                out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                for (name, value) in fields {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write_to(out);
                }
            }
            Self::StringAscii(s) => {
                out.push(TAG_STRING_ASCII);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Self::StringUtf8(s) => {
                out.push(TAG_STRING_UTF8);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
}
