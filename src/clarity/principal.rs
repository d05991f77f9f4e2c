//! Principals (account and contract identifiers) and their c32check text form.
//!
//! A standard principal renders as `S` + version char + c32(hash160 ‖ checksum),
//! where checksum is the first 4 bytes of sha256(sha256(version ‖ hash160)).
//! Contract principals append `.contract-name`.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("address must start with 'S'")]
    MissingPrefix,
    #[error("invalid c32 character '{0}'")]
    InvalidCharacter(char),
    #[error("address too short")]
    TooShort,
    #[error("expected a 20-byte hash, got {0} bytes")]
    BadHashLength(usize),
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("invalid contract name `{0}`")]
    BadContractName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub version: u8,
    pub hash160: [u8; 20],
    pub contract_name: Option<String>,
}

impl Principal {
    pub fn standard(version: u8, hash160: [u8; 20]) -> Self {
        Self {
            version,
            hash160,
            contract_name: None,
        }
    }

    /// The account part without any contract name.
    pub fn address(&self) -> String {
        format!("S{}", c32check_encode(self.version, &self.hash160))
    }

    pub fn is_contract(&self) -> bool {
        self.contract_name.is_some()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contract_name {
            Some(name) => write!(f, "{}.{}", self.address(), name),
            None => write!(f, "{}", self.address()),
        }
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, contract_name) = match s.split_once('.') {
            Some((addr, name)) => {
                if !is_valid_contract_name(name) {
                    return Err(PrincipalError::BadContractName(name.to_string()));
                }
                (addr, Some(name.to_string()))
            }
            None => (s, None),
        };

        let body = address
            .strip_prefix('S')
            .ok_or(PrincipalError::MissingPrefix)?;
        let (version, data) = c32check_decode(body)?;
        let hash160: [u8; 20] = data
            .as_slice()
            .try_into()
            .map_err(|_| PrincipalError::BadHashLength(data.len()))?;

        Ok(Self {
            version,
            hash160,
            contract_name,
        })
    }
}

/// Contract names: leading letter, then letters, digits, `-` or `_`, max 128.
fn is_valid_contract_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ─── c32 ─────────────────────────────────────────────────────────────────────

fn double_sha256_checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    [second[0], second[1], second[2], second[3]]
}

fn c32_encode(input: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u8 = 0;
    let mut carry_bits: u8 = 0;

    // Least significant byte first; digits are emitted in reverse.
    for &byte in input.iter().rev() {
        let low_bits_to_take = 5 - carry_bits;
        let low_bits = byte & ((1u8 << low_bits_to_take) - 1);
        out.push(C32_ALPHABET[((low_bits << carry_bits) + carry) as usize]);

        carry_bits = 8 + carry_bits - 5;
        carry = byte >> (8 - carry_bits);

        if carry_bits >= 5 {
            out.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry_bits -= 5;
            carry >>= 5;
        }
    }
    if carry_bits > 0 {
        out.push(C32_ALPHABET[carry as usize]);
    }

    // Drop the zero digits produced by padding, then restore one '0' per
    // leading zero byte of the input.
    while out.last() == Some(&C32_ALPHABET[0]) {
        out.pop();
    }
    for _ in input.iter().take_while(|&&b| b == 0) {
        out.push(C32_ALPHABET[0]);
    }

    out.reverse();
    out.into_iter().map(char::from).collect()
}

fn c32_digit(c: char) -> Result<u8, PrincipalError> {
    let upper = c.to_ascii_uppercase();
    C32_ALPHABET
        .iter()
        .position(|&a| a as char == upper)
        .map(|p| p as u8)
        .ok_or(PrincipalError::InvalidCharacter(c))
}

fn c32_decode(input: &str) -> Result<Vec<u8>, PrincipalError> {
    let digits: Vec<u8> = input
        .chars()
        .rev()
        .map(c32_digit)
        .collect::<Result<_, _>>()?;

    let mut out = Vec::with_capacity(input.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u16 = 0;
    for &digit in &digits {
        carry += (digit as u16) << carry_bits;
        carry_bits += 5;
        if carry_bits >= 8 {
            out.push((carry & 0xff) as u8);
            carry_bits -= 8;
            carry >>= 8;
        }
    }
    if carry_bits > 0 {
        out.push(carry as u8);
    }

    while out.last() == Some(&0) {
        out.pop();
    }
    for _ in digits.iter().rev().take_while(|&&d| d == 0) {
        out.push(0);
    }

    out.reverse();
    Ok(out)
}

fn c32check_encode(version: u8, data: &[u8]) -> String {
    let checksum = double_sha256_checksum(version, data);
    let mut payload = data.to_vec();
    payload.extend_from_slice(&checksum);
    format!(
        "{}{}",
        C32_ALPHABET[(version & 0x1f) as usize] as char,
        c32_encode(&payload)
    )
}

fn c32check_decode(input: &str) -> Result<(u8, Vec<u8>), PrincipalError> {
    let mut chars = input.chars();
    let version = c32_digit(chars.next().ok_or(PrincipalError::TooShort)?)?;
    let payload = c32_decode(chars.as_str())?;
    if payload.len() < 4 {
        return Err(PrincipalError::TooShort);
    }
    let (data, checksum) = payload.split_at(payload.len() - 4);
    if double_sha256_checksum(version, data) != checksum {
        return Err(PrincipalError::BadChecksum);
    }
    Ok((version, data.to_vec()))
}

/// Validate a user-supplied principal (standard or contract).
pub fn validate(s: &str) -> Result<Principal, PrincipalError> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_HASH: &str = "a46ff88886c2ef9762d970b4d2c63678835bd39d";
    const KNOWN_ADDRESS: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

    fn known_hash() -> [u8; 20] {
        hex::decode(KNOWN_HASH).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_mainnet_single_sig_address() {
        let p = Principal::standard(22, known_hash());
        assert_eq!(p.to_string(), KNOWN_ADDRESS);
    }

    #[test]
    fn test_parse_round_trip() {
        let p: Principal = KNOWN_ADDRESS.parse().unwrap();
        assert_eq!(p.version, 22);
        assert_eq!(p.hash160, known_hash());
        assert_eq!(p.to_string(), KNOWN_ADDRESS);
    }

    #[test]
    fn test_contract_principal() {
        let id = format!("{KNOWN_ADDRESS}.voting-contract");
        let p: Principal = id.parse().unwrap();
        assert_eq!(p.contract_name.as_deref(), Some("voting-contract"));
        assert_eq!(p.to_string(), id);
    }

    #[test]
    fn test_leading_zero_bytes_survive() {
        let mut hash = [0u8; 20];
        hash[19] = 1;
        let p = Principal::standard(26, hash);
        let parsed: Principal = p.to_string().parse().unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // Flip the final character.
        let mut bad = KNOWN_ADDRESS.to_string();
        bad.pop();
        bad.push('8');
        assert_eq!(validate(&bad), Err(PrincipalError::BadChecksum));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(validate("XP123"), Err(PrincipalError::MissingPrefix));
        assert_eq!(validate("SP!!"), Err(PrincipalError::InvalidCharacter('!')));
        assert!(matches!(
            validate(&format!("{KNOWN_ADDRESS}.9bad")),
            Err(PrincipalError::BadContractName(_))
        ));
    }
}
