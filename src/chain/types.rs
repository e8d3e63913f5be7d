// Wire shapes returned by the chain node's JSON-RPC surface. All numeric
// fields arrive hex-encoded with a `0x` prefix; decoding them into native
// integers is this module's job, not the caller's.

use serde::Deserialize;

use crate::error::DecodeError;

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub number: String,
    pub hash: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(rename = "sealFields", default)]
    pub seal_fields: Vec<String>,
    #[serde(default)]
    pub uncles: Vec<String>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(rename = "gasPrice")]
    pub gas_price: String,
}

pub type Uncle = Block;

#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
}

/// Parses a `0x`-prefixed hex string into a `u64`. Used for `number` and
/// `gasUsed`, both of which are small enough to never overflow.
pub fn hex_to_u64(s: &str) -> Result<u64, DecodeError> {
    let stripped = s.strip_prefix("0x").ok_or(DecodeError::MissingPrefix)?;
    if stripped.is_empty() {
        return Ok(0);
    }
    Ok(u64::from_str_radix(stripped, 16)?)
}

/// Case-insensitive hex string comparison, used by the match predicate
/// (the node may return mixed-case hex while the pool stored lowercase,
/// or vice versa).
pub fn hex_eq_fold(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex_height() {
        assert_eq!(hex_to_u64("0x64").unwrap(), 100);
        assert_eq!(hex_to_u64("0xCB").unwrap(), 203);
    }

    #[test]
    fn decodes_empty_hex_as_zero() {
        assert_eq!(hex_to_u64("0x").unwrap(), 0);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(hex_to_u64("64").is_err());
    }

    #[test]
    fn fold_compares_case_insensitively() {
        assert!(hex_eq_fold("0xABC", "0xabc"));
        assert!(!hex_eq_fold("0xABC", "0xabd"));
    }
}
