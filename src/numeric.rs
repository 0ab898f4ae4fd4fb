//! Amount and field-element encodings used on the wire.
//!
//! The routing API sends amounts as `0x`-prefixed hex strings in minor units
//! (no implicit decimals). Signatures and addresses are Stark field elements,
//! rendered either as short hex or as fixed-width 64-digit hex.

use serde::{Deserialize, Deserializer, Serializer};
use starknet_core::types::Felt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid hex amount: {0}")]
    InvalidHex(String),
    #[error("Invalid decimal amount: {0}")]
    InvalidDecimal(String),
    #[error("Amount overflows 128 bits: {0}")]
    Overflow(String),
    #[error("Too many fractional digits in {value} (token has {decimals} decimals)")]
    TooManyDecimals { value: String, decimals: u8 },
    #[error("Invalid field element: {0}")]
    InvalidFelt(String),
}

/// Encode an amount as `0x`-prefixed lowercase hex (`0` → `"0x0"`).
pub fn to_hex(amount: u128) -> String {
    format!("{:#x}", amount)
}

/// Decode a `0x`-prefixed (or bare) hex amount.
pub fn parse_hex_amount(input: &str) -> Result<u128, CodecError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidHex(input.to_string()));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 32 {
        return Err(CodecError::Overflow(input.to_string()));
    }
    if significant.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(significant, 16).map_err(|_| CodecError::InvalidHex(input.to_string()))
}

/// Decode an amount given either as `0x` hex or as a plain decimal integer.
pub fn parse_amount(input: &str) -> Result<u128, CodecError> {
    let trimmed = input.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return parse_hex_amount(trimmed);
    }
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(CodecError::InvalidDecimal(input.to_string()));
    }
    trimmed
        .parse::<u128>()
        .map_err(|_| CodecError::Overflow(input.to_string()))
}

/// Convert a human decimal string (`"1.5"`) to minor units for a token with `decimals`.
///
/// Fractional digits beyond `decimals` are rejected rather than rounded.
pub fn parse_units(value: &str, decimals: u8) -> Result<u128, CodecError> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    let valid = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !valid(whole) || !valid(fraction) {
        return Err(CodecError::InvalidDecimal(value.to_string()));
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(CodecError::TooManyDecimals {
            value: value.to_string(),
            decimals,
        });
    }

    let overflow = || CodecError::Overflow(value.to_string());
    let scale = 10u128.checked_pow(decimals as u32).ok_or_else(overflow)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| overflow())?
    };
    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse::<u128>().map_err(|_| overflow())?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Render minor units as a human decimal string, trimming trailing zeros.
pub fn format_units(amount: u128, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = format!("{:0>width$}", amount, width = decimals as usize + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Parse a field element from `0x` hex or decimal.
pub fn parse_felt(input: &str) -> Result<Felt, CodecError> {
    let trimmed = input.trim();
    let hex_digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));
    let parsed = if let Some(digits) = hex_digits {
        let valid = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
        valid
            .then(|| Felt::from_hex(&format!("0x{}", digits.to_ascii_lowercase())).ok())
            .flatten()
    } else if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        Felt::from_dec_str(trimmed).ok()
    } else {
        None
    };
    parsed.ok_or_else(|| CodecError::InvalidFelt(input.to_string()))
}

/// Fixed-width `0x` + 64 hex digit rendering of a field element.
pub fn felt_to_fixed_hex(value: &Felt) -> String {
    format!("0x{}", hex::encode(value.to_bytes_be()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireAmount {
    Text(String),
    Number(u64),
}

impl WireAmount {
    fn into_amount(self) -> Result<u128, CodecError> {
        match self {
            WireAmount::Text(s) => parse_amount(&s),
            WireAmount::Number(n) => Ok(n as u128),
        }
    }
}

/// Serde adapter: `u128` ⇄ `"0x..."`. Deserialization also accepts decimal strings and numbers.
pub mod hex_u128 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        WireAmount::deserialize(deserializer)?
            .into_amount()
            .map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<u128>` in hex.
pub mod option_hex_u128 {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&to_hex(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u128>, D::Error> {
        Option::<WireAmount>::deserialize(deserializer)?
            .map(WireAmount::into_amount)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encoding() {
        assert_eq!(to_hex(0), "0x0");
        assert_eq!(to_hex(1_000_000), "0xf4240");
        assert_eq!(parse_hex_amount("0xf4240").unwrap(), 1_000_000);
        assert_eq!(parse_hex_amount("F4240").unwrap(), 1_000_000);
        assert_eq!(parse_hex_amount("0x0000").unwrap(), 0);
        assert_eq!(parse_hex_amount(&to_hex(u128::MAX)).unwrap(), u128::MAX);
    }

    #[test]
    fn test_hex_rejects_garbage() {
        assert!(matches!(parse_hex_amount("0x"), Err(CodecError::InvalidHex(_))));
        assert!(matches!(parse_hex_amount("0xzz"), Err(CodecError::InvalidHex(_))));
        let too_big = format!("0x1{}", "0".repeat(32));
        assert!(matches!(parse_hex_amount(&too_big), Err(CodecError::Overflow(_))));
    }

    #[test]
    fn test_parse_amount_both_forms() {
        assert_eq!(parse_amount("1000000000000000000").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_amount("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 18).unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(parse_units("100", 6).unwrap(), 100_000_000);
        assert_eq!(parse_units(".25", 2).unwrap(), 25);
        assert_eq!(parse_units("1.2300", 2).unwrap(), 123);
        assert!(matches!(
            parse_units("1.234", 2),
            Err(CodecError::TooManyDecimals { decimals: 2, .. })
        ));
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units(".", 18).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_500_000_000_000_000_000, 18), "1.5");
        assert_eq!(format_units(100_000_000, 6), "100");
        assert_eq!(format_units(5, 3), "0.005");
        assert_eq!(format_units(42, 0), "42");
    }

    #[test]
    fn test_felt_parsing() {
        let from_hex = parse_felt("0x1f").unwrap();
        let from_dec = parse_felt("31").unwrap();
        assert_eq!(from_hex, from_dec);
        assert_eq!(
            felt_to_fixed_hex(&from_hex),
            format!("0x{}1f", "0".repeat(62))
        );
        assert!(parse_felt("not-a-felt").is_err());
        assert!(parse_felt("").is_err());
    }

    #[test]
    fn test_serde_adapters() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wire {
            #[serde(with = "hex_u128")]
            amount: u128,
            #[serde(default, with = "option_hex_u128")]
            limit: Option<u128>,
        }

        let wire: Wire = serde_json::from_str(r#"{"amount":"0x64","limit":null}"#).unwrap();
        assert_eq!(wire.amount, 100);
        assert_eq!(wire.limit, None);

        let wire: Wire = serde_json::from_str(r#"{"amount":250}"#).unwrap();
        assert_eq!(wire.amount, 250);

        let json = serde_json::to_value(Wire { amount: 255, limit: Some(16) }).unwrap();
        assert_eq!(json["amount"], "0xff");
        assert_eq!(json["limit"], "0x10");
    }
}
