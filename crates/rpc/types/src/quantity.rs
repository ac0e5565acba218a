//! 0x-hex quantity parsing and formatting.
//!
//! Backends are inconsistent about integer encoding: most return 0x-hex
//! strings, some return bare JSON numbers, and provider-shaped objects wrap
//! big numbers as `{"hex": "0x..", "type": "BigNumber"}`. The gateway
//! normalizes all three into the canonical 0x-hex string form before a
//! response leaves the house.

use alloy_primitives::U256;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid quantity '{0}'")]
    Invalid(String),
}

/// Parse a 0x-hex quantity into a u64.
pub fn parse_quantity(raw: &str) -> Result<u64, QuantityError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| QuantityError::Invalid(raw.to_string()))?;
    if digits.is_empty() {
        return Err(QuantityError::Invalid(raw.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| QuantityError::Invalid(raw.to_string()))
}

/// Parse a 0x-hex quantity into a U256.
pub fn parse_quantity_u256(raw: &str) -> Result<U256, QuantityError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| QuantityError::Invalid(raw.to_string()))?;
    if digits.is_empty() || digits.len() > 64 {
        return Err(QuantityError::Invalid(raw.to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|_| QuantityError::Invalid(raw.to_string()))
}

/// Format an integer as a minimal 0x-hex quantity.
pub fn to_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Format a U256 as a minimal 0x-hex quantity.
pub fn u256_to_quantity(value: U256) -> String {
    format!("0x{value:x}")
}

/// Normalize one JSON value into quantity form where possible.
///
/// Numbers become hex strings, `{"hex": ...}` objects collapse to their hex
/// field, strings and everything else pass through untouched.
pub fn normalize_quantity(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::String(to_quantity(u))
            } else {
                value.clone()
            }
        }
        Value::Object(map) => match map.get("hex") {
            Some(Value::String(hex)) => Value::String(hex.clone()),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_formats_quantities() {
        assert_eq!(parse_quantity("0x2a").unwrap(), 42);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(to_quantity(42), "0x2a");
        assert_eq!(
            parse_quantity_u256("0x4a817c800").unwrap(),
            U256::from(20_000_000_000u64)
        );
        assert_eq!(u256_to_quantity(U256::from(20_000_000_000u64)), "0x4a817c800");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_quantity("42").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert!(parse_quantity_u256("").is_err());
    }

    #[test]
    fn normalizes_numbers_and_bignumber_objects() {
        assert_eq!(normalize_quantity(&json!(30000000)), json!("0x1c9c380"));
        assert_eq!(
            normalize_quantity(&json!({"type": "BigNumber", "hex": "0x5208"})),
            json!("0x5208")
        );
        assert_eq!(normalize_quantity(&json!("0x5208")), json!("0x5208"));
        assert_eq!(normalize_quantity(&json!(null)), json!(null));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_quantity_roundtrip(value in any::<u64>()) {
            prop_assert_eq!(parse_quantity(&to_quantity(value)).unwrap(), value);
        }

        #[test]
        fn prop_u256_roundtrip(value in any::<[u8; 32]>()) {
            let v = U256::from_be_bytes(value);
            prop_assert_eq!(parse_quantity_u256(&u256_to_quantity(v)).unwrap(), v);
        }

        #[test]
        fn prop_normalize_is_idempotent(value in any::<u64>()) {
            let once = normalize_quantity(&serde_json::json!(value));
            let twice = normalize_quantity(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
