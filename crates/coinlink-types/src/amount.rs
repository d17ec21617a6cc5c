//! Decimal rendering of token amounts.
//!
//! Token amounts travel as plain base-10 strings (`"1234567"`). Wallet prompts show
//! the same number split into groups of three digits (`"1 234 567"`). Both forms parse
//! back into the same [`U256`].

use alloy_primitives::U256;
use alloy_primitives::ruint::ParseError;

/// Renders `value` as plain base-10 digits without separators.
pub fn decimal_string(value: &U256) -> String {
    value.to_string()
}

/// Renders `value` in groups of three digits separated by a single space.
///
/// The left-most group is sized so that every following group has exactly three digits.
///
/// ```
/// use alloy_primitives::U256;
/// use coinlink_types::amount::group_digits;
///
/// assert_eq!(group_digits(&U256::from(1234567u64)), "1 234 567");
/// assert_eq!(group_digits(&U256::from(123u64)), "123");
/// ```
pub fn group_digits(value: &U256) -> String {
    let digits = value.to_string();
    let head = (digits.len() + 2) % 3 + 1;
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    grouped.push_str(&digits[..head]);
    let mut start = head;
    while start < digits.len() {
        grouped.push(' ');
        grouped.push_str(&digits[start..start + 3]);
        start += 3;
    }
    grouped
}

/// Parses a base-10 amount, accepting the grouped display form as well.
pub fn parse_amount(s: &str) -> Result<U256, ParseError> {
    let digits: String = s.split(' ').collect();
    U256::from_str_radix(&digits, 10)
}

/// Serde adapter encoding a [`U256`] as a plain decimal string.
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::decimal_string(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_amount(&s).map_err(serde::de::Error::custom)
    }
}
