//! Serde helpers for broker payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// Accept an identifier sent either as a JSON string or a number.
///
/// Brokers report tickets as integers while the desk keys everything by
/// string.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Optional variant of [`string_or_number`]; `null` becomes `None`.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Brokers send `0` for "no stop" / "no target"; treat it as absent.
pub fn non_zero(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| !v.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Frame {
        #[serde(deserialize_with = "string_or_number")]
        ticket: String,
        #[serde(default, deserialize_with = "opt_string_or_number")]
        parent: Option<String>,
    }

    #[test]
    fn test_numeric_tickets_become_strings() {
        let frame: Frame = serde_json::from_str(r#"{"ticket": 123456}"#).unwrap();
        assert_eq!(frame.ticket, "123456");
        assert_eq!(frame.parent, None);

        let frame: Frame = serde_json::from_str(r#"{"ticket": "A-1", "parent": 7}"#).unwrap();
        assert_eq!(frame.ticket, "A-1");
        assert_eq!(frame.parent.as_deref(), Some("7"));
    }

    #[test]
    fn test_rejects_non_scalar_ticket() {
        assert!(serde_json::from_str::<Frame>(r#"{"ticket": [1]}"#).is_err());
    }

    #[test]
    fn test_zero_levels_are_absent() {
        assert_eq!(non_zero(Some(dec!(0))), None);
        assert_eq!(non_zero(Some(dec!(2640.5))), Some(dec!(2640.5)));
        assert_eq!(non_zero(None), None);
    }
}
