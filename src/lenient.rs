//! Lenient scalar deserializers
//!
//! The web APIs we consume are loose with JSON scalar types: flags arrive as
//! `0`/`1`, `"0"`/`"1"` or booleans, and numbers are frequently quoted.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts `true`/`false`, `0`/`1` and `"0"`/`"1"`
pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_i64().unwrap_or(0) != 0,
        Value::String(text) => text == "1" || text.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Accepts strings and numbers, yielding a string
pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

/// Accepts numbers and numeric strings; anything else becomes `0`
pub(crate) fn unsigned<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_u64().unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "flag")]
        flag: bool,
        #[serde(deserialize_with = "string")]
        text: String,
        #[serde(deserialize_with = "unsigned")]
        count: u64,
    }

    fn parse(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_flag_variants() {
        assert!(parse(r#"{"flag": 1, "text": "", "count": 0}"#).flag);
        assert!(parse(r#"{"flag": "1", "text": "", "count": 0}"#).flag);
        assert!(parse(r#"{"flag": true, "text": "", "count": 0}"#).flag);
        assert!(!parse(r#"{"flag": "0", "text": "", "count": 0}"#).flag);
        assert!(!parse(r#"{"flag": null, "text": "", "count": 0}"#).flag);
    }

    #[test]
    fn test_string_and_unsigned_variants() {
        let sample = parse(r#"{"flag": 0, "text": 5, "count": "42"}"#);
        assert_eq!(sample.text, "5");
        assert_eq!(sample.count, 42);

        let sample = parse(r#"{"flag": 0, "text": "five", "count": 7}"#);
        assert_eq!(sample.text, "five");
        assert_eq!(sample.count, 7);
    }
}
