//! Serialization codec
//!
//! Converts values to and from the string payload stored in a document.
//! Payloads are JSON, so `decode(encode(v)) == v` holds for numbers,
//! strings, sequences, maps with string keys and any nesting of those.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encode a value into a document payload
///
/// Fails with `ShelfError::Serialization` for values JSON cannot represent
/// (e.g. maps keyed by non-strings).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a document payload back into a value
pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::fmt::Debug;

    use serde_json::json;

    use crate::error::ShelfError;

    fn assert_survives<T>(value: T)
    where
        T: Serialize + DeserializeOwned + PartialEq + Debug,
    {
        let payload = encode(&value).unwrap();
        let decoded: T = decode(&payload).unwrap();
        assert_eq!(decoded, value, "payload {}", payload);
    }

    #[test]
    fn test_nested_value_survives() {
        let mut value: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        value.insert("a".to_string(), vec![Some(1.5), None]);
        value.insert("b".to_string(), vec![]);

        let payload = encode(&value).unwrap();
        let decoded: BTreeMap<String, Vec<Option<f64>>> = decode(&payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_integer_extremes_survive() {
        assert_survives(0i64);
        assert_survives(-1i64);
        assert_survives(i64::MIN);
        assert_survives(i64::MAX);
        assert_survives(u64::MAX);
        assert_survives(vec![i32::MIN, -7, 0, 7, i32::MAX]);
    }

    #[test]
    fn test_floats_survive() {
        assert_survives(0.1f64);
        assert_survives(-2.5f64);
        assert_survives(1.0e-7f64);
        assert_survives(6.02e23f64);
        assert_survives(vec![0.5f32, -0.25, 3.0]);
    }

    #[test]
    fn test_non_finite_float_is_not_preserved() {
        // JSON has no NaN; it is written as null
        assert_eq!(encode(&f64::NAN).unwrap(), "null");
        assert!(decode::<f64>("null").is_err());
    }

    #[test]
    fn test_strings_survive() {
        assert_survives(String::new());
        assert_survives("quote \" and backslash \\".to_string());
        assert_survives("line\nbreak\ttab\r\u{0}".to_string());
        assert_survives("héllo wörld, 日本語, 🦀".to_string());
        assert_survives(vec!["a".to_string(), "\u{7f}".to_string()]);

        let payload = encode("a\"b").unwrap();
        assert_eq!(payload, r#""a\"b""#);
    }

    #[test]
    fn test_unicode_map_keys_survive() {
        let mut value = BTreeMap::new();
        value.insert("ключ".to_string(), 1);
        value.insert("\"quoted\"".to_string(), 2);
        value.insert(String::new(), 3);
        assert_survives(value);
    }

    #[test]
    fn test_list_of_maps_survives() {
        let mut first: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        first.insert("evens".to_string(), vec![0, 2, -4]);
        first.insert("empty".to_string(), vec![]);
        let mut second = BTreeMap::new();
        second.insert("big".to_string(), vec![i64::MAX, i64::MIN]);

        assert_survives(vec![first, BTreeMap::new(), second]);
    }

    #[test]
    fn test_json_value_survives() {
        assert_survives(json!(null));
        assert_survives(json!(true));
        assert_survives(json!({
            "name": "John Bigboote",
            "tags": ["red", "lectroid", 8],
            "nested": {"list": [{"a": 1.5}, [], {}], "max": u64::MAX, "min": i64::MIN},
            "text": "tab\there \u{1F980}"
        }));
    }

    #[test]
    fn test_empty_list_payload() {
        let payload = encode(&Vec::<i32>::new()).unwrap();
        assert_eq!(payload, "[]");
    }

    #[test]
    fn test_unrepresentable_value_fails() {
        let mut value: HashMap<(i32, i32), i32> = HashMap::new();
        value.insert((1, 2), 3);

        assert!(matches!(encode(&value), Err(ShelfError::Serialization(_))));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<Vec<i32>> = decode("not json");
        assert!(matches!(result, Err(ShelfError::Serialization(_))));
    }
}
