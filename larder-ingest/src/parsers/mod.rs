pub mod cart;
pub mod order_history;

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use larder_core::{checked_quantity, time::parse_timestamp};

use crate::types::ProductDetails;

/// Read and parse a JSON document. `Ok(None)` when the file does not exist.
pub(crate) fn read_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let v = serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(v))
}

/// String field; numbers are accepted and rendered as text.
pub(crate) fn text_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Quantity field; absent or null means 1.
pub(crate) fn quantity_field(obj: &Value) -> Result<u32, String> {
    let raw = match obj.get("quantity") {
        None | Some(Value::Null) => return Ok(1),
        Some(v) => v,
    };
    let n = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("quantity is not a whole number: {raw}"))?;
    checked_quantity(n).map_err(|e| e.to_string())
}

/// Optional timestamp field; present but unreadable is an error.
pub(crate) fn timestamp_field(
    obj: &Value,
    key: &str,
) -> Result<Option<chrono::NaiveDateTime>, String> {
    match text_field(obj, key) {
        None => Ok(None),
        Some(s) => parse_timestamp(&s).map(Some).map_err(|e| e.to_string()),
    }
}

pub(crate) fn details_of(obj: &Value) -> ProductDetails {
    ProductDetails {
        description: text_field(obj, "description"),
        brand: text_field(obj, "brand"),
        upc: text_field(obj, "upc"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quantity_field() {
        assert_eq!(quantity_field(&json!({})), Ok(1));
        assert_eq!(quantity_field(&json!({"quantity": 3})), Ok(3));
        assert_eq!(quantity_field(&json!({"quantity": 2.0})), Ok(2));
        assert_eq!(quantity_field(&json!({"quantity": "4"})), Ok(4));
        assert!(quantity_field(&json!({"quantity": 0})).is_err());
        assert!(quantity_field(&json!({"quantity": 1.5})).is_err());
        assert!(quantity_field(&json!({"quantity": [1]})).is_err());
    }

    #[test]
    fn test_text_field_accepts_numbers() {
        let v = json!({"product_id": 1234, "blank": "  ", "desc": " Milk "});
        assert_eq!(text_field(&v, "product_id").as_deref(), Some("1234"));
        assert_eq!(text_field(&v, "blank"), None);
        assert_eq!(text_field(&v, "desc").as_deref(), Some("Milk"));
        assert_eq!(text_field(&v, "missing"), None);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_json_file(&dir.path().join("nope.json")).unwrap().is_none());
    }
}
