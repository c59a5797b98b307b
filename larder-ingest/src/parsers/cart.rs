//! Legacy saved-cart document.
//!
//! Expected shape:
//!   { "current_cart": [ { "product_id": "...", "quantity": 1,
//!                         "modality": "DELIVERY", "added_at": "...",
//!                         "description": "..." } ],
//!     "last_updated": "..." }

use anyhow::{bail, Result};
use serde_json::Value;
use std::path::Path;

use super::{details_of, quantity_field, read_json_file, text_field, timestamp_field};
use crate::types::{LegacyCartItem, LegacySource, Parsed, RecordError};

fn record_error(index: usize, message: impl Into<String>) -> RecordError {
    RecordError {
        source: LegacySource::Cart,
        index,
        item_index: None,
        message: message.into(),
    }
}

/// Parse the `current_cart` array of a cart document. A missing array is an
/// empty cart.
pub fn parse_cart(doc: &Value) -> Result<Parsed<LegacyCartItem>> {
    if !doc.is_object() {
        bail!("cart document must be a JSON object");
    }
    let items = match doc.get("current_cart") {
        None | Some(Value::Null) => return Ok(Parsed::default()),
        Some(Value::Array(items)) => items,
        Some(_) => bail!("current_cart must be an array"),
    };

    let mut out = Parsed::default();
    for (index, raw) in items.iter().enumerate() {
        let Some(product_id) = text_field(raw, "product_id") else {
            out.errors.push(record_error(index, "missing product_id"));
            continue;
        };
        let quantity = match quantity_field(raw) {
            Ok(q) => q,
            Err(e) => {
                out.errors.push(record_error(index, e));
                continue;
            }
        };
        let added_at = match timestamp_field(raw, "added_at") {
            Ok(ts) => ts,
            Err(e) => {
                out.errors.push(record_error(index, e));
                continue;
            }
        };
        out.records.push(LegacyCartItem {
            product_id,
            quantity,
            modality: text_field(raw, "modality"),
            added_at,
            details: details_of(raw),
        });
    }
    Ok(out)
}

pub fn parse_cart_text(text: &str) -> Result<Parsed<LegacyCartItem>> {
    let doc: Value = serde_json::from_str(text)?;
    parse_cart(&doc)
}

/// Load `path` if it exists.
pub fn load_cart(path: &Path) -> Result<Option<Parsed<LegacyCartItem>>> {
    match read_json_file(path)? {
        Some(doc) => Ok(Some(parse_cart(&doc)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cart_basic() {
        let text = r#"{
            "current_cart": [
                {"product_id": "bananas", "quantity": 6, "modality": "DELIVERY",
                 "added_at": "2024-05-02T08:15:00.123456"},
                {"product_id": "bread"}
            ],
            "last_updated": "2024-05-02T08:15:00"
        }"#;
        let parsed = parse_cart_text(text).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].quantity, 6);
        assert!(parsed.records[0].added_at.is_some());
        assert_eq!(parsed.records[1].quantity, 1);
        assert_eq!(parsed.records[1].added_at, None);
    }

    #[test]
    fn test_bad_cart_items_are_collected() {
        let text = r#"{"current_cart": [
            {"quantity": 1},
            {"product_id": "tea", "added_at": "soon"},
            {"product_id": "coffee", "quantity": 0},
            {"product_id": "sugar"}
        ]}"#;
        let parsed = parse_cart_text(text).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].product_id, "sugar");
        let indexes: Vec<usize> = parsed.errors.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_and_malformed_documents() {
        assert!(parse_cart_text("{}").unwrap().records.is_empty());
        assert!(parse_cart_text("[]").is_err());
        assert!(parse_cart_text(r#"{"current_cart": 3}"#).is_err());
    }
}
