//! Legacy order history document.
//!
//! Expected shape:
//!   [
//!     { "placed_at": "2024-01-08T14:30:00", "notes": "...",
//!       "items": [ { "product_id": "0001111041700", "quantity": 2,
//!                    "modality": "PICKUP", "description": "...",
//!                    "brand": "...", "upc": "..." } ] }
//!   ]

use anyhow::{bail, Result};
use serde_json::Value;
use std::path::Path;

use super::{details_of, quantity_field, read_json_file, text_field, timestamp_field};
use crate::types::{LegacyItem, LegacyOrder, LegacySource, Parsed, RecordError};

fn record_error(index: usize, item_index: Option<usize>, message: impl Into<String>) -> RecordError {
    RecordError {
        source: LegacySource::OrderHistory,
        index,
        item_index,
        message: message.into(),
    }
}

/// Parse an order history document.
///
/// Only a document that is not a JSON array fails as a whole. A bad order
/// or line item is reported in `errors` and skipped.
pub fn parse_order_history(doc: &Value) -> Result<Parsed<LegacyOrder>> {
    let Some(orders) = doc.as_array() else {
        bail!("order history must be a JSON array");
    };

    let mut out = Parsed::default();
    for (index, raw) in orders.iter().enumerate() {
        if !raw.is_object() {
            out.errors.push(record_error(index, None, "order is not an object"));
            continue;
        }

        let placed_at = match timestamp_field(raw, "placed_at") {
            Ok(ts) => ts,
            Err(e) => {
                out.errors.push(record_error(index, None, e));
                continue;
            }
        };

        let raw_items = match raw.get("items") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                out.errors.push(record_error(index, None, "items is not an array"));
                continue;
            }
        };

        let mut items = Vec::with_capacity(raw_items.len());
        for (item_index, item) in raw_items.iter().enumerate() {
            let Some(product_id) = text_field(item, "product_id") else {
                out.errors
                    .push(record_error(index, Some(item_index), "missing product_id"));
                continue;
            };
            match quantity_field(item) {
                Ok(quantity) => items.push(LegacyItem {
                    product_id,
                    quantity,
                    modality: text_field(item, "modality"),
                    details: details_of(item),
                }),
                Err(e) => out.errors.push(record_error(index, Some(item_index), e)),
            }
        }

        out.records.push(LegacyOrder {
            placed_at,
            notes: text_field(raw, "notes"),
            items,
        });
    }
    Ok(out)
}

/// Text variant for callers holding the raw document.
pub fn parse_order_history_text(text: &str) -> Result<Parsed<LegacyOrder>> {
    let doc: Value = serde_json::from_str(text)?;
    parse_order_history(&doc)
}

/// Load `path` if it exists.
pub fn load_order_history(path: &Path) -> Result<Option<Parsed<LegacyOrder>>> {
    match read_json_file(path)? {
        Some(doc) => Ok(Some(parse_order_history(&doc)?)),
        None => Ok(None),
    }
}
