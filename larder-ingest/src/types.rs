use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which legacy document a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacySource {
    #[serde(rename = "order_history")]
    OrderHistory,
    #[serde(rename = "cart")]
    Cart,
}

impl fmt::Display for LegacySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LegacySource::OrderHistory => "order_history",
            LegacySource::Cart => "cart",
        })
    }
}

/// Product details carried along with legacy line items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub description: Option<String>,
    pub brand: Option<String>,
    pub upc: Option<String>,
}

/// One line of a legacy order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyItem {
    pub product_id: String,
    pub quantity: u32,
    pub modality: Option<String>,
    pub details: ProductDetails,
}

/// Normalized legacy order (retailer-specific fields dropped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyOrder {
    /// `None` when the document had no timestamp; the importer decides.
    pub placed_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub items: Vec<LegacyItem>,
}

impl LegacyOrder {
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// A product that was sitting in the saved cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyCartItem {
    pub product_id: String,
    pub quantity: u32,
    pub modality: Option<String>,
    pub added_at: Option<NaiveDateTime>,
    pub details: ProductDetails,
}

/// A record that could not be read. The rest of the document still is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    pub source: LegacySource,
    /// Position of the record in its array.
    pub index: usize,
    /// Position of the line item within an order, when the item was bad.
    pub item_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item_index {
            Some(item) => write!(f, "{} #{} item {}: {}", self.source, self.index, item, self.message),
            None => write!(f, "{} #{}: {}", self.source, self.index, self.message),
        }
    }
}

/// Parsed records plus the per-record failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub errors: Vec<RecordError>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}
