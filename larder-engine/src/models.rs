use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use larder_core::{Category, ProductStatistics};

pub use larder_ingest::ProductDetails;

/// A product row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub upc: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Category,
    pub first_purchased_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: i64,
    pub placed_at: NaiveDateTime,
    pub item_count: u32,
    pub total_quantity: u64,
    pub notes: Option<String>,
}

/// A product together with its latest statistics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductProfile {
    pub product: Product,
    pub statistics: ProductStatistics,
}
