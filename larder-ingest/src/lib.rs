//! larder-ingest: legacy JSON documents (order history, saved cart) parsed into ledger records.

pub mod parsers;
pub mod types;

pub use parsers::cart::{load_cart, parse_cart, parse_cart_text};
pub use parsers::order_history::{load_order_history, parse_order_history, parse_order_history_text};
pub use types::{
    LegacyCartItem, LegacyItem, LegacyOrder, LegacySource, Parsed, ProductDetails, RecordError,
};
