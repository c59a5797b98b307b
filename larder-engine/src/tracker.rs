//! Ledger writes: cart adds and placed orders.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use larder_core::{checked_quantity, EventType, PredictionConfig, PurchaseEvent, ValidationError};

use crate::database::{queries, with_immediate};
use crate::error::EngineResult;
use crate::models::{OrderRecord, ProductDetails};
use crate::pantry::restock_if_tracked;
use crate::seasonal::update_seasonal_patterns;
use crate::statistics::update_product_stats;

/// One line of an order as the caller hands it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub modality: Option<String>,
    #[serde(default)]
    pub details: ProductDetails,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            modality: None,
            details: ProductDetails::default(),
        }
    }
}

/// Register a product, or fill in details that were unknown so far.
pub fn ensure_product(
    conn: &Connection,
    product_id: &str,
    details: &ProductDetails,
    now: NaiveDateTime,
) -> EngineResult<bool> {
    queries::ensure_product(conn, product_id, details, None, now)
}

/// Append a `cart_add` event. Cart adds never touch statistics.
pub fn record_cart_add(
    conn: &Connection,
    item: &OrderItem,
    now: NaiveDateTime,
) -> EngineResult<i64> {
    let quantity = checked_quantity(item.quantity)?;
    with_immediate(conn, |tx| {
        queries::ensure_product(tx, &item.product_id, &item.details, None, now)?;
        let mut event = PurchaseEvent::new(&item.product_id, quantity, EventType::CartAdd, now);
        event.modality = item.modality.clone();
        let id = queries::insert_event(tx, &event)?;
        info!(product_id = %item.product_id, quantity, "cart add recorded");
        Ok(id)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub order_id: i64,
    pub placed_at: NaiveDateTime,
    pub item_count: u32,
    pub total_quantity: u64,
    /// Distinct products in order of first appearance.
    pub products: Vec<String>,
    /// Tracked pantry items refilled by this order.
    pub restocked: Vec<String>,
    /// Enrichment steps that failed after the order was committed.
    pub warnings: Vec<String>,
}

/// Record a placed order and bring everything derived from it up to date.
///
/// The order row and its `order_placed` events commit together. Statistics,
/// seasonal patterns and pantry restocks follow per product; a failure there
/// is logged and reported in the receipt, and the order stays recorded.
pub fn record_order(
    conn: &Connection,
    items: &[OrderItem],
    notes: Option<&str>,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<OrderReceipt> {
    if items.is_empty() {
        return Err(ValidationError::EmptyOrder.into());
    }
    let quantities = items
        .iter()
        .map(|i| checked_quantity(i.quantity))
        .collect::<Result<Vec<_>, _>>()?;
    let total_quantity: u64 = quantities.iter().map(|&q| u64::from(q)).sum();
    let item_count = items.len() as u32;

    let order_id = with_immediate(conn, |tx| {
        let order_id = queries::insert_order(tx, now, item_count, total_quantity, notes)?;
        for (item, &quantity) in items.iter().zip(&quantities) {
            queries::ensure_product(tx, &item.product_id, &item.details, Some(now), now)?;
            let mut event =
                PurchaseEvent::new(&item.product_id, quantity, EventType::OrderPlaced, now)
                    .with_order(order_id);
            event.modality = item.modality.clone();
            queries::insert_event(tx, &event)?;
        }
        Ok(order_id)
    })?;
    info!(order_id, item_count, total_quantity, "order recorded");

    let mut products: Vec<String> = Vec::new();
    for item in items {
        if !products.contains(&item.product_id) {
            products.push(item.product_id.clone());
        }
    }

    let mut receipt = OrderReceipt {
        order_id,
        placed_at: now,
        item_count,
        total_quantity,
        products,
        restocked: Vec::new(),
        warnings: Vec::new(),
    };

    for product_id in &receipt.products {
        if let Err(e) = update_product_stats(conn, product_id, config, now) {
            warn!(product_id = %product_id, error = %e, "statistics update after order failed");
            receipt.warnings.push(format!("{product_id}: statistics: {e}"));
        }
        if let Err(e) = update_seasonal_patterns(conn, product_id) {
            warn!(product_id = %product_id, error = %e, "seasonal update after order failed");
            receipt.warnings.push(format!("{product_id}: seasonal patterns: {e}"));
        }
        match restock_if_tracked(conn, product_id, now) {
            Ok(true) => receipt.restocked.push(product_id.clone()),
            Ok(false) => {}
            Err(e) => {
                warn!(product_id = %product_id, error = %e, "pantry restock after order failed");
                receipt.warnings.push(format!("{product_id}: pantry restock: {e}"));
            }
        }
    }

    Ok(receipt)
}

/// Most recent events for a product, newest first.
pub fn purchase_events(
    conn: &Connection,
    product_id: &str,
    event_type: Option<EventType>,
    limit: u32,
) -> EngineResult<Vec<PurchaseEvent>> {
    queries::recent_events(conn, product_id, event_type, limit)
}

pub fn order_history(conn: &Connection, limit: u32) -> EngineResult<Vec<OrderRecord>> {
    queries::list_orders(conn, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_in_memory;
    use crate::error::EngineError;
    use crate::pantry::{add_to_pantry, TrackOptions};
    use chrono::{Duration, NaiveDate};
    use larder_core::{Category, CategoryType};

    fn at(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_cart_add_leaves_statistics_alone() {
        let conn = init_in_memory().unwrap();
        let mut item = OrderItem::new("milk", 2);
        item.modality = Some("PICKUP".into());
        record_cart_add(&conn, &item, at(1, 1)).unwrap();

        let events = purchase_events(&conn, "milk", None, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::CartAdd);
        assert_eq!(events[0].modality.as_deref(), Some("PICKUP"));
        assert!(queries::get_statistics(&conn, "milk").unwrap().is_none());
    }

    #[test]
    fn test_invalid_orders_are_rejected() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        assert!(matches!(
            record_order(&conn, &[], None, at(1, 1), &cfg),
            Err(EngineError::Validation(ValidationError::EmptyOrder))
        ));
        assert!(matches!(
            record_order(&conn, &[OrderItem::new("milk", 0)], None, at(1, 1), &cfg),
            Err(EngineError::Validation(ValidationError::InvalidQuantity(0)))
        ));
        assert!(order_history(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn test_large_order_totals_are_stored_exactly() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        let items = [
            OrderItem::new("rice", 3_000_000_000),
            OrderItem::new("rice", 3_000_000_000),
        ];
        let receipt = record_order(&conn, &items, None, at(1, 1), &cfg).unwrap();
        assert_eq!(receipt.total_quantity, 6_000_000_000);
        assert!(receipt.warnings.is_empty());

        let orders = order_history(&conn, 10).unwrap();
        assert_eq!(orders[0].total_quantity, 6_000_000_000);
        let stats = queries::get_statistics(&conn, "rice").unwrap().unwrap();
        assert_eq!(stats.total_quantity, 6_000_000_000);
    }

    #[test]
    fn test_orders_build_statistics_and_category() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        for day in [1, 8, 15] {
            let items = [OrderItem::new("milk", 1), OrderItem::new("bread", 2)];
            record_order(&conn, &items, Some("weekly"), at(1, day), &cfg).unwrap();
        }

        let orders = order_history(&conn, 10).unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].placed_at, at(1, 15));
        assert_eq!(orders[0].total_quantity, 3);

        let stats = queries::get_statistics(&conn, "bread").unwrap().unwrap();
        assert_eq!(stats.total_purchases, 3);
        assert_eq!(stats.total_quantity, 6);
        assert_eq!(stats.avg_days_between_purchases, Some(7.0));
        let product = queries::get_product(&conn, "milk").unwrap().unwrap();
        assert_eq!(product.category, Category::Auto(CategoryType::Routine));
        assert_eq!(product.first_purchased_at, Some(at(1, 1)));
    }

    #[test]
    fn test_order_restocks_tracked_items() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        let options = TrackOptions {
            level: 10.0,
            ..Default::default()
        };
        add_to_pantry(&conn, "rice", &options, at(1, 1)).unwrap();

        let later = at(1, 1) + Duration::days(3);
        let receipt = record_order(
            &conn,
            &[OrderItem::new("rice", 1), OrderItem::new("beans", 1), OrderItem::new("rice", 1)],
            None,
            later,
            &cfg,
        )
        .unwrap();
        assert_eq!(receipt.products, vec!["rice".to_string(), "beans".to_string()]);
        assert_eq!(receipt.restocked, vec!["rice".to_string()]);
        assert!(receipt.warnings.is_empty());

        let item = queries::get_pantry_item(&conn, "rice").unwrap().unwrap();
        assert_eq!(item.level_percent, 100.0);
        assert_eq!(item.last_restocked_at, Some(later));
    }
}
