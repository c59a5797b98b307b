//! Statistics orchestrator: recompute and store one product's statistics.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use tracing::{debug, warn};

use larder_core::{compute_statistics, EventType, PredictionConfig, ProductStatistics};

use crate::database::{queries, with_immediate};
use crate::error::EngineResult;
use crate::models::ProductProfile;

const CONSUMPTION_EVENTS: [EventType; 2] = [EventType::OrderPlaced, EventType::PantryDepleted];

/// Recompute statistics for `product_id` from the full ledger.
///
/// Read, compute and upsert happen in one `IMMEDIATE` transaction, so
/// concurrent writers of the same product serialize and each sees every
/// committed event. The detected category is applied to the product unless
/// the user set it manually. Returns `None` when the product has no
/// qualifying events.
pub fn update_product_stats(
    conn: &Connection,
    product_id: &str,
    config: &PredictionConfig,
    now: NaiveDateTime,
) -> EngineResult<Option<ProductStatistics>> {
    with_immediate(conn, |tx| {
        let events = queries::events_for_product(tx, product_id, &CONSUMPTION_EVENTS)?;
        let Some(stats) = compute_statistics(product_id, &events, config) else {
            debug!(product_id, "no qualifying events, statistics untouched");
            return Ok(None);
        };

        queries::upsert_statistics(tx, &stats)?;

        if let Some(product) = queries::get_product(tx, product_id)? {
            let next = product.category.apply_detected(stats.detected_category);
            if next != product.category {
                queries::update_category(tx, product_id, next, now)?;
            }
        }

        debug!(
            product_id,
            total_purchases = stats.total_purchases,
            avg_days = ?stats.avg_days_between_purchases,
            category = %stats.detected_category,
            "statistics recomputed"
        );
        Ok(Some(stats))
    })
}

/// Outcome of a bulk recompute.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct BulkUpdate {
    pub updated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Recompute every product in `product_ids`, or every product with
/// purchases when `None`. One failure does not stop the others.
pub fn update_all_product_stats(
    conn: &Connection,
    product_ids: Option<&[String]>,
    config: &PredictionConfig,
    now: NaiveDateTime,
) -> EngineResult<BulkUpdate> {
    let ids = match product_ids {
        Some(ids) => ids.to_vec(),
        None => queries::products_with_purchases(conn)?,
    };

    let mut out = BulkUpdate::default();
    for id in ids {
        match update_product_stats(conn, &id, config, now) {
            Ok(_) => out.updated.push(id),
            Err(e) => {
                warn!(product_id = %id, error = %e, "statistics recompute failed");
                out.failed.push((id, e.to_string()));
            }
        }
    }
    Ok(out)
}

/// Stored statistics for one product together with its product row.
pub fn product_statistics(
    conn: &Connection,
    product_id: &str,
) -> EngineResult<Option<ProductProfile>> {
    let Some(statistics) = queries::get_statistics(conn, product_id)? else {
        return Ok(None);
    };
    let Some(product) = queries::get_product(conn, product_id)? else {
        return Ok(None);
    };
    Ok(Some(ProductProfile {
        product,
        statistics,
    }))
}

pub fn all_product_statistics(conn: &Connection) -> EngineResult<Vec<ProductProfile>> {
    Ok(queries::list_statistics_with_products(conn)?
        .into_iter()
        .map(|(product, statistics)| ProductProfile {
            product,
            statistics,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_in_memory;
    use crate::models::ProductDetails;
    use chrono::NaiveDate;
    use larder_core::{Category, CategoryType, PurchaseEvent};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn seed(conn: &Connection, id: &str, dates: &[NaiveDate]) {
        let now = dates[0].and_hms_opt(8, 0, 0).unwrap();
        queries::ensure_product(conn, id, &ProductDetails::default(), None, now).unwrap();
        for d in dates {
            let e = PurchaseEvent::on_date(id, 1, EventType::OrderPlaced, *d);
            queries::insert_event(conn, &e).unwrap();
        }
    }

    #[test]
    fn test_recompute_stores_and_categorizes() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        seed(&conn, "milk", &[day(1, 1), day(1, 8), day(1, 15)]);
        let now = day(1, 20).and_hms_opt(0, 0, 0).unwrap();

        let stats = update_product_stats(&conn, "milk", &cfg, now).unwrap().unwrap();
        assert_eq!(stats.avg_days_between_purchases, Some(7.0));
        assert_eq!(queries::get_statistics(&conn, "milk").unwrap(), Some(stats));
        let product = queries::get_product(&conn, "milk").unwrap().unwrap();
        assert_eq!(product.category, Category::Auto(CategoryType::Routine));
    }

    #[test]
    fn test_recompute_twice_is_identical() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        seed(&conn, "bread", &[day(1, 1), day(1, 21), day(1, 31), day(2, 10)]);
        let now = day(2, 11).and_hms_opt(0, 0, 0).unwrap();

        update_product_stats(&conn, "bread", &cfg, now).unwrap();
        let first = queries::get_statistics(&conn, "bread").unwrap();
        update_product_stats(&conn, "bread", &cfg, now).unwrap();
        let second = queries::get_statistics(&conn, "bread").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_manual_category_survives_recompute() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        seed(&conn, "cake", &[day(1, 1), day(1, 8), day(1, 15)]);
        let now = day(1, 20).and_hms_opt(0, 0, 0).unwrap();
        queries::update_category(&conn, "cake", Category::Manual(CategoryType::Treat), now).unwrap();

        let stats = update_product_stats(&conn, "cake", &cfg, now).unwrap().unwrap();
        assert_eq!(stats.detected_category, CategoryType::Routine);
        let product = queries::get_product(&conn, "cake").unwrap().unwrap();
        assert_eq!(product.category, Category::Manual(CategoryType::Treat));
    }

    #[test]
    fn test_no_events_leaves_no_row() {
        let conn = init_in_memory().unwrap();
        let now = day(1, 1).and_hms_opt(0, 0, 0).unwrap();
        queries::ensure_product(&conn, "salt", &ProductDetails::default(), None, now).unwrap();
        let out = update_product_stats(&conn, "salt", &PredictionConfig::default(), now).unwrap();
        assert_eq!(out, None);
        assert!(product_statistics(&conn, "salt").unwrap().is_none());
    }

    #[test]
    fn test_bulk_update_covers_purchased_products() {
        let conn = init_in_memory().unwrap();
        let cfg = PredictionConfig::default();
        seed(&conn, "a", &[day(1, 1), day(1, 8)]);
        seed(&conn, "b", &[day(2, 1)]);
        let now = day(3, 1).and_hms_opt(0, 0, 0).unwrap();
        let out = update_all_product_stats(&conn, None, &cfg, now).unwrap();
        assert_eq!(out.updated, vec!["a".to_string(), "b".to_string()]);
        assert!(out.failed.is_empty());
        assert_eq!(all_product_statistics(&conn).unwrap().len(), 2);
    }
}
