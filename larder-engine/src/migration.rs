//! One-time backfill of legacy order history and cart documents.
//!
//! The import runs once per database; a marker row in `meta` records that it
//! happened and what it brought in.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use larder_core::{EventType, PredictionConfig, PurchaseEvent};
use larder_ingest::{LegacyCartItem, LegacyOrder, LegacySource, Parsed, RecordError};

use crate::categories::auto_categorize_all;
use crate::database::{queries, with_immediate, with_savepoint};
use crate::error::EngineResult;
use crate::seasonal::update_seasonal_patterns;
use crate::statistics::update_product_stats;

pub const MIGRATION_MARKER_KEY: &str = "migration_marker";

/// Parsed legacy documents. `None` means the document does not exist.
#[derive(Debug, Clone, Default)]
pub struct MigrationInput {
    pub order_history: Option<Parsed<LegacyOrder>>,
    pub cart: Option<Parsed<LegacyCartItem>>,
}

/// Stored once the import has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationMarker {
    pub migrated_at: NaiveDateTime,
    pub orders: u32,
    pub items: u32,
    pub products: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationSummary {
    pub orders_migrated: u32,
    pub items_migrated: u32,
    pub cart_items_migrated: u32,
    pub products_migrated: u32,
    /// Records skipped while parsing or importing.
    pub errors: Vec<RecordError>,
    /// Statistics, seasonal or categorization steps that failed afterwards.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    AlreadyMigrated { marker: MigrationMarker },
    NothingToMigrate,
    Migrated { summary: MigrationSummary },
}

/// Contents of the marker, or `None` before the first import.
pub fn migration_status(conn: &Connection) -> EngineResult<Option<MigrationMarker>> {
    let Some(raw) = queries::get_meta(conn, MIGRATION_MARKER_KEY)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Forget that the import ran. Importing again duplicates the ledger unless
/// the database was cleared first.
pub fn clear_migration_marker(conn: &Connection) -> EngineResult<bool> {
    queries::delete_meta(conn, MIGRATION_MARKER_KEY)
}

fn import_order(conn: &Connection, order: &LegacyOrder, now: NaiveDateTime) -> EngineResult<()> {
    let placed_at = order.placed_at.unwrap_or(now);
    let order_id = queries::insert_order(
        conn,
        placed_at,
        order.items.len() as u32,
        order.total_quantity(),
        order.notes.as_deref(),
    )?;
    for item in &order.items {
        queries::ensure_product(conn, &item.product_id, &item.details, Some(placed_at), now)?;
        let mut event =
            PurchaseEvent::new(&item.product_id, item.quantity, EventType::OrderPlaced, placed_at)
                .with_order(order_id);
        event.modality = item.modality.clone();
        queries::insert_event(conn, &event)?;
    }
    Ok(())
}

fn import_cart_item(
    conn: &Connection,
    item: &LegacyCartItem,
    now: NaiveDateTime,
) -> EngineResult<()> {
    let added_at = item.added_at.unwrap_or(now);
    queries::ensure_product(conn, &item.product_id, &item.details, None, now)?;
    let mut event = PurchaseEvent::new(&item.product_id, item.quantity, EventType::CartAdd, added_at);
    event.modality = item.modality.clone();
    queries::insert_event(conn, &event)?;
    Ok(())
}

fn import_error(source: LegacySource, index: usize, e: impl std::fmt::Display) -> RecordError {
    warn!(%source, index, error = %e, "legacy record not imported");
    RecordError {
        source,
        index,
        item_index: None,
        message: e.to_string(),
    }
}

/// Import the legacy documents into the ledger, then derive statistics,
/// seasonal patterns and categories for every imported product.
///
/// Each order and cart item imports on its own savepoint; a failing record
/// is reported and the rest continue. Orders without a timestamp are dated
/// `now`.
pub fn run_backfill(
    conn: &Connection,
    input: &MigrationInput,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<MigrationOutcome> {
    if let Some(marker) = migration_status(conn)? {
        return Ok(MigrationOutcome::AlreadyMigrated { marker });
    }
    if input.order_history.is_none() && input.cart.is_none() {
        return Ok(MigrationOutcome::NothingToMigrate);
    }

    let mut summary = MigrationSummary::default();
    let mut products: BTreeSet<String> = BTreeSet::new();

    with_immediate(conn, |tx| {
        if let Some(parsed) = &input.order_history {
            summary.errors.extend(parsed.errors.iter().cloned());
            for (index, order) in parsed.records.iter().enumerate() {
                match with_savepoint(tx, "legacy_order", |sp| import_order(sp, order, now)) {
                    Ok(()) => {
                        summary.orders_migrated += 1;
                        summary.items_migrated += order.items.len() as u32;
                        products.extend(order.items.iter().map(|i| i.product_id.clone()));
                    }
                    Err(e) => summary
                        .errors
                        .push(import_error(LegacySource::OrderHistory, index, e)),
                }
            }
        }

        if let Some(parsed) = &input.cart {
            summary.errors.extend(parsed.errors.iter().cloned());
            for (index, item) in parsed.records.iter().enumerate() {
                match with_savepoint(tx, "legacy_cart", |sp| import_cart_item(sp, item, now)) {
                    Ok(()) => {
                        summary.cart_items_migrated += 1;
                        products.insert(item.product_id.clone());
                    }
                    Err(e) => summary.errors.push(import_error(LegacySource::Cart, index, e)),
                }
            }
        }

        summary.products_migrated = products.len() as u32;
        let marker = MigrationMarker {
            migrated_at: now,
            orders: summary.orders_migrated,
            items: summary.items_migrated,
            products: summary.products_migrated,
        };
        queries::set_meta(tx, MIGRATION_MARKER_KEY, &serde_json::to_string(&marker)?)?;
        Ok(())
    })?;

    info!(
        orders = summary.orders_migrated,
        items = summary.items_migrated,
        cart_items = summary.cart_items_migrated,
        products = summary.products_migrated,
        errors = summary.errors.len(),
        "legacy data imported"
    );

    for product_id in &products {
        if let Err(e) = update_product_stats(conn, product_id, config, now) {
            warn!(product_id = %product_id, error = %e, "statistics after import failed");
            summary.warnings.push(format!("{product_id}: statistics: {e}"));
        }
        if let Err(e) = update_seasonal_patterns(conn, product_id) {
            warn!(product_id = %product_id, error = %e, "seasonal patterns after import failed");
            summary.warnings.push(format!("{product_id}: seasonal patterns: {e}"));
        }
    }
    if let Err(e) = auto_categorize_all(conn, config, now) {
        warn!(error = %e, "auto-categorization after import failed");
        summary.warnings.push(format!("auto-categorization: {e}"));
    }

    Ok(MigrationOutcome::Migrated { summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_in_memory;
    use chrono::NaiveDate;
    use larder_ingest::{parse_cart_text, parse_order_history_text};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_nothing_to_migrate_writes_no_marker() {
        let conn = init_in_memory().unwrap();
        let out = run_backfill(&conn, &MigrationInput::default(), now(), &PredictionConfig::default())
            .unwrap();
        assert_eq!(out, MigrationOutcome::NothingToMigrate);
        assert_eq!(migration_status(&conn).unwrap(), None);
    }

    #[test]
    fn test_order_without_timestamp_is_dated_now() {
        let conn = init_in_memory().unwrap();
        let input = MigrationInput {
            order_history: Some(
                parse_order_history_text(r#"[{"items": [{"product_id": "tea", "quantity": 2}]}]"#)
                    .unwrap(),
            ),
            cart: Some(parse_cart_text(r#"{"current_cart": []}"#).unwrap()),
        };
        let out = run_backfill(&conn, &input, now(), &PredictionConfig::default()).unwrap();
        let MigrationOutcome::Migrated { summary } = out else {
            panic!("expected a migration");
        };
        assert_eq!(summary.orders_migrated, 1);
        assert_eq!(summary.items_migrated, 1);
        assert_eq!(summary.products_migrated, 1);

        let events = queries::recent_events(&conn, "tea", None, 10).unwrap();
        assert_eq!(events[0].event_timestamp, now());
        assert_eq!(events[0].quantity, 2);

        assert!(clear_migration_marker(&conn).unwrap());
        assert_eq!(migration_status(&conn).unwrap(), None);
    }
}
