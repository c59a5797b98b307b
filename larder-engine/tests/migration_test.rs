//! Backfill from legacy JSON documents on disk.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use tempfile::TempDir;

use larder_core::{Category, CategoryType, EventType, PredictionConfig};
use larder_engine::{
    init_in_memory, migration_status, product_category, purchase_events, run_backfill,
    MigrationInput, MigrationOutcome,
};
use larder_ingest::{load_cart, load_order_history, LegacySource};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 4, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

const ORDER_HISTORY: &str = r#"[
  {"placed_at": "2024-01-01T09:00:00", "items": [
    {"product_id": "0001", "quantity": 1, "description": "Whole Milk", "modality": "PICKUP"},
    {"product_id": "0002", "quantity": 2, "description": "Bananas"}
  ]},
  {"placed_at": "2024-01-08T09:00:00Z", "items": [
    {"product_id": "0001", "quantity": 1},
    {"quantity": 1}
  ]},
  {"placed_at": "2024-01-15", "notes": "weekly", "items": [
    {"product_id": "0001", "quantity": 1}
  ]},
  {"placed_at": "not a date", "items": []}
]"#;

const CART: &str = r#"{
  "current_cart": [
    {"product_id": "0003", "quantity": 1, "added_at": "2024-03-30T18:00:00", "description": "Chips"},
    {"product_id": "0004", "quantity": 0}
  ],
  "last_updated": "2024-03-30T18:00:00"
}"#;

fn write_fixtures(dir: &TempDir) -> MigrationInput {
    let orders_path = dir.path().join("order_history.json");
    let cart_path = dir.path().join("cart.json");
    fs::write(&orders_path, ORDER_HISTORY).unwrap();
    fs::write(&cart_path, CART).unwrap();
    MigrationInput {
        order_history: load_order_history(&orders_path).unwrap(),
        cart: load_cart(&cart_path).unwrap(),
    }
}

#[test]
fn test_backfill_imports_and_derives() {
    let dir = TempDir::new().unwrap();
    let conn = init_in_memory().unwrap();
    let cfg = PredictionConfig::default();
    let input = write_fixtures(&dir);

    let outcome = run_backfill(&conn, &input, now(), &cfg).unwrap();
    let MigrationOutcome::Migrated { summary } = outcome else {
        panic!("expected a fresh migration");
    };
    assert_eq!(summary.orders_migrated, 3);
    assert_eq!(summary.items_migrated, 4);
    assert_eq!(summary.cart_items_migrated, 1);
    assert_eq!(summary.products_migrated, 3);
    // missing product_id, bad date, zero quantity
    assert_eq!(summary.errors.len(), 3);
    assert_eq!(
        summary
            .errors
            .iter()
            .filter(|e| e.source == LegacySource::Cart)
            .count(),
        1
    );
    assert!(summary.warnings.is_empty());

    assert_eq!(
        product_category(&conn, "0001").unwrap(),
        Some(Category::Auto(CategoryType::Routine))
    );
    let cart = purchase_events(&conn, "0003", Some(EventType::CartAdd), 10).unwrap();
    assert_eq!(cart.len(), 1);
    let stats = larder_engine::product_statistics(&conn, "0001").unwrap().unwrap();
    assert_eq!(stats.statistics.avg_days_between_purchases, Some(7.0));
    assert_eq!(stats.product.description.as_deref(), Some("Whole Milk"));

    let marker = migration_status(&conn).unwrap().unwrap();
    assert_eq!(marker.orders, 3);
    assert_eq!(marker.products, 3);
    assert_eq!(marker.migrated_at, now());
}

#[test]
fn test_second_run_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let conn = init_in_memory().unwrap();
    let cfg = PredictionConfig::default();
    let input = write_fixtures(&dir);

    run_backfill(&conn, &input, now(), &cfg).unwrap();
    let again = run_backfill(&conn, &input, now(), &cfg).unwrap();
    assert!(matches!(again, MigrationOutcome::AlreadyMigrated { .. }));

    let events = purchase_events(&conn, "0001", None, 100).unwrap();
    assert_eq!(events.len(), 3);
}

#[test]
fn test_missing_files_mean_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let input = MigrationInput {
        order_history: load_order_history(&dir.path().join("absent.json")).unwrap(),
        cart: load_cart(&dir.path().join("absent_cart.json")).unwrap(),
    };
    let conn = init_in_memory().unwrap();
    let out = run_backfill(&conn, &input, now(), &PredictionConfig::default()).unwrap();
    assert_eq!(out, MigrationOutcome::NothingToMigrate);
}
