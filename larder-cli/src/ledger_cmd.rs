use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::Subcommand;
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

use larder_engine::{
    all_product_statistics, clear_migration_marker, migration_status, order_history,
    product_statistics, record_cart_add, record_order, run_backfill, update_all_product_stats,
    MigrationInput, MigrationOutcome, MigrationSummary, OrderItem, ProductDetails, ProductProfile,
};
use larder_core::PredictionConfig;
use larder_ingest::{load_cart, load_order_history};

use crate::output::{label, or_dash, print_json};
use crate::state::{legacy_cart_path, legacy_order_history_path};
use crate::Ctx;

#[derive(Subcommand, Debug)]
pub enum CartCommand {
    /// Record one product added to the cart
    Add {
        product_id: String,

        #[arg(long, default_value_t = 1)]
        quantity: i64,

        /// PICKUP or DELIVERY
        #[arg(long)]
        modality: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    /// Record a placed order: `larder order place 0001:2 0002`
    Place {
        /// Items as PRODUCT_ID or PRODUCT_ID:QUANTITY
        #[arg(required = true)]
        items: Vec<String>,

        #[arg(long)]
        modality: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Most recent orders
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum StatsCommand {
    /// Stored statistics for one product, or all of them
    Show { product_id: Option<String> },

    /// Recompute statistics from the ledger
    Recompute {
        /// Limit to these products (default: every product with purchases)
        product_ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MigrateCommand {
    /// Import the legacy documents once
    Run {
        /// Order history document (default: order_history.json in the data directory)
        #[arg(long)]
        orders: Option<PathBuf>,

        /// Cart document (default: cart.json in the data directory)
        #[arg(long)]
        cart: Option<PathBuf>,

        /// Import again even if a previous import was recorded
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Whether the import has run, and what it brought in
    Status,
}

/// `PRODUCT_ID` or `PRODUCT_ID:QUANTITY`.
fn parse_line_item(arg: &str) -> Result<OrderItem> {
    let (id, qty) = match arg.rsplit_once(':') {
        Some((id, qty)) => {
            let qty: i64 = qty
                .trim()
                .parse()
                .with_context(|| format!("invalid quantity in '{arg}'"))?;
            (id.trim(), qty)
        }
        None => (arg.trim(), 1),
    };
    if id.is_empty() {
        bail!("missing product id in '{arg}'");
    }
    Ok(OrderItem::new(id, qty))
}

/// Import the legacy documents the first time a database is used.
///
/// Does nothing once an import marker exists or when neither document is
/// on disk. `migrate run --force` remains the way to import again.
pub fn backfill_if_needed(
    conn: &Connection,
    orders: &Path,
    cart: &Path,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> Result<Option<MigrationSummary>> {
    if migration_status(conn)?.is_some() || !(orders.exists() || cart.exists()) {
        return Ok(None);
    }
    let input = MigrationInput {
        order_history: load_order_history(orders)?,
        cart: load_cart(cart)?,
    };
    match run_backfill(conn, &input, now, config)? {
        MigrationOutcome::Migrated { summary } => {
            info!(
                orders = summary.orders_migrated,
                cart_items = summary.cart_items_migrated,
                "legacy documents imported on first use"
            );
            Ok(Some(summary))
        }
        MigrationOutcome::AlreadyMigrated { .. } | MigrationOutcome::NothingToMigrate => Ok(None),
    }
}

pub fn run_cart(ctx: &Ctx, command: CartCommand) -> Result<()> {
    match command {
        CartCommand::Add {
            product_id,
            quantity,
            modality,
            description,
        } => {
            let mut item = OrderItem::new(&product_id, quantity);
            item.modality = modality;
            item.details = ProductDetails {
                description,
                ..Default::default()
            };
            let event_id = record_cart_add(&ctx.conn, &item, ctx.now)?;
            if ctx.json {
                return print_json(&json!({ "event_id": event_id, "product_id": product_id }));
            }
            println!("Added {product_id} x{quantity} to the cart");
        }
    }
    Ok(())
}

pub fn run_order(ctx: &Ctx, command: OrderCommand) -> Result<()> {
    match command {
        OrderCommand::Place {
            items,
            modality,
            notes,
        } => {
            let mut parsed = items
                .iter()
                .map(|s| parse_line_item(s))
                .collect::<Result<Vec<_>>>()?;
            for item in &mut parsed {
                item.modality = modality.clone();
            }
            let receipt = record_order(&ctx.conn, &parsed, notes.as_deref(), ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&receipt);
            }
            println!(
                "Order #{} recorded: {} item(s), {} unit(s)",
                receipt.order_id, receipt.item_count, receipt.total_quantity
            );
            if !receipt.restocked.is_empty() {
                println!("Restocked: {}", receipt.restocked.join(", "));
            }
            for w in &receipt.warnings {
                println!("warning: {w}");
            }
        }
        OrderCommand::History { limit } => {
            let orders = order_history(&ctx.conn, limit)?;
            if ctx.json {
                return print_json(&orders);
            }
            for o in &orders {
                println!(
                    "#{:<5} {} | {} item(s) | {} unit(s) | {}",
                    o.id,
                    o.placed_at.format("%Y-%m-%d %H:%M"),
                    o.item_count,
                    o.total_quantity,
                    or_dash(o.notes.as_deref())
                );
            }
        }
    }
    Ok(())
}

fn print_profile(p: &ProductProfile) {
    let s = &p.statistics;
    println!(
        "{} | {} | purchases {} | every {} day(s) (sd {:.1}) | last {} | seasonality {:.2}",
        label(&p.product.product_id, p.product.description.as_deref()),
        p.product.category.value(),
        s.total_purchases,
        or_dash(s.avg_days_between_purchases.map(|d| format!("{d:.1}"))),
        s.std_dev_days,
        or_dash(s.last_purchase_date),
        s.seasonality_score
    );
}

pub fn run_stats(ctx: &Ctx, command: StatsCommand) -> Result<()> {
    match command {
        StatsCommand::Show {
            product_id: Some(id),
        } => {
            let profile = product_statistics(&ctx.conn, &id)?;
            if ctx.json {
                return print_json(&profile);
            }
            match profile {
                Some(p) => print_profile(&p),
                None => println!("No statistics for {id} yet"),
            }
        }
        StatsCommand::Show { product_id: None } => {
            let all = all_product_statistics(&ctx.conn)?;
            if ctx.json {
                return print_json(&all);
            }
            for p in &all {
                print_profile(p);
            }
        }
        StatsCommand::Recompute { product_ids } => {
            let ids = (!product_ids.is_empty()).then_some(product_ids.as_slice());
            let out = update_all_product_stats(&ctx.conn, ids, &ctx.config, ctx.now)?;
            if ctx.json {
                return print_json(&out);
            }
            println!("Recomputed {} product(s)", out.updated.len());
            for (id, err) in &out.failed {
                println!("failed: {id}: {err}");
            }
        }
    }
    Ok(())
}

pub fn run_migrate(ctx: &Ctx, command: MigrateCommand) -> Result<()> {
    match command {
        MigrateCommand::Run {
            orders,
            cart,
            force,
        } => {
            let orders = orders.map_or_else(legacy_order_history_path, Ok)?;
            let cart = cart.map_or_else(legacy_cart_path, Ok)?;
            if force && clear_migration_marker(&ctx.conn)? {
                println!("Previous import marker cleared");
            }
            let input = MigrationInput {
                order_history: load_order_history(&orders)?,
                cart: load_cart(&cart)?,
            };
            let outcome = run_backfill(&ctx.conn, &input, ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&outcome);
            }
            match outcome {
                MigrationOutcome::AlreadyMigrated { marker } => println!(
                    "Already imported on {} ({} orders). Use --force to import again.",
                    marker.migrated_at.format("%Y-%m-%d %H:%M"),
                    marker.orders
                ),
                MigrationOutcome::NothingToMigrate => println!(
                    "Nothing to import: neither {} nor {} exists",
                    orders.display(),
                    cart.display()
                ),
                MigrationOutcome::Migrated { summary } => {
                    println!(
                        "Imported {} order(s), {} item(s), {} cart item(s), {} product(s)",
                        summary.orders_migrated,
                        summary.items_migrated,
                        summary.cart_items_migrated,
                        summary.products_migrated
                    );
                    for e in &summary.errors {
                        println!("skipped: {e}");
                    }
                    for w in &summary.warnings {
                        println!("warning: {w}");
                    }
                }
            }
        }
        MigrateCommand::Status => {
            let marker = migration_status(&ctx.conn)?;
            let status = match &marker {
                Some(m) => json!({ "migrated": true, "marker": m }),
                None => json!({
                    "migrated": false,
                    "has_order_history": legacy_order_history_path()?.exists(),
                    "has_cart": legacy_cart_path()?.exists(),
                }),
            };
            if ctx.json {
                return print_json(&status);
            }
            match marker {
                Some(m) => println!(
                    "Imported on {}: {} orders, {} items, {} products",
                    m.migrated_at.format("%Y-%m-%d %H:%M"),
                    m.orders,
                    m.items,
                    m.products
                ),
                None => println!(
                    "Not imported yet (order history: {}, cart: {})",
                    status["has_order_history"], status["has_cart"]
                ),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_item() {
        let item = parse_line_item("0001111041700:3").unwrap();
        assert_eq!(item.product_id, "0001111041700");
        assert_eq!(item.quantity, 3);
        assert_eq!(parse_line_item("milk").unwrap().quantity, 1);
        assert!(parse_line_item("milk:two").is_err());
        assert!(parse_line_item(":2").is_err());
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_legacy_history_is_imported_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let conn = larder_engine::init_database(&dir.path().join("larder.db")).unwrap();
        let orders = dir.path().join("order_history.json");
        let cart = dir.path().join("cart.json");
        std::fs::write(
            &orders,
            r#"[
                {"placed_at": "2024-01-01T10:00:00", "items": [{"product_id": "milk", "quantity": 1}]},
                {"placed_at": "2024-01-08T10:00:00", "items": [{"product_id": "milk", "quantity": 1}]}
            ]"#,
        )
        .unwrap();
        let cfg = PredictionConfig::default();

        let summary = backfill_if_needed(&conn, &orders, &cart, at(2024, 1, 10), &cfg)
            .unwrap()
            .expect("first use imports the history");
        assert_eq!(summary.orders_migrated, 2);
        assert!(migration_status(&conn).unwrap().is_some());

        record_order(&conn, &[OrderItem::new("milk", 1)], None, at(2024, 1, 15), &cfg).unwrap();
        let profile = product_statistics(&conn, "milk").unwrap().unwrap();
        assert_eq!(profile.statistics.total_purchases, 3);

        let again = backfill_if_needed(&conn, &orders, &cart, at(2024, 1, 16), &cfg).unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_fresh_home_without_legacy_documents_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let conn = larder_engine::init_database(&dir.path().join("larder.db")).unwrap();
        let out = backfill_if_needed(
            &conn,
            &dir.path().join("order_history.json"),
            &dir.path().join("cart.json"),
            at(2024, 1, 10),
            &PredictionConfig::default(),
        )
        .unwrap();
        assert!(out.is_none());
        assert!(migration_status(&conn).unwrap().is_none());
    }
}
