use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;

use larder_core::{
    Category, CategoryType, EventType, Holiday, PantryItem, ProductStatistics, PurchaseEvent,
    SeasonalPattern,
};

use super::{date_from_sql, date_to_sql, timestamp_from_sql, timestamp_to_sql};
use crate::error::{EngineError, EngineResult};
use crate::models::{OrderRecord, Product, ProductDetails};

fn corrupt(table: &'static str, column: &'static str, value: impl Into<String>) -> EngineError {
    EngineError::CorruptRow {
        table,
        column,
        value: value.into(),
    }
}

fn parse_enum<T: FromStr>(table: &'static str, column: &'static str, raw: &str) -> EngineResult<T> {
    raw.parse::<T>().map_err(|_| corrupt(table, column, raw))
}

fn count_to_u32(table: &'static str, column: &'static str, raw: i64) -> EngineResult<u32> {
    u32::try_from(raw).map_err(|_| corrupt(table, column, raw.to_string()))
}

fn count_to_u64(table: &'static str, column: &'static str, raw: i64) -> EngineResult<u64> {
    u64::try_from(raw).map_err(|_| corrupt(table, column, raw.to_string()))
}

// ---------------------------------------------------------------- products

/// Insert the product if missing; fill in details that were unknown so far.
/// Returns true when a new row was created.
pub fn ensure_product(
    conn: &Connection,
    product_id: &str,
    details: &ProductDetails,
    first_purchased_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> EngineResult<bool> {
    let now_s = timestamp_to_sql(now);
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO products
            (product_id, upc, description, brand, first_purchased_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            product_id,
            details.upc,
            details.description,
            details.brand,
            first_purchased_at.map(timestamp_to_sql),
            now_s,
        ],
    )?;
    if inserted == 0 {
        conn.execute(
            "UPDATE products SET
                upc = COALESCE(upc, ?2),
                description = COALESCE(description, ?3),
                brand = COALESCE(brand, ?4),
                first_purchased_at = COALESCE(first_purchased_at, ?5)
             WHERE product_id = ?1",
            params![
                product_id,
                details.upc,
                details.description,
                details.brand,
                first_purchased_at.map(timestamp_to_sql),
            ],
        )?;
    }
    Ok(inserted > 0)
}

type ProductRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    bool,
    Option<String>,
);

const PRODUCT_COLUMNS: &str = "product_id, upc, description, brand, category_type,
    category_override, first_purchased_at";

fn product_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get::<_, i64>(5)? != 0,
        row.get(6)?,
    ))
}

fn product_from_row(raw: ProductRow) -> EngineResult<Product> {
    let (product_id, upc, description, brand, category, is_override, first) = raw;
    let category: CategoryType = parse_enum("products", "category_type", &category)?;
    Ok(Product {
        product_id,
        upc,
        description,
        brand,
        category: Category::from_parts(category, is_override),
        first_purchased_at: first
            .map(|s| timestamp_from_sql("products", "first_purchased_at", &s))
            .transpose()?,
    })
}

pub fn get_product(conn: &Connection, product_id: &str) -> EngineResult<Option<Product>> {
    let raw = conn
        .query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"),
            [product_id],
            product_row,
        )
        .optional()?;
    raw.map(product_from_row).transpose()
}

pub fn list_products(conn: &Connection) -> EngineResult<Vec<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY description, product_id"
    ))?;
    let rows = stmt
        .query_map([], product_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(product_from_row).collect()
}

pub fn products_in_category(
    conn: &Connection,
    category: CategoryType,
) -> EngineResult<Vec<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_type = ?1
         ORDER BY description, product_id"
    ))?;
    let rows = stmt
        .query_map([category.as_str()], product_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(product_from_row).collect()
}

pub fn category_counts(conn: &Connection) -> EngineResult<Vec<(CategoryType, u32)>> {
    let mut stmt = conn.prepare(
        "SELECT category_type, COUNT(*) FROM products GROUP BY category_type ORDER BY category_type",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(cat, n)| {
            Ok((
                parse_enum("products", "category_type", &cat)?,
                count_to_u32("products", "category_type", n)?,
            ))
        })
        .collect()
}

pub fn update_category(
    conn: &Connection,
    product_id: &str,
    category: Category,
    now: NaiveDateTime,
) -> EngineResult<()> {
    conn.execute(
        "UPDATE products SET category_type = ?2, category_override = ?3, updated_at = ?4
         WHERE product_id = ?1",
        params![
            product_id,
            category.value().as_str(),
            category.is_override(),
            timestamp_to_sql(now),
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------- orders

pub fn insert_order(
    conn: &Connection,
    placed_at: NaiveDateTime,
    item_count: u32,
    total_quantity: u64,
    notes: Option<&str>,
) -> EngineResult<i64> {
    conn.execute(
        "INSERT INTO orders (placed_at, item_count, total_quantity, notes)
         VALUES (?1, ?2, ?3, ?4)",
        params![timestamp_to_sql(placed_at), item_count, total_quantity, notes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_orders(conn: &Connection, limit: u32) -> EngineResult<Vec<OrderRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, placed_at, item_count, total_quantity, notes
         FROM orders ORDER BY placed_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, placed_at, items, qty, notes)| {
            Ok(OrderRecord {
                id,
                placed_at: timestamp_from_sql("orders", "placed_at", &placed_at)?,
                item_count: count_to_u32("orders", "item_count", items)?,
                total_quantity: count_to_u64("orders", "total_quantity", qty)?,
                notes,
            })
        })
        .collect()
}

// ---------------------------------------------------------------- events

pub fn insert_event(conn: &Connection, event: &PurchaseEvent) -> EngineResult<i64> {
    conn.execute(
        "INSERT INTO purchase_events
            (product_id, quantity, event_type, modality, event_date, event_timestamp, order_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.product_id,
            event.quantity,
            event.event_type.as_str(),
            event.modality,
            date_to_sql(event.event_date),
            timestamp_to_sql(event.event_timestamp),
            event.order_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type EventRow = (String, i64, String, Option<String>, String, String, Option<i64>);

const EVENT_COLUMNS: &str =
    "product_id, quantity, event_type, modality, event_date, event_timestamp, order_id";

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn event_from_row(raw: EventRow) -> EngineResult<PurchaseEvent> {
    let (product_id, quantity, event_type, modality, date, ts, order_id) = raw;
    Ok(PurchaseEvent {
        product_id,
        quantity: count_to_u32("purchase_events", "quantity", quantity)?.max(1),
        event_type: parse_enum::<EventType>("purchase_events", "event_type", &event_type)?,
        modality,
        event_date: date_from_sql("purchase_events", "event_date", &date)?,
        event_timestamp: timestamp_from_sql("purchase_events", "event_timestamp", &ts)?,
        order_id,
    })
}

/// Events of the given types for one product, oldest first.
pub fn events_for_product(
    conn: &Connection,
    product_id: &str,
    types: &[EventType],
) -> EngineResult<Vec<PurchaseEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM purchase_events WHERE product_id = ?1
         ORDER BY event_date ASC, event_timestamp ASC, id ASC"
    ))?;
    let rows = stmt
        .query_map([product_id], event_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let events = rows
        .into_iter()
        .map(event_from_row)
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(events
        .into_iter()
        .filter(|e| types.contains(&e.event_type))
        .collect())
}

/// Most recent events for one product, newest first.
pub fn recent_events(
    conn: &Connection,
    product_id: &str,
    event_type: Option<EventType>,
    limit: u32,
) -> EngineResult<Vec<PurchaseEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM purchase_events
         WHERE product_id = ?1 AND (?2 IS NULL OR event_type = ?2)
         ORDER BY event_timestamp DESC, id DESC LIMIT ?3"
    ))?;
    let rows = stmt
        .query_map(
            params![product_id, event_type.map(|t| t.as_str()), limit],
            event_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(event_from_row).collect()
}

pub fn count_events(
    conn: &Connection,
    product_id: &str,
    event_type: EventType,
) -> EngineResult<u32> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM purchase_events WHERE product_id = ?1 AND event_type = ?2",
        params![product_id, event_type.as_str()],
        |row| row.get(0),
    )?;
    count_to_u32("purchase_events", "id", n)
}

/// Products with at least one consumption event.
pub fn products_with_purchases(conn: &Connection) -> EngineResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT product_id FROM purchase_events
         WHERE event_type IN ('order_placed', 'pantry_depleted')
         ORDER BY product_id",
    )?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

// ---------------------------------------------------------------- statistics

pub fn upsert_statistics(conn: &Connection, stats: &ProductStatistics) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO product_statistics
            (product_id, total_purchases, total_quantity, avg_quantity_per_purchase,
             avg_days_between_purchases, std_dev_days, last_purchase_date,
             first_purchase_date, purchase_frequency_score, seasonality_score,
             detected_category, confidence)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(product_id) DO UPDATE SET
            total_purchases = excluded.total_purchases,
            total_quantity = excluded.total_quantity,
            avg_quantity_per_purchase = excluded.avg_quantity_per_purchase,
            avg_days_between_purchases = excluded.avg_days_between_purchases,
            std_dev_days = excluded.std_dev_days,
            last_purchase_date = excluded.last_purchase_date,
            first_purchase_date = excluded.first_purchase_date,
            purchase_frequency_score = excluded.purchase_frequency_score,
            seasonality_score = excluded.seasonality_score,
            detected_category = excluded.detected_category,
            confidence = excluded.confidence",
        params![
            stats.product_id,
            stats.total_purchases,
            stats.total_quantity,
            stats.avg_quantity_per_purchase,
            stats.avg_days_between_purchases,
            stats.std_dev_days,
            stats.last_purchase_date.map(date_to_sql),
            stats.first_purchase_date.map(date_to_sql),
            stats.purchase_frequency_score,
            stats.seasonality_score,
            stats.detected_category.as_str(),
            stats.confidence,
        ],
    )?;
    Ok(())
}

type StatsRow = (
    String,
    i64,
    i64,
    f64,
    Option<f64>,
    f64,
    Option<String>,
    Option<String>,
    f64,
    f64,
    String,
    f64,
);

const STATS_COLUMNS: &str = "s.product_id, s.total_purchases, s.total_quantity,
    s.avg_quantity_per_purchase, s.avg_days_between_purchases, s.std_dev_days,
    s.last_purchase_date, s.first_purchase_date, s.purchase_frequency_score,
    s.seasonality_score, s.detected_category, s.confidence";

fn stats_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatsRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn stats_from_row(raw: StatsRow) -> EngineResult<ProductStatistics> {
    const T: &str = "product_statistics";
    let (id, total, qty, avg_qty, avg_days, std, last, first, freq, season, cat, conf) = raw;
    Ok(ProductStatistics {
        product_id: id,
        total_purchases: count_to_u32(T, "total_purchases", total)?,
        total_quantity: count_to_u64(T, "total_quantity", qty)?,
        avg_quantity_per_purchase: avg_qty,
        avg_days_between_purchases: avg_days,
        std_dev_days: std,
        last_purchase_date: last
            .map(|s| date_from_sql(T, "last_purchase_date", &s))
            .transpose()?,
        first_purchase_date: first
            .map(|s| date_from_sql(T, "first_purchase_date", &s))
            .transpose()?,
        purchase_frequency_score: freq,
        seasonality_score: season,
        detected_category: parse_enum(T, "detected_category", &cat)?,
        confidence: conf,
    })
}

pub fn get_statistics(
    conn: &Connection,
    product_id: &str,
) -> EngineResult<Option<ProductStatistics>> {
    let raw = conn
        .query_row(
            &format!("SELECT {STATS_COLUMNS} FROM product_statistics s WHERE s.product_id = ?1"),
            [product_id],
            stats_row,
        )
        .optional()?;
    raw.map(stats_from_row).transpose()
}

/// Every statistics row joined with its product.
pub fn list_statistics_with_products(
    conn: &Connection,
) -> EngineResult<Vec<(Product, ProductStatistics)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STATS_COLUMNS}, p.product_id, p.upc, p.description, p.brand,
                p.category_type, p.category_override, p.first_purchased_at
         FROM product_statistics s
         JOIN products p ON p.product_id = s.product_id
         ORDER BY s.product_id"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            let stats = stats_row(row)?;
            let product = (
                row.get(12)?,
                row.get(13)?,
                row.get(14)?,
                row.get(15)?,
                row.get(16)?,
                row.get::<_, i64>(17)? != 0,
                row.get(18)?,
            );
            Ok((product, stats))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(p, s)| Ok((product_from_row(p)?, stats_from_row(s)?)))
        .collect()
}

// ---------------------------------------------------------------- seasonal

pub fn upsert_seasonal_patterns(
    conn: &Connection,
    patterns: &[SeasonalPattern],
) -> EngineResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO seasonal_patterns
            (product_id, month, purchase_count, avg_quantity, is_peak_period, holiday_association)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(product_id, month) DO UPDATE SET
            purchase_count = excluded.purchase_count,
            avg_quantity = excluded.avg_quantity,
            is_peak_period = excluded.is_peak_period,
            holiday_association = excluded.holiday_association",
    )?;
    for p in patterns {
        stmt.execute(params![
            p.product_id,
            p.month,
            p.purchase_count,
            p.avg_quantity,
            p.is_peak_period,
            p.holiday_association.map(|h| h.as_str()),
        ])?;
    }
    Ok(())
}

type PatternRow = (String, i64, i64, f64, bool, Option<String>);

const PATTERN_COLUMNS: &str = "sp.product_id, sp.month, sp.purchase_count, sp.avg_quantity,
    sp.is_peak_period, sp.holiday_association";

fn pattern_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatternRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get::<_, i64>(4)? != 0,
        row.get(5)?,
    ))
}

fn pattern_from_row(raw: PatternRow) -> EngineResult<SeasonalPattern> {
    const T: &str = "seasonal_patterns";
    let (product_id, month, count, avg_quantity, is_peak, holiday) = raw;
    Ok(SeasonalPattern {
        product_id,
        month: count_to_u32(T, "month", month)?,
        purchase_count: count_to_u32(T, "purchase_count", count)?,
        avg_quantity,
        is_peak_period: is_peak,
        holiday_association: holiday
            .map(|h| parse_enum::<Holiday>(T, "holiday_association", &h))
            .transpose()?,
    })
}

pub fn seasonal_patterns_for(
    conn: &Connection,
    product_id: &str,
) -> EngineResult<Vec<SeasonalPattern>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATTERN_COLUMNS} FROM seasonal_patterns sp
         WHERE sp.product_id = ?1 ORDER BY sp.month"
    ))?;
    let rows = stmt
        .query_map([product_id], pattern_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(pattern_from_row).collect()
}

/// Every peak-month row joined with its product.
pub fn peak_patterns(conn: &Connection) -> EngineResult<Vec<(SeasonalPattern, Product)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATTERN_COLUMNS}, p.product_id, p.upc, p.description, p.brand,
                p.category_type, p.category_override, p.first_purchased_at
         FROM seasonal_patterns sp
         JOIN products p ON p.product_id = sp.product_id
         WHERE sp.is_peak_period = 1
         ORDER BY sp.month, p.description, sp.product_id"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            let pattern = pattern_row(row)?;
            let product = (
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
                row.get::<_, i64>(11)? != 0,
                row.get(12)?,
            );
            Ok((pattern, product))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(sp, p)| Ok((pattern_from_row(sp)?, product_from_row(p)?)))
        .collect()
}

// ---------------------------------------------------------------- pantry

pub fn upsert_pantry_item(conn: &Connection, item: &PantryItem) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO pantry_items
            (product_id, description, level_percent, last_restocked_at, last_updated_at,
             auto_deplete, daily_depletion_rate, low_threshold)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(product_id) DO UPDATE SET
            description = COALESCE(excluded.description, description),
            level_percent = excluded.level_percent,
            last_restocked_at = excluded.last_restocked_at,
            last_updated_at = excluded.last_updated_at,
            auto_deplete = excluded.auto_deplete,
            daily_depletion_rate = excluded.daily_depletion_rate,
            low_threshold = excluded.low_threshold",
        params![
            item.product_id,
            item.description,
            item.level_percent,
            item.last_restocked_at.map(timestamp_to_sql),
            timestamp_to_sql(item.last_updated_at),
            item.auto_deplete,
            item.daily_depletion_rate,
            item.low_threshold,
        ],
    )?;
    Ok(())
}

type PantryRow = (String, Option<String>, f64, Option<String>, String, bool, f64, f64);

const PANTRY_COLUMNS: &str = "product_id, description, level_percent, last_restocked_at,
    last_updated_at, auto_deplete, daily_depletion_rate, low_threshold";

fn pantry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PantryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get::<_, i64>(5)? != 0,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn pantry_from_row(raw: PantryRow) -> EngineResult<PantryItem> {
    const T: &str = "pantry_items";
    let (product_id, description, level, restocked, updated, auto, rate, threshold) = raw;
    Ok(PantryItem {
        product_id,
        description,
        level_percent: level,
        last_restocked_at: restocked
            .map(|s| timestamp_from_sql(T, "last_restocked_at", &s))
            .transpose()?,
        last_updated_at: timestamp_from_sql(T, "last_updated_at", &updated)?,
        auto_deplete: auto,
        daily_depletion_rate: rate.max(0.0),
        low_threshold: threshold,
    })
}

pub fn get_pantry_item(conn: &Connection, product_id: &str) -> EngineResult<Option<PantryItem>> {
    let raw = conn
        .query_row(
            &format!("SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE product_id = ?1"),
            [product_id],
            pantry_row,
        )
        .optional()?;
    raw.map(pantry_from_row).transpose()
}

pub fn list_pantry_items(conn: &Connection) -> EngineResult<Vec<PantryItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PANTRY_COLUMNS} FROM pantry_items ORDER BY product_id"
    ))?;
    let rows = stmt
        .query_map([], pantry_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(pantry_from_row).collect()
}

pub fn delete_pantry_item(conn: &Connection, product_id: &str) -> EngineResult<bool> {
    let n = conn.execute("DELETE FROM pantry_items WHERE product_id = ?1", [product_id])?;
    Ok(n > 0)
}

// ---------------------------------------------------------------- meta

pub fn get_meta(conn: &Connection, key: &str) -> EngineResult<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()?)
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_meta(conn: &Connection, key: &str) -> EngineResult<bool> {
    let n = conn.execute("DELETE FROM meta WHERE key = ?1", [key])?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_in_memory;
    use chrono::NaiveDate;

    fn ts(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_ensure_product_fills_missing_details() {
        let conn = init_in_memory().unwrap();
        let bare = ProductDetails::default();
        assert!(ensure_product(&conn, "milk", &bare, None, ts(1, 1)).unwrap());
        let details = ProductDetails {
            description: Some("Whole Milk".into()),
            brand: Some("Acme".into()),
            upc: None,
        };
        assert!(!ensure_product(&conn, "milk", &details, Some(ts(1, 2)), ts(1, 2)).unwrap());
        let p = get_product(&conn, "milk").unwrap().unwrap();
        assert_eq!(p.description.as_deref(), Some("Whole Milk"));
        assert_eq!(p.first_purchased_at, Some(ts(1, 2)));
        assert_eq!(p.category, Category::Auto(CategoryType::Uncategorized));
    }

    #[test]
    fn test_events_round_trip_in_date_order() {
        let conn = init_in_memory().unwrap();
        ensure_product(&conn, "eggs", &ProductDetails::default(), None, ts(1, 1)).unwrap();
        let late = PurchaseEvent::new("eggs", 2, EventType::OrderPlaced, ts(1, 9)).with_modality("PICKUP");
        let early = PurchaseEvent::new("eggs", 1, EventType::OrderPlaced, ts(1, 2));
        let cart = PurchaseEvent::new("eggs", 1, EventType::CartAdd, ts(1, 5));
        for e in [&late, &early, &cart] {
            insert_event(&conn, e).unwrap();
        }
        let orders = events_for_product(&conn, "eggs", &[EventType::OrderPlaced]).unwrap();
        assert_eq!(orders, vec![early.clone(), late.clone()]);

        let recent = recent_events(&conn, "eggs", None, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0], late);
        assert_eq!(count_events(&conn, "eggs", EventType::CartAdd).unwrap(), 1);
        assert_eq!(products_with_purchases(&conn).unwrap(), vec!["eggs".to_string()]);
    }

    #[test]
    fn test_corrupt_event_row_surfaces() {
        let conn = init_in_memory().unwrap();
        ensure_product(&conn, "tea", &ProductDetails::default(), None, ts(1, 1)).unwrap();
        conn.execute(
            "INSERT INTO purchase_events (product_id, quantity, event_type, event_date, event_timestamp)
             VALUES ('tea', 1, 'order_placed', 'someday', '2024-01-01T00:00:00')",
            [],
        )
        .unwrap();
        let err = events_for_product(&conn, "tea", &[EventType::OrderPlaced]).unwrap_err();
        assert!(matches!(err, EngineError::CorruptRow { column: "event_date", .. }));
    }

    #[test]
    fn test_meta_upsert() {
        let conn = init_in_memory().unwrap();
        assert_eq!(get_meta(&conn, "k").unwrap(), None);
        set_meta(&conn, "k", "1").unwrap();
        set_meta(&conn, "k", "2").unwrap();
        assert_eq!(get_meta(&conn, "k").unwrap().as_deref(), Some("2"));
    }
}
