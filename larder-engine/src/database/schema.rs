use rusqlite::Connection;

use crate::error::EngineResult;

pub fn create_tables(conn: &Connection) -> EngineResult<()> {
    // Products table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            product_id TEXT PRIMARY KEY,
            upc TEXT,
            description TEXT,
            brand TEXT,
            category_type TEXT NOT NULL DEFAULT 'uncategorized',
            category_override INTEGER NOT NULL DEFAULT 0,
            first_purchased_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Orders table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            placed_at TEXT NOT NULL,
            item_count INTEGER NOT NULL,
            total_quantity INTEGER NOT NULL,
            notes TEXT
        )",
        [],
    )?;

    // Purchase ledger, append-only
    conn.execute(
        "CREATE TABLE IF NOT EXISTS purchase_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            event_type TEXT NOT NULL,
            modality TEXT,
            event_date TEXT NOT NULL,
            event_timestamp TEXT NOT NULL,
            order_id INTEGER,
            FOREIGN KEY (product_id) REFERENCES products(product_id),
            FOREIGN KEY (order_id) REFERENCES orders(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_product_date
            ON purchase_events(product_id, event_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_type ON purchase_events(event_type)",
        [],
    )?;

    // One consolidated row per product
    conn.execute(
        "CREATE TABLE IF NOT EXISTS product_statistics (
            product_id TEXT PRIMARY KEY,
            total_purchases INTEGER NOT NULL,
            total_quantity INTEGER NOT NULL,
            avg_quantity_per_purchase REAL NOT NULL,
            avg_days_between_purchases REAL,
            std_dev_days REAL NOT NULL,
            last_purchase_date TEXT,
            first_purchase_date TEXT,
            purchase_frequency_score REAL NOT NULL,
            seasonality_score REAL NOT NULL,
            detected_category TEXT NOT NULL,
            confidence REAL NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(product_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seasonal_patterns (
            product_id TEXT NOT NULL,
            month INTEGER NOT NULL,
            purchase_count INTEGER NOT NULL,
            avg_quantity REAL NOT NULL,
            is_peak_period INTEGER NOT NULL DEFAULT 0,
            holiday_association TEXT,
            PRIMARY KEY (product_id, month),
            FOREIGN KEY (product_id) REFERENCES products(product_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pantry_items (
            product_id TEXT PRIMARY KEY,
            description TEXT,
            level_percent REAL NOT NULL DEFAULT 100,
            last_restocked_at TEXT,
            last_updated_at TEXT NOT NULL,
            auto_deplete INTEGER NOT NULL DEFAULT 1,
            daily_depletion_rate REAL NOT NULL DEFAULT 0,
            low_threshold REAL NOT NULL DEFAULT 20,
            FOREIGN KEY (product_id) REFERENCES products(product_id)
        )",
        [],
    )?;

    // Key/value rows such as the migration marker
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 7);
    }
}
