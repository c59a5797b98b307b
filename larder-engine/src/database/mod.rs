use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

use larder_core::time::{format_timestamp, parse_timestamp};

use crate::error::{EngineError, EngineResult};

pub mod queries;
pub mod schema;

pub fn init_database(db_path: &Path) -> EngineResult<Connection> {
    let conn = Connection::open(db_path)?;

    // Enable WAL mode
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// In-memory store with the full schema, for tests and dry runs.
pub fn init_in_memory() -> EngineResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::create_tables(&conn)?;
    Ok(conn)
}

/// Run `f` inside an `IMMEDIATE` transaction, taking the write lock up front.
///
/// When the connection is already inside a transaction, `f` joins it and the
/// outer owner commits.
pub fn with_immediate<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> EngineResult<T>,
) -> EngineResult<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// Run `f` under a named savepoint so a failure undoes only its own writes.
/// Must be called inside a transaction.
pub(crate) fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce(&Connection) -> EngineResult<T>,
) -> EngineResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f(conn) {
        Ok(out) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(out)
        }
        Err(e) => {
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
            Err(e)
        }
    }
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn timestamp_to_sql(ts: NaiveDateTime) -> String {
    format_timestamp(ts)
}

pub(crate) fn date_from_sql(
    table: &'static str,
    column: &'static str,
    raw: &str,
) -> EngineResult<NaiveDate> {
    // Older rows may carry a full timestamp here.
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|_| EngineError::CorruptRow {
        table,
        column,
        value: raw.to_string(),
    })
}

pub(crate) fn timestamp_from_sql(
    table: &'static str,
    column: &'static str,
    raw: &str,
) -> EngineResult<NaiveDateTime> {
    parse_timestamp(raw).map_err(|_| EngineError::CorruptRow {
        table,
        column,
        value: raw.to_string(),
    })
}
