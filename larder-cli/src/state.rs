use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

use larder_engine::init_database;

/// `$LARDER_HOME`, or `~/.larder`.
pub fn larder_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LARDER_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".larder"))
}

pub fn ensure_larder_home() -> Result<PathBuf> {
    let dir = larder_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn db_path() -> Result<PathBuf> {
    Ok(ensure_larder_home()?.join("larder.db"))
}

pub fn preferences_path() -> Result<PathBuf> {
    Ok(ensure_larder_home()?.join("preferences.json"))
}

/// Default locations of the legacy documents read by `migrate run`.
pub fn legacy_order_history_path() -> Result<PathBuf> {
    Ok(larder_home()?.join("order_history.json"))
}

pub fn legacy_cart_path() -> Result<PathBuf> {
    Ok(larder_home()?.join("cart.json"))
}

pub fn open_db() -> Result<Connection> {
    let path = db_path()?;
    init_database(&path).with_context(|| format!("open database {}", path.display()))
}
