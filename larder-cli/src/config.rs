//! The preferences document: prediction parameters and the user profile.
//!
//! Other tools may keep their own sections in the same file, so saving
//! always merges into what is on disk.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use larder_core::{PredictionConfig, CONFIG_KEYS};

pub const SECTION: &str = "prediction_config";
pub const TIMEZONE_KEY: &str = "timezone";
const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Read the document. A missing file is an empty document.
pub fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let doc: Value =
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    if !doc.is_object() {
        bail!("{} must contain a JSON object", path.display());
    }
    Ok(doc)
}

fn save_document(path: &Path, doc: &Value) -> Result<()> {
    let s = serde_json::to_string_pretty(doc).context("serialize preferences")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Prediction parameters, falling back to defaults key by key.
pub fn load_prediction_config(path: &Path) -> Result<PredictionConfig> {
    let doc = load_document(path)?;
    Ok(doc
        .get(SECTION)
        .map(PredictionConfig::from_section)
        .unwrap_or_default())
}

/// Write the `prediction_config` section, keeping everything else.
pub fn save_prediction_config(path: &Path, cfg: &PredictionConfig) -> Result<()> {
    let mut doc = load_document(path)?;
    if let Some(obj) = doc.as_object_mut() {
        obj.insert(SECTION.to_string(), cfg.to_section());
    }
    save_document(path, &doc)
}

/// The configured IANA timezone, checked.
pub fn load_timezone(path: &Path) -> Result<String> {
    let doc = load_document(path)?;
    let tz = doc
        .pointer("/profile/timezone")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TIMEZONE)
        .to_string();
    tz.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("invalid timezone in {}: {tz}", path.display()))?;
    Ok(tz)
}

pub fn save_timezone(path: &Path, tz: &str) -> Result<()> {
    tz.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("unknown timezone: {tz}"))?;
    let mut doc = load_document(path)?;
    let Some(obj) = doc.as_object_mut() else {
        bail!("{} must contain a JSON object", path.display());
    };
    let profile = obj
        .entry("profile")
        .or_insert_with(|| json!({}));
    if !profile.is_object() {
        *profile = json!({});
    }
    if let Some(p) = profile.as_object_mut() {
        p.insert(TIMEZONE_KEY.to_string(), Value::String(tz.to_string()));
    }
    save_document(path, &doc)
}

/// Apply `key = value` and persist. `timezone` goes to the profile; every
/// other key must be a prediction parameter.
pub fn set_value(path: &Path, key: &str, value: &str) -> Result<()> {
    if key == TIMEZONE_KEY {
        return save_timezone(path, value);
    }
    let current = load_prediction_config(path)?;
    let next = current.with_value(key, value)?;
    next.validate()?;
    save_prediction_config(path, &next)
}

pub fn reset_prediction_config(path: &Path) -> Result<PredictionConfig> {
    let cfg = PredictionConfig::default();
    save_prediction_config(path, &cfg)?;
    Ok(cfg)
}

/// `(key, value)` lines for display, prediction keys first.
pub fn describe(path: &Path) -> Result<Vec<(String, String)>> {
    let cfg = load_prediction_config(path)?;
    let section = cfg.to_section();
    let mut out: Vec<(String, String)> = CONFIG_KEYS
        .iter()
        .map(|k| {
            let v = section.get(*k).map(Value::to_string).unwrap_or_default();
            (k.to_string(), v)
        })
        .collect();
    out.push((TIMEZONE_KEY.to_string(), load_timezone(path)?));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        assert_eq!(load_prediction_config(&path).unwrap(), PredictionConfig::default());
        assert_eq!(load_timezone(&path).unwrap(), "America/Chicago");
    }

    #[test]
    fn test_save_merges_into_existing_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{"favorites": ["0001"], "profile": {"name": "sam"}}"#).unwrap();

        set_value(&path, "buffer_routine", "1.5").unwrap();
        set_value(&path, "timezone", "Europe/Oslo").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc["favorites"], json!(["0001"]));
        assert_eq!(doc["profile"]["name"], json!("sam"));
        assert_eq!(doc["profile"]["timezone"], json!("Europe/Oslo"));
        assert_eq!(load_prediction_config(&path).unwrap().buffer_routine, 1.5);
    }

    #[test]
    fn test_bad_values_are_rejected_and_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        assert!(set_value(&path, "urgency_high", "2.0").is_err());
        assert!(set_value(&path, "no_such_key", "1").is_err());
        assert!(set_value(&path, "routine_max_days", "90").is_err());
        assert!(set_value(&path, "timezone", "Nowhere/Land").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        set_value(&path, "min_purchases_for_prediction", "4").unwrap();
        assert_eq!(reset_prediction_config(&path).unwrap(), PredictionConfig::default());
        assert_eq!(load_prediction_config(&path).unwrap(), PredictionConfig::default());
    }
}
