//! Prediction and categorization parameters.
//!
//! `PredictionConfig` is an immutable value handed to every analytics
//! function. Loading is lenient: a missing or malformed key keeps its default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::CategoryType;
use crate::error::{ValidationError, ValidationResult};

/// Recognized keys of the `prediction_config` section.
pub const CONFIG_KEYS: [&str; 12] = [
    "ewma_alpha",
    "buffer_routine",
    "buffer_regular",
    "buffer_treat",
    "routine_max_days",
    "regular_max_days",
    "seasonality_threshold",
    "urgency_critical",
    "urgency_high",
    "urgency_medium",
    "min_purchases_for_prediction",
    "max_confidence_purchases",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictionConfig {
    /// Reserved smoothing factor. The interval estimator uses fixed halving weights.
    pub ewma_alpha: f64,

    /// Std-dev multipliers subtracted from the predicted repurchase date.
    pub buffer_routine: f64,
    pub buffer_regular: f64,
    pub buffer_treat: f64,

    /// Average days between purchases at or below which a product is routine.
    pub routine_max_days: u32,
    /// Average days between purchases at or below which a product is regular.
    pub regular_max_days: u32,
    /// Seasonality above this classifies a product as a treat.
    pub seasonality_threshold: f64,

    pub urgency_critical: f64,
    pub urgency_high: f64,
    pub urgency_medium: f64,

    pub min_purchases_for_prediction: u32,
    /// Sample count at which data confidence saturates.
    pub max_confidence_purchases: u32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.3,
            buffer_routine: 1.0,
            buffer_regular: 0.5,
            buffer_treat: 0.0,
            routine_max_days: 14,
            regular_max_days: 60,
            seasonality_threshold: 0.7,
            urgency_critical: 0.9,
            urgency_high: 0.7,
            urgency_medium: 0.4,
            min_purchases_for_prediction: 2,
            max_confidence_purchases: 10,
        }
    }
}

impl PredictionConfig {
    /// Safety-buffer multiplier for a category.
    pub fn buffer_for(&self, category: CategoryType) -> f64 {
        match category {
            CategoryType::Routine => self.buffer_routine,
            CategoryType::Regular => self.buffer_regular,
            CategoryType::Treat => self.buffer_treat,
            CategoryType::Uncategorized => 0.0,
        }
    }

    /// Build from a persisted `prediction_config` section.
    ///
    /// Each key falls back to its default when absent, of the wrong type or
    /// out of range. If the combination is inconsistent (e.g. routine above
    /// regular) the whole section falls back to defaults.
    pub fn from_section(section: &Value) -> Self {
        let mut cfg = Self::default();
        let Some(obj) = section.as_object() else {
            return cfg;
        };

        for (key, raw) in obj {
            let Some(text) = scalar_text(raw) else {
                continue;
            };
            if let Ok(next) = cfg.with_value(key, &text) {
                cfg = next;
            }
        }

        if cfg.validate().is_err() {
            return Self::default();
        }
        cfg
    }

    /// Serialize as a `prediction_config` section.
    pub fn to_section(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Return a copy with one key replaced and range-checked.
    /// Cross-field constraints are left to [`PredictionConfig::validate`].
    pub fn with_value(&self, key: &str, raw: &str) -> ValidationResult<Self> {
        let mut next = *self;
        let raw = raw.trim();
        match key {
            "ewma_alpha" => next.ewma_alpha = parse_f64(key, raw)?,
            "buffer_routine" => next.buffer_routine = parse_f64(key, raw)?,
            "buffer_regular" => next.buffer_regular = parse_f64(key, raw)?,
            "buffer_treat" => next.buffer_treat = parse_f64(key, raw)?,
            "routine_max_days" => next.routine_max_days = parse_u32(key, raw)?,
            "regular_max_days" => next.regular_max_days = parse_u32(key, raw)?,
            "seasonality_threshold" => next.seasonality_threshold = parse_f64(key, raw)?,
            "urgency_critical" => next.urgency_critical = parse_f64(key, raw)?,
            "urgency_high" => next.urgency_high = parse_f64(key, raw)?,
            "urgency_medium" => next.urgency_medium = parse_f64(key, raw)?,
            "min_purchases_for_prediction" => {
                next.min_purchases_for_prediction = parse_u32(key, raw)?
            }
            "max_confidence_purchases" => next.max_confidence_purchases = parse_u32(key, raw)?,
            other => return Err(ValidationError::UnknownConfigKey(other.to_string())),
        }
        next.validate_key(key)?;
        Ok(next)
    }

    /// Check every range and cross-field constraint.
    pub fn validate(&self) -> ValidationResult<()> {
        for key in CONFIG_KEYS {
            self.validate_key(key)?;
        }
        if self.routine_max_days > self.regular_max_days {
            return Err(out_of_range(
                "routine_max_days",
                "must not exceed regular_max_days",
            ));
        }
        if !(self.urgency_medium <= self.urgency_high && self.urgency_high <= self.urgency_critical) {
            return Err(out_of_range(
                "urgency_high",
                "thresholds must satisfy medium <= high <= critical",
            ));
        }
        Ok(())
    }

    fn validate_key(&self, key: &str) -> ValidationResult<()> {
        match key {
            "ewma_alpha" => {
                if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
                    return Err(out_of_range(key, "must be in (0, 1]"));
                }
            }
            "buffer_routine" | "buffer_regular" | "buffer_treat" => {
                let v = match key {
                    "buffer_routine" => self.buffer_routine,
                    "buffer_regular" => self.buffer_regular,
                    _ => self.buffer_treat,
                };
                if !(v.is_finite() && v >= 0.0) {
                    return Err(out_of_range(key, "must be a non-negative number"));
                }
            }
            "routine_max_days" | "regular_max_days" => {
                let v = if key == "routine_max_days" {
                    self.routine_max_days
                } else {
                    self.regular_max_days
                };
                if v == 0 {
                    return Err(out_of_range(key, "must be at least 1 day"));
                }
            }
            "seasonality_threshold" | "urgency_critical" | "urgency_high" | "urgency_medium" => {
                let v = match key {
                    "seasonality_threshold" => self.seasonality_threshold,
                    "urgency_critical" => self.urgency_critical,
                    "urgency_high" => self.urgency_high,
                    _ => self.urgency_medium,
                };
                if !(0.0..=1.0).contains(&v) {
                    return Err(out_of_range(key, "must be within [0, 1]"));
                }
            }
            "min_purchases_for_prediction" | "max_confidence_purchases" => {
                let v = if key == "min_purchases_for_prediction" {
                    self.min_purchases_for_prediction
                } else {
                    self.max_confidence_purchases
                };
                if v == 0 {
                    return Err(out_of_range(key, "must be at least 1"));
                }
            }
            other => return Err(ValidationError::UnknownConfigKey(other.to_string())),
        }
        Ok(())
    }
}

fn out_of_range(key: &str, reason: &str) -> ValidationError {
    ValidationError::ConfigOutOfRange {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_f64(key: &str, raw: &str) -> ValidationResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| out_of_range(key, &format!("'{raw}' is not a number")))
}

fn parse_u32(key: &str, raw: &str) -> ValidationResult<u32> {
    if let Ok(v) = raw.parse::<u32>() {
        return Ok(v);
    }
    // Accept integral floats such as "14.0" written by other tools.
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(out_of_range(key, &format!("'{raw}' is not a whole number"))),
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PredictionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.buffer_for(CategoryType::Routine), 1.0);
        assert_eq!(cfg.buffer_for(CategoryType::Regular), 0.5);
        assert_eq!(cfg.buffer_for(CategoryType::Treat), 0.0);
        assert_eq!(cfg.buffer_for(CategoryType::Uncategorized), 0.0);
    }

    #[test]
    fn test_from_section_keeps_defaults_for_bad_keys() {
        let section = json!({
            "routine_max_days": 10,
            "buffer_regular": "0.75",
            "urgency_high": "very",
            "seasonality_threshold": 3.5,
            "unrelated": true
        });
        let cfg = PredictionConfig::from_section(&section);
        assert_eq!(cfg.routine_max_days, 10);
        assert_eq!(cfg.buffer_regular, 0.75);
        assert_eq!(cfg.urgency_high, 0.7);
        assert_eq!(cfg.seasonality_threshold, 0.7);
    }

    #[test]
    fn test_from_section_inconsistent_falls_back() {
        let section = json!({ "routine_max_days": 90 });
        assert_eq!(
            PredictionConfig::from_section(&section),
            PredictionConfig::default()
        );
        assert_eq!(
            PredictionConfig::from_section(&json!("garbage")),
            PredictionConfig::default()
        );
    }

    #[test]
    fn test_with_value_rejects_out_of_range() {
        let cfg = PredictionConfig::default();
        assert!(matches!(
            cfg.with_value("urgency_critical", "1.5"),
            Err(ValidationError::ConfigOutOfRange { .. })
        ));
        assert!(matches!(
            cfg.with_value("nope", "1"),
            Err(ValidationError::UnknownConfigKey(_))
        ));
        let next = cfg.with_value("max_confidence_purchases", "20").unwrap();
        assert_eq!(next.max_confidence_purchases, 20);
        // original untouched
        assert_eq!(cfg.max_confidence_purchases, 10);
    }

    #[test]
    fn test_section_round_trip() {
        let cfg = PredictionConfig::default()
            .with_value("buffer_treat", "0.25")
            .unwrap();
        assert_eq!(PredictionConfig::from_section(&cfg.to_section()), cfg);
    }
}
