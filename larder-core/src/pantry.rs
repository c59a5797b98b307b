//! Pantry inventory levels and their continuous decay.
//!
//! Levels are stored as a snapshot (`level_percent` at `last_updated_at`)
//! and decayed lazily on read. Every path that needs the current level goes
//! through [`decay`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stats::round_to;

pub const FULL_LEVEL: f64 = 100.0;
pub const DEFAULT_LOW_THRESHOLD: f64 = 20.0;
/// At or below this level an item counts as used up.
pub const DEPLETED_THRESHOLD: f64 = 5.0;
/// Batch depletion ignores items touched more recently than this (~15 min).
pub const MIN_DEPLETION_INTERVAL_DAYS: f64 = 0.01;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Level after `elapsed_days` at `daily_rate` percent per day, floored at 0.
pub fn decay(level: f64, daily_rate: f64, elapsed_days: f64) -> f64 {
    (level - elapsed_days.max(0.0) * daily_rate).max(0.0)
}

/// Fractional days from `from` to `to`.
pub fn elapsed_days(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

pub fn clamp_level(level: f64) -> f64 {
    level.clamp(0.0, FULL_LEVEL)
}

/// Percent per day implied by a purchase cadence. 0 disables decay.
pub fn depletion_rate_from(avg_days_between_purchases: Option<f64>) -> f64 {
    match avg_days_between_purchases {
        Some(days) if days > 0.0 => FULL_LEVEL / days,
        _ => 0.0,
    }
}

/// Whether lowering a level from `previous` to `new` means the item just ran out.
pub fn triggers_depletion_feedback(
    previous: f64,
    new: f64,
    last_restocked_at: Option<NaiveDateTime>,
) -> bool {
    new <= DEPLETED_THRESHOLD && previous > DEPLETED_THRESHOLD && last_restocked_at.is_some()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PantryStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "out")]
    Out,
}

impl PantryStatus {
    pub fn for_level(level: f64, low_threshold: f64) -> Self {
        if level <= 0.0 {
            PantryStatus::Out
        } else if level <= low_threshold {
            PantryStatus::Low
        } else {
            PantryStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PantryStatus::Ok => "ok",
            PantryStatus::Low => "low",
            PantryStatus::Out => "out",
        }
    }
}

impl fmt::Display for PantryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked pantry item as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PantryItem {
    pub product_id: String,
    pub description: Option<String>,
    /// Snapshot level at `last_updated_at`, 0-100.
    pub level_percent: f64,
    pub last_restocked_at: Option<NaiveDateTime>,
    pub last_updated_at: NaiveDateTime,
    pub auto_deplete: bool,
    /// Percent per day, never negative.
    pub daily_depletion_rate: f64,
    pub low_threshold: f64,
}

impl PantryItem {
    /// A freshly tracked item at `level`, counted as restocked `now`.
    pub fn new(product_id: impl Into<String>, level: f64, now: NaiveDateTime) -> Self {
        Self {
            product_id: product_id.into(),
            description: None,
            level_percent: clamp_level(level),
            last_restocked_at: Some(now),
            last_updated_at: now,
            auto_deplete: true,
            daily_depletion_rate: 0.0,
            low_threshold: DEFAULT_LOW_THRESHOLD,
        }
    }

    /// Estimated level at `now`. Items with auto-deplete off never decay.
    pub fn level_at(&self, now: NaiveDateTime) -> f64 {
        if !self.auto_deplete || self.daily_depletion_rate <= 0.0 {
            return self.level_percent;
        }
        decay(
            self.level_percent,
            self.daily_depletion_rate,
            elapsed_days(self.last_updated_at, now),
        )
    }

    /// Whether the batch job should persist a decayed level at `now`.
    pub fn due_for_depletion(&self, now: NaiveDateTime) -> bool {
        self.auto_deplete
            && self.daily_depletion_rate > 0.0
            && elapsed_days(self.last_updated_at, now) >= MIN_DEPLETION_INTERVAL_DAYS
    }

    pub fn status_at(&self, now: NaiveDateTime) -> PantryItemStatus {
        let level = self.level_at(now);
        let days_until_empty = (self.daily_depletion_rate > 0.0)
            .then(|| round_to(level / self.daily_depletion_rate, 1));
        PantryItemStatus {
            product_id: self.product_id.clone(),
            description: self.description.clone(),
            level_percent: level.round() as u32,
            status: PantryStatus::for_level(level, self.low_threshold),
            days_until_empty,
            low_threshold: self.low_threshold,
            daily_depletion_rate: round_to(self.daily_depletion_rate, 2),
            auto_deplete: self.auto_deplete,
            last_restocked_at: self.last_restocked_at,
        }
    }
}

/// Read-side view of a pantry item at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PantryItemStatus {
    pub product_id: String,
    pub description: Option<String>,
    pub level_percent: u32,
    pub status: PantryStatus,
    pub days_until_empty: Option<f64>,
    pub low_threshold: f64,
    pub daily_depletion_rate: f64,
    pub auto_deplete: bool,
    pub last_restocked_at: Option<NaiveDateTime>,
}

impl PantryItemStatus {
    pub fn is_low(&self, threshold_override: Option<f64>) -> bool {
        self.level_percent as f64 <= threshold_override.unwrap_or(self.low_threshold)
    }
}
