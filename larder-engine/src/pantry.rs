//! Pantry tracking: stored level snapshots, lazy decay and depletion feedback.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use larder_core::pantry::{clamp_level, FULL_LEVEL};
use larder_core::stats::round_to;
use larder_core::{
    depletion_rate_from, triggers_depletion_feedback, EventType, PantryItem, PantryItemStatus,
    PredictionConfig, PurchaseEvent, ValidationError,
};

use crate::database::{queries, with_immediate};
use crate::error::{EngineError, EngineResult};
use crate::models::ProductDetails;
use crate::statistics::update_product_stats;

fn checked_percent(field: &'static str, value: f64) -> EngineResult<f64> {
    if !(0.0..=FULL_LEVEL).contains(&value) {
        return Err(ValidationError::PercentOutOfRange { field, value }.into());
    }
    Ok(value)
}

fn tracked_item(conn: &Connection, product_id: &str) -> EngineResult<PantryItem> {
    queries::get_pantry_item(conn, product_id)?
        .ok_or_else(|| EngineError::NotTracked(product_id.to_string()))
}

fn stored_rate(conn: &Connection, product_id: &str) -> EngineResult<f64> {
    let avg = queries::get_statistics(conn, product_id)?.and_then(|s| s.avg_days_between_purchases);
    Ok(depletion_rate_from(avg))
}

/// How a tracked item starts out.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOptions {
    pub level: f64,
    pub low_threshold: f64,
    pub auto_deplete: bool,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            level: FULL_LEVEL,
            low_threshold: larder_core::pantry::DEFAULT_LOW_THRESHOLD,
            auto_deplete: true,
        }
    }
}

/// Start tracking a product. Tracking an already tracked product starts over.
///
/// The depletion rate comes from the product's purchase cadence; without
/// auto-deplete it is 0.
pub fn add_to_pantry(
    conn: &Connection,
    product_id: &str,
    options: &TrackOptions,
    now: NaiveDateTime,
) -> EngineResult<PantryItemStatus> {
    let level = clamp_level(options.level);
    let low_threshold = checked_percent("low_threshold", options.low_threshold)?;

    with_immediate(conn, |tx| {
        queries::ensure_product(tx, product_id, &ProductDetails::default(), None, now)?;
        let description = queries::get_product(tx, product_id)?.and_then(|p| p.description);

        let mut item = PantryItem::new(product_id, level, now);
        item.description = description;
        item.low_threshold = low_threshold;
        item.auto_deplete = options.auto_deplete;
        item.daily_depletion_rate = if options.auto_deplete {
            stored_rate(tx, product_id)?
        } else {
            0.0
        };
        queries::upsert_pantry_item(tx, &item)?;
        info!(product_id, level, rate = item.daily_depletion_rate, "pantry item tracked");
        Ok(item.status_at(now))
    })
}

/// Stop tracking. Returns false when the product was not tracked.
pub fn remove_from_pantry(conn: &Connection, product_id: &str) -> EngineResult<bool> {
    let removed = queries::delete_pantry_item(conn, product_id)?;
    if removed {
        info!(product_id, "pantry item removed");
    }
    Ok(removed)
}

/// Refill an item, to 100% unless `level` says otherwise. Levels outside
/// 0-100 are clamped.
pub fn restock_item(
    conn: &Connection,
    product_id: &str,
    level: Option<f64>,
    now: NaiveDateTime,
) -> EngineResult<PantryItemStatus> {
    let level = clamp_level(level.unwrap_or(FULL_LEVEL));
    with_immediate(conn, |tx| {
        let mut item = tracked_item(tx, product_id)?;
        restock(tx, &mut item, level, now)?;
        Ok(item.status_at(now))
    })
}

fn restock(
    conn: &Connection,
    item: &mut PantryItem,
    level: f64,
    now: NaiveDateTime,
) -> EngineResult<()> {
    item.level_percent = clamp_level(level);
    item.last_restocked_at = Some(now);
    item.last_updated_at = now;
    item.daily_depletion_rate = stored_rate(conn, &item.product_id)?;
    queries::upsert_pantry_item(conn, item)?;
    info!(
        product_id = %item.product_id,
        level = item.level_percent,
        rate = item.daily_depletion_rate,
        "pantry item restocked"
    );
    Ok(())
}

/// Restock a product to full if it is tracked. Used when an order lands.
pub(crate) fn restock_if_tracked(
    conn: &Connection,
    product_id: &str,
    now: NaiveDateTime,
) -> EngineResult<bool> {
    with_immediate(conn, |tx| {
        let Some(mut item) = queries::get_pantry_item(tx, product_id)? else {
            return Ok(false);
        };
        restock(tx, &mut item, FULL_LEVEL, now)?;
        Ok(true)
    })
}

/// What happened to the ledger after a manual level change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// The change did not cross the depleted threshold.
    NotTriggered,
    /// A `pantry_depleted` event was appended and statistics refreshed.
    Recorded,
    /// The level change stands but the ledger or statistics refresh failed.
    RecomputeFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelChange {
    pub status: PantryItemStatus,
    pub feedback: FeedbackOutcome,
}

/// Set a level by hand. Dropping a restocked item to the depleted threshold
/// records when it ran out, which feeds back into its statistics.
pub fn set_pantry_level(
    conn: &Connection,
    product_id: &str,
    level: f64,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<LevelChange> {
    let level = clamp_level(level);

    let (previous, mut item) = with_immediate(conn, |tx| {
        let mut item = tracked_item(tx, product_id)?;
        let previous = item.level_percent;
        item.level_percent = level;
        item.last_updated_at = now;
        queries::upsert_pantry_item(tx, &item)?;
        Ok((previous, item))
    })?;
    debug!(product_id, previous, level, "pantry level set");

    let feedback = if triggers_depletion_feedback(previous, level, item.last_restocked_at) {
        match record_depletion(conn, &mut item, now, config) {
            Ok(()) => FeedbackOutcome::Recorded,
            Err(e) => {
                warn!(product_id, error = %e, "depletion feedback failed");
                FeedbackOutcome::RecomputeFailed(e.to_string())
            }
        }
    } else {
        FeedbackOutcome::NotTriggered
    };

    Ok(LevelChange {
        status: item.status_at(now),
        feedback,
    })
}

fn record_depletion(
    conn: &Connection,
    item: &mut PantryItem,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<()> {
    let event = PurchaseEvent::new(&item.product_id, 1, EventType::PantryDepleted, now);
    queries::insert_event(conn, &event)?;
    let stats = update_product_stats(conn, &item.product_id, config, now)?;
    if item.auto_deplete {
        item.daily_depletion_rate =
            depletion_rate_from(stats.and_then(|s| s.avg_days_between_purchases));
        queries::upsert_pantry_item(conn, item)?;
    }
    info!(product_id = %item.product_id, "pantry depletion recorded");
    Ok(())
}

/// Every tracked item with its estimated level at `now`.
pub fn pantry_status(conn: &Connection, now: NaiveDateTime) -> EngineResult<Vec<PantryItemStatus>> {
    Ok(queries::list_pantry_items(conn)?
        .iter()
        .map(|item| item.status_at(now))
        .collect())
}

pub fn pantry_item(
    conn: &Connection,
    product_id: &str,
    now: NaiveDateTime,
) -> EngineResult<Option<PantryItemStatus>> {
    Ok(queries::get_pantry_item(conn, product_id)?.map(|item| item.status_at(now)))
}

/// Items at or under their threshold (or `threshold_override`), emptiest first.
pub fn low_inventory_items(
    conn: &Connection,
    threshold_override: Option<f64>,
    now: NaiveDateTime,
) -> EngineResult<Vec<PantryItemStatus>> {
    if let Some(t) = threshold_override {
        checked_percent("threshold", t)?;
    }
    let mut low: Vec<PantryItemStatus> = pantry_status(conn, now)?
        .into_iter()
        .filter(|s| s.is_low(threshold_override))
        .collect();
    low.sort_by(|a, b| {
        a.level_percent
            .cmp(&b.level_percent)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    Ok(low)
}

/// Persist decayed levels for all auto-depleting items. Returns how many
/// rows were written.
///
/// Decay always starts from the stored snapshot, so running this twice in a
/// row changes nothing the second time.
pub fn apply_daily_depletion(conn: &Connection, now: NaiveDateTime) -> EngineResult<usize> {
    with_immediate(conn, |tx| {
        let mut updated = 0;
        for mut item in queries::list_pantry_items(tx)? {
            if !item.due_for_depletion(now) {
                continue;
            }
            item.level_percent = round_to(item.level_at(now), 1);
            item.last_updated_at = now;
            queries::upsert_pantry_item(tx, &item)?;
            updated += 1;
        }
        debug!(updated, "daily depletion applied");
        Ok(updated)
    })
}
