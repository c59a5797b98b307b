//! Trend detection, recency and multi-factor confidence helpers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consumption::{purchase_intervals, weighted_interval_average};
use crate::event::PurchaseEvent;
use crate::stats::{population_std_dev, round_to, sample_std_dev};

/// Direction of consumption, not of the raw intervals: growing intervals
/// mean the household is buying less often.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrendDirection {
    #[serde(rename = "increasing")]
    Increasing,
    #[serde(rename = "decreasing")]
    Decreasing,
    #[serde(rename = "stable")]
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative slope per interval that counts as a trend.
const SLOPE_THRESHOLD: f64 = 0.05;
/// Relative slope at which strength saturates.
const SLOPE_SATURATION: f64 = 0.3;
/// Days after which recency reaches zero.
const RECENCY_HORIZON_DAYS: f64 = 180.0;
/// Intervals considered by [`analyze_history`].
pub const DEFAULT_TREND_WINDOW: usize = 5;
/// Largest share of the base interval a trend may shift a prediction by.
pub const DEFAULT_TREND_ADJUSTMENT: f64 = 0.15;

/// Least-squares trend over the most recent `window` intervals (oldest first).
pub fn detect_trend(intervals: &[f64], window: usize) -> (TrendDirection, f64) {
    if intervals.len() < 3 {
        return (TrendDirection::Stable, 0.0);
    }
    let start = intervals.len().saturating_sub(window);
    let recent = &intervals[start..];
    let n = recent.len();
    if n < 3 {
        return (TrendDirection::Stable, 0.0);
    }

    let nf = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = recent.iter().sum();
    let sum_xy: f64 = recent.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let sum_x2: f64 = (0..n).map(|i| (i * i) as f64).sum();

    let denominator = nf * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return (TrendDirection::Stable, 0.0);
    }
    let slope = (nf * sum_xy - sum_x * sum_y) / denominator;

    let mean = sum_y / nf;
    let normalized = if mean > 0.0 { slope / mean } else { 0.0 };
    let strength = round_to((normalized.abs() / SLOPE_SATURATION).min(1.0), 2);

    if normalized > SLOPE_THRESHOLD {
        (TrendDirection::Decreasing, strength)
    } else if normalized < -SLOPE_THRESHOLD {
        (TrendDirection::Increasing, strength)
    } else {
        (TrendDirection::Stable, 0.0)
    }
}

/// 1.0 for a purchase today, falling linearly to 0.0 at 180 days.
pub fn recency_score(last_purchase: Option<NaiveDate>, today: NaiveDate) -> f64 {
    let Some(last) = last_purchase else {
        return 0.0;
    };
    let days_ago = (today - last).num_days() as f64;
    if days_ago <= 0.0 {
        1.0
    } else if days_ago >= RECENCY_HORIZON_DAYS {
        0.0
    } else {
        1.0 - days_ago / RECENCY_HORIZON_DAYS
    }
}

/// `1 - CV` of the purchase quantities; 0.5 when there is nothing to compare.
pub fn quantity_consistency(quantities: &[u32]) -> f64 {
    if quantities.len() < 2 {
        return 0.5;
    }
    let values: Vec<f64> = quantities.iter().map(|&q| q as f64).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.5;
    }
    let cv = population_std_dev(&values) / mean;
    round_to((1.0 - cv).max(0.0), 2)
}

/// Weighted blend of sample size, interval consistency, recency and
/// quantity consistency.
pub fn enhanced_confidence(
    sample_size: usize,
    interval_consistency: f64,
    recency: f64,
    quantity_consistency: f64,
    max_samples: u32,
) -> f64 {
    let data_confidence = (sample_size as f64 / max_samples.max(1) as f64).min(1.0);
    let confidence = 0.35 * data_confidence
        + 0.30 * interval_consistency
        + 0.20 * recency
        + 0.15 * quantity_consistency;
    round_to(confidence.clamp(0.0, 1.0), 2)
}

/// Mean days consumed per unit, pairing each interval with the quantity
/// bought at its start.
pub fn quantity_adjusted_rate(intervals: &[f64], quantities: &[u32]) -> Option<f64> {
    if intervals.is_empty() || quantities.len() < 2 {
        return None;
    }
    let per_unit: Vec<f64> = intervals
        .iter()
        .enumerate()
        .filter_map(|(i, &interval)| {
            let q = quantities.get(i).copied().unwrap_or(1);
            (q > 0 && interval > 0.0).then(|| interval / q as f64)
        })
        .collect();
    if per_unit.is_empty() {
        return None;
    }
    Some(round_to(per_unit.iter().sum::<f64>() / per_unit.len() as f64, 2))
}

/// Shift a day-count prediction by at most `factor` of itself, scaled by
/// trend strength. Weak trends (below 0.2) are ignored.
pub fn predict_with_trend_adjustment(
    base_days: f64,
    direction: TrendDirection,
    strength: f64,
    factor: f64,
) -> f64 {
    if direction == TrendDirection::Stable || strength < 0.2 {
        return base_days;
    }
    let shift = base_days * factor * strength;
    match direction {
        TrendDirection::Increasing => base_days - shift,
        TrendDirection::Decreasing => base_days + shift,
        TrendDirection::Stable => base_days,
    }
}

/// Trend-aware view of one product's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendInsight {
    pub interval_count: usize,
    pub trend: TrendDirection,
    pub trend_strength: f64,
    pub recency: f64,
    pub interval_consistency: f64,
    pub quantity_consistency: f64,
    /// Blend of sample size, consistency and recency.
    pub confidence: f64,
    /// Weighted average interval before trend adjustment.
    pub base_days: Option<f64>,
    pub adjusted_days: Option<f64>,
    pub days_per_unit: Option<f64>,
}

/// Combine the trend helpers over a date-ascending event list.
pub fn analyze_history(events: &[PurchaseEvent], today: NaiveDate, max_samples: u32) -> TrendInsight {
    let consumption: Vec<&PurchaseEvent> = events.iter().filter(|e| e.is_consumption()).collect();
    let intervals = purchase_intervals(events);
    let quantities: Vec<u32> = consumption.iter().map(|e| e.quantity).collect();

    let base_days = weighted_interval_average(&intervals);
    let interval_consistency = match base_days {
        Some(avg) if avg > 0.0 => 1.0 - (sample_std_dev(&intervals) / avg).min(1.0),
        _ => 0.0,
    };
    let (trend, trend_strength) = detect_trend(&intervals, DEFAULT_TREND_WINDOW);
    let recency = recency_score(consumption.last().map(|e| e.event_date), today);
    let qty_consistency = quantity_consistency(&quantities);

    TrendInsight {
        interval_count: intervals.len(),
        trend,
        trend_strength,
        recency,
        interval_consistency: round_to(interval_consistency, 2),
        quantity_consistency: qty_consistency,
        confidence: enhanced_confidence(
            intervals.len(),
            interval_consistency,
            recency,
            qty_consistency,
            max_samples,
        ),
        base_days,
        adjusted_days: base_days.map(|d| {
            predict_with_trend_adjustment(d, trend, trend_strength, DEFAULT_TREND_ADJUSTMENT)
        }),
        days_per_unit: quantity_adjusted_rate(&intervals, &quantities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_trend_needs_three_points() {
        assert_eq!(detect_trend(&[7.0, 14.0], 5), (TrendDirection::Stable, 0.0));
    }

    #[test]
    fn test_growing_intervals_mean_decreasing_consumption() {
        let (dir, strength) = detect_trend(&[5.0, 7.0, 9.0, 11.0, 13.0], 5);
        assert_eq!(dir, TrendDirection::Decreasing);
        // slope 2 / mean 9 = 0.222 -> 0.74
        assert_eq!(strength, 0.74);
    }

    #[test]
    fn test_shrinking_intervals_mean_increasing_consumption() {
        let (dir, _) = detect_trend(&[30.0, 20.0, 40.0, 14.0, 10.0, 7.0], 4);
        assert_eq!(dir, TrendDirection::Increasing);
    }

    #[test]
    fn test_flat_intervals_are_stable() {
        assert_eq!(
            detect_trend(&[7.0, 7.0, 7.0, 7.0], 5),
            (TrendDirection::Stable, 0.0)
        );
    }

    #[test]
    fn test_recency_score() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(recency_score(Some(today), today), 1.0);
        assert_eq!(recency_score(None, today), 0.0);
        let ninety = today - chrono::Duration::days(90);
        assert!((recency_score(Some(ninety), today) - 0.5).abs() < 1e-12);
        let old = today - chrono::Duration::days(400);
        assert_eq!(recency_score(Some(old), today), 0.0);
    }

    #[test]
    fn test_quantity_consistency() {
        assert_eq!(quantity_consistency(&[2, 2, 2]), 1.0);
        assert_eq!(quantity_consistency(&[1]), 0.5);
        // mean 2, pop std 1 -> cv .5
        assert_eq!(quantity_consistency(&[1, 3]), 0.5);
    }

    #[test]
    fn test_enhanced_confidence_bounds() {
        assert_eq!(enhanced_confidence(20, 1.0, 1.0, 1.0, 10), 1.0);
        assert_eq!(enhanced_confidence(0, 0.0, 0.0, 0.0, 10), 0.0);
        assert_eq!(enhanced_confidence(5, 0.5, 0.5, 0.5, 10), 0.5);
    }

    #[test]
    fn test_quantity_adjusted_rate() {
        assert_eq!(quantity_adjusted_rate(&[10.0, 6.0], &[2, 1, 1]), Some(5.5));
        assert_eq!(quantity_adjusted_rate(&[], &[1, 1]), None);
    }

    #[test]
    fn test_analyze_history_shrinking_gaps() {
        use crate::event::EventType;
        let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        // gaps 20, 15, 10, 5: buying more often
        let events: Vec<PurchaseEvent> = [day(1, 1), day(1, 21), day(2, 5), day(2, 15), day(2, 20)]
            .into_iter()
            .map(|d| PurchaseEvent::on_date("coffee", 1, EventType::OrderPlaced, d))
            .collect();
        let insight = analyze_history(&events, day(2, 20), 10);
        assert_eq!(insight.interval_count, 4);
        assert_eq!(insight.trend, TrendDirection::Increasing);
        assert_eq!(insight.trend_strength, 1.0);
        assert_eq!(insight.recency, 1.0);
        assert_eq!(insight.quantity_consistency, 1.0);
        let base = insight.base_days.unwrap();
        assert!((insight.adjusted_days.unwrap() - base * 0.85).abs() < 1e-9);
        assert_eq!(insight.days_per_unit, Some(12.5));
    }

    #[test]
    fn test_analyze_history_without_intervals() {
        let insight = analyze_history(&[], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 10);
        assert_eq!(insight.base_days, None);
        assert_eq!(insight.adjusted_days, None);
        assert_eq!(insight.trend, TrendDirection::Stable);
        // only the neutral quantity term contributes
        assert!(insight.confidence > 0.0 && insight.confidence < 0.1);
    }

    #[test]
    fn test_trend_adjustment() {
        assert_eq!(
            predict_with_trend_adjustment(10.0, TrendDirection::Stable, 1.0, 0.15),
            10.0
        );
        assert_eq!(
            predict_with_trend_adjustment(10.0, TrendDirection::Increasing, 0.1, 0.15),
            10.0
        );
        assert!(
            (predict_with_trend_adjustment(10.0, TrendDirection::Increasing, 1.0, 0.15) - 8.5)
                .abs()
                < 1e-12
        );
        assert!(
            (predict_with_trend_adjustment(10.0, TrendDirection::Decreasing, 0.5, 0.2) - 11.0)
                .abs()
                < 1e-12
        );
    }
}
