//! Consumption-rate estimation from the purchase ledger.
//!
//! Intervals between consecutive qualifying events are averaged with
//! halving weights: the newest interval weighs 1.0, the one before 0.5,
//! then 0.25 and so on.

use serde::{Deserialize, Serialize};

use crate::event::PurchaseEvent;
use crate::stats::sample_std_dev;

/// Interval count at which data confidence saturates.
const SATURATION_INTERVALS: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionRate {
    /// Weighted average days between purchases; `None` when unknown.
    pub days_between: Option<f64>,
    pub std_dev: f64,
    /// 0-1.
    pub confidence: f64,
    /// Number of intervals used, or the event count when none were usable.
    pub sample_size: usize,
}

impl ConsumptionRate {
    pub fn no_data(sample_size: usize) -> Self {
        Self {
            days_between: None,
            std_dev: 0.0,
            confidence: 0.0,
            sample_size,
        }
    }

    pub fn has_data(&self) -> bool {
        self.days_between.is_some()
    }
}

/// Positive whole-day gaps between consecutive qualifying events.
/// Same-day and out-of-order pairs are dropped.
pub fn purchase_intervals(events: &[PurchaseEvent]) -> Vec<f64> {
    let qualifying: Vec<&PurchaseEvent> = events.iter().filter(|e| e.is_consumption()).collect();
    qualifying
        .windows(2)
        .map(|pair| (pair[1].event_date - pair[0].event_date).num_days())
        .filter(|&days| days > 0)
        .map(|days| days as f64)
        .collect()
}

/// Halving-weight average of intervals ordered oldest to newest.
pub fn weighted_interval_average(intervals: &[f64]) -> Option<f64> {
    if intervals.is_empty() {
        return None;
    }
    let n = intervals.len();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (i, v) in intervals.iter().enumerate() {
        let w = 0.5f64.powi((n - 1 - i) as i32);
        weighted += w * v;
        total_weight += w;
    }
    Some(weighted / total_weight)
}

/// `min(1, n/10) * (1 - min(1, std/avg))`.
pub fn interval_confidence(intervals: usize, avg: f64, std_dev: f64) -> f64 {
    let data_confidence = (intervals as f64 / SATURATION_INTERVALS).min(1.0);
    let consistency = if avg > 0.0 {
        1.0 - (std_dev / avg).min(1.0)
    } else {
        0.0
    };
    data_confidence * consistency
}

/// Estimate how often a product is consumed.
///
/// `events` must be ordered by date, oldest first. Cart additions are ignored.
pub fn calculate_consumption_rate(events: &[PurchaseEvent]) -> ConsumptionRate {
    let qualifying = events.iter().filter(|e| e.is_consumption()).count();
    if qualifying < 2 {
        return ConsumptionRate::no_data(qualifying);
    }

    let intervals = purchase_intervals(events);
    let Some(ewma) = weighted_interval_average(&intervals) else {
        return ConsumptionRate::no_data(qualifying);
    };

    let std_dev = sample_std_dev(&intervals);
    ConsumptionRate {
        days_between: Some(ewma),
        std_dev,
        confidence: interval_confidence(intervals.len(), ewma, std_dev),
        sample_size: intervals.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use chrono::NaiveDate;

    fn ev(y: i32, m: u32, d: u32) -> PurchaseEvent {
        PurchaseEvent::on_date(
            "p",
            1,
            EventType::OrderPlaced,
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        )
    }

    #[test]
    fn test_single_event_is_no_data() {
        let rate = calculate_consumption_rate(&[ev(2024, 1, 1)]);
        assert_eq!(rate, ConsumptionRate::no_data(1));
        assert!(!rate.has_data());
    }

    #[test]
    fn test_same_day_events_are_no_data() {
        let rate = calculate_consumption_rate(&[ev(2024, 1, 1), ev(2024, 1, 1)]);
        assert_eq!(rate.days_between, None);
        assert_eq!(rate.confidence, 0.0);
    }

    #[test]
    fn test_halving_weights() {
        // gaps oldest->newest: 20, 10, 10
        let events = [ev(2024, 1, 1), ev(2024, 1, 21), ev(2024, 1, 31), ev(2024, 2, 10)];
        let rate = calculate_consumption_rate(&events);
        let expected = (20.0 * 0.25 + 10.0 * 0.5 + 10.0 * 1.0) / 1.75;
        assert!((rate.days_between.unwrap() - expected).abs() < 1e-9);
        assert!((rate.days_between.unwrap() - 11.428571).abs() < 1e-5);
        assert_eq!(rate.sample_size, 3);
    }

    #[test]
    fn test_weekly_purchases_have_zero_spread() {
        let events = [ev(2024, 1, 1), ev(2024, 1, 8), ev(2024, 1, 15)];
        let rate = calculate_consumption_rate(&events);
        assert_eq!(rate.days_between, Some(7.0));
        assert_eq!(rate.std_dev, 0.0);
        // two intervals, perfectly consistent
        assert!((rate.confidence - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_cart_adds_are_ignored() {
        let mut cart = ev(2024, 1, 4);
        cart.event_type = EventType::CartAdd;
        let events = [ev(2024, 1, 1), cart, ev(2024, 1, 8)];
        let rate = calculate_consumption_rate(&events);
        assert_eq!(rate.days_between, Some(7.0));
        assert_eq!(rate.sample_size, 1);
    }

    #[test]
    fn test_depletion_events_count() {
        let mut depleted = ev(2024, 1, 6);
        depleted.event_type = EventType::PantryDepleted;
        let rate = calculate_consumption_rate(&[ev(2024, 1, 1), depleted]);
        assert_eq!(rate.days_between, Some(5.0));
    }

    #[test]
    fn test_confidence_monotonic_in_sample_size() {
        // constant spacing keeps std/mean at zero; confidence must never drop
        let mut prev = 0.0;
        for n in 2..15 {
            let events: Vec<PurchaseEvent> = (0..n)
                .map(|i| {
                    let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64 * 7);
                    PurchaseEvent::on_date("p", 1, EventType::OrderPlaced, d)
                })
                .collect();
            let c = calculate_consumption_rate(&events).confidence;
            assert!(c >= prev, "confidence dropped at n={n}");
            prev = c;
        }
        assert_eq!(prev, 1.0);
    }

    #[test]
    fn test_interval_confidence_ratio_fixed() {
        let mut prev = 0.0;
        for n in 1..=12 {
            let c = interval_confidence(n, 10.0, 2.0);
            assert!(c >= prev);
            prev = c;
        }
        assert!((prev - 0.8).abs() < 1e-12);
        assert_eq!(interval_confidence(5, 0.0, 1.0), 0.0);
    }
}
