//! Per-product statistics: one consolidated record derived from the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::category::{detect_category, CategoryType};
use crate::config::PredictionConfig;
use crate::consumption::calculate_consumption_rate;
use crate::event::PurchaseEvent;
use crate::seasonal::seasonality_score;

/// Everything the predictor needs to know about a product's history.
///
/// A pure function of the qualifying events and the config. There is no
/// wall-clock field, so recomputing an unchanged ledger yields an equal value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductStatistics {
    pub product_id: String,
    pub total_purchases: u32,
    pub total_quantity: u64,
    pub avg_quantity_per_purchase: f64,
    pub avg_days_between_purchases: Option<f64>,
    pub std_dev_days: f64,
    pub last_purchase_date: Option<NaiveDate>,
    pub first_purchase_date: Option<NaiveDate>,
    /// `1 / avg_days`; 1.0 means daily.
    pub purchase_frequency_score: f64,
    pub seasonality_score: f64,
    pub detected_category: CategoryType,
    /// Confidence of the consumption-rate estimate.
    pub confidence: f64,
}

impl ProductStatistics {
    pub fn empty(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            total_purchases: 0,
            total_quantity: 0,
            avg_quantity_per_purchase: 0.0,
            avg_days_between_purchases: None,
            std_dev_days: 0.0,
            last_purchase_date: None,
            first_purchase_date: None,
            purchase_frequency_score: 0.0,
            seasonality_score: 0.0,
            detected_category: CategoryType::Uncategorized,
            confidence: 0.0,
        }
    }
}

/// Build the statistics record for `product_id`.
///
/// Cart additions in `events` are ignored. Returns `None` when no
/// qualifying event exists.
pub fn compute_statistics(
    product_id: &str,
    events: &[PurchaseEvent],
    config: &PredictionConfig,
) -> Option<ProductStatistics> {
    let mut qualifying: Vec<PurchaseEvent> = events
        .iter()
        .filter(|e| e.is_consumption())
        .cloned()
        .collect();
    if qualifying.is_empty() {
        return None;
    }
    qualifying.sort_by(|a, b| {
        a.event_date
            .cmp(&b.event_date)
            .then(a.event_timestamp.cmp(&b.event_timestamp))
    });

    let total_purchases = qualifying.len() as u32;
    let total_quantity: u64 = qualifying.iter().map(|e| u64::from(e.quantity)).sum();
    let rate = calculate_consumption_rate(&qualifying);
    let seasonality = seasonality_score(&qualifying);

    let frequency = match rate.days_between {
        Some(days) if days > 0.0 => 1.0 / days,
        _ => 0.0,
    };

    Some(ProductStatistics {
        product_id: product_id.to_string(),
        total_purchases,
        total_quantity,
        avg_quantity_per_purchase: total_quantity as f64 / total_purchases as f64,
        avg_days_between_purchases: rate.days_between,
        std_dev_days: rate.std_dev,
        last_purchase_date: qualifying.last().map(|e| e.event_date),
        first_purchase_date: qualifying.first().map(|e| e.event_date),
        purchase_frequency_score: frequency,
        seasonality_score: seasonality,
        detected_category: detect_category(rate.days_between, seasonality, total_purchases, config),
        confidence: rate.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    fn order(m: u32, d: u32, qty: u32) -> PurchaseEvent {
        PurchaseEvent::on_date(
            "milk",
            qty,
            EventType::OrderPlaced,
            NaiveDate::from_ymd_opt(2024, m, d).unwrap(),
        )
    }

    #[test]
    fn test_weekly_product_is_routine() {
        let cfg = PredictionConfig::default();
        let events = [order(1, 1, 1), order(1, 8, 1), order(1, 15, 1)];
        let stats = compute_statistics("milk", &events, &cfg).unwrap();
        assert_eq!(stats.total_purchases, 3);
        assert_eq!(stats.avg_days_between_purchases, Some(7.0));
        assert_eq!(stats.std_dev_days, 0.0);
        assert_eq!(stats.detected_category, CategoryType::Routine);
        assert!((stats.purchase_frequency_score - 1.0 / 7.0).abs() < 1e-12);
        assert_eq!(
            stats.first_purchase_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(stats.last_purchase_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn test_no_qualifying_events() {
        let cfg = PredictionConfig::default();
        let mut cart = order(1, 1, 1);
        cart.event_type = EventType::CartAdd;
        assert_eq!(compute_statistics("milk", &[cart], &cfg), None);
    }

    #[test]
    fn test_unsorted_input_and_quantities() {
        let cfg = PredictionConfig::default();
        let events = [order(1, 15, 3), order(1, 1, 1), order(1, 8, 2)];
        let stats = compute_statistics("milk", &events, &cfg).unwrap();
        assert_eq!(stats.total_quantity, 6);
        assert_eq!(stats.avg_quantity_per_purchase, 2.0);
        assert_eq!(stats.avg_days_between_purchases, Some(7.0));
    }

    #[test]
    fn test_large_quantities_do_not_overflow() {
        let cfg = PredictionConfig::default();
        let events = [order(1, 1, 3_000_000_000), order(1, 8, 3_000_000_000)];
        let stats = compute_statistics("milk", &events, &cfg).unwrap();
        assert_eq!(stats.total_quantity, 6_000_000_000);
        assert_eq!(stats.avg_quantity_per_purchase, 3_000_000_000.0);
    }

    #[test]
    fn test_recompute_is_identical() {
        let cfg = PredictionConfig::default();
        let events = [order(1, 1, 1), order(1, 21, 2), order(1, 31, 1), order(2, 10, 1)];
        let a = compute_statistics("milk", &events, &cfg).unwrap();
        let b = compute_statistics("milk", &events, &cfg).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
