//! Repurchase prediction: when will a product be needed again.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::CategoryType;
use crate::config::PredictionConfig;
use crate::statistics::ProductStatistics;

/// Days out at which urgency reaches zero.
const URGENCY_HORIZON_DAYS: f64 = 14.0;
const DUE_TODAY_URGENCY: f64 = 0.9;
const ROUTINE_URGENCY_BOOST: f64 = 1.2;

/// Ordered most urgent first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UrgencyLabel {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "low")]
    Low,
}

impl UrgencyLabel {
    pub fn from_score(urgency: f64, config: &PredictionConfig) -> Self {
        if urgency >= config.urgency_critical {
            UrgencyLabel::Critical
        } else if urgency >= config.urgency_high {
            UrgencyLabel::High
        } else if urgency >= config.urgency_medium {
            UrgencyLabel::Medium
        } else {
            UrgencyLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLabel::Critical => "critical",
            UrgencyLabel::High => "high",
            UrgencyLabel::Medium => "medium",
            UrgencyLabel::Low => "low",
        }
    }
}

impl fmt::Display for UrgencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepurchasePrediction {
    pub product_id: String,
    pub description: Option<String>,
    pub category: CategoryType,
    pub predicted_date: Option<NaiveDateTime>,
    /// Negative when overdue.
    pub days_until: Option<i64>,
    /// 0-1, higher is more urgent.
    pub urgency: f64,
    pub urgency_label: UrgencyLabel,
    /// 0-1.
    pub confidence: f64,
    pub last_purchase_date: Option<chrono::NaiveDate>,
    pub avg_days_between: Option<f64>,
}

impl RepurchasePrediction {
    /// The "not enough history yet" answer. Not an error.
    pub fn no_prediction(
        product_id: impl Into<String>,
        description: Option<String>,
        category: CategoryType,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            description,
            category,
            predicted_date: None,
            days_until: None,
            urgency: 0.0,
            urgency_label: UrgencyLabel::Low,
            confidence: 0.0,
            last_purchase_date: None,
            avg_days_between: None,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.days_until.is_some_and(|d| d < 0)
    }
}

/// Urgency for a prediction `days_until` days away.
pub fn urgency_score(days_until: i64, category: CategoryType) -> f64 {
    let base = if days_until < 0 {
        1.0
    } else if days_until == 0 {
        DUE_TODAY_URGENCY
    } else if (days_until as f64) <= URGENCY_HORIZON_DAYS {
        1.0 - days_until as f64 / URGENCY_HORIZON_DAYS
    } else {
        0.0
    };

    if category == CategoryType::Routine && base > 0.0 {
        (base * ROUTINE_URGENCY_BOOST).min(1.0)
    } else {
        base
    }
}

/// Whole days from `now` to `target`, rounded towards negative infinity.
pub fn floor_days_between(now: NaiveDateTime, target: NaiveDateTime) -> i64 {
    (target - now).num_seconds().div_euclid(86_400)
}

fn fractional_days(days: f64) -> Duration {
    Duration::milliseconds((days * 86_400_000.0).round() as i64)
}

/// Predict the next purchase of one product.
///
/// `category` is the effective category (manual override or detected).
pub fn predict_repurchase(
    stats: &ProductStatistics,
    category: CategoryType,
    description: Option<String>,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> RepurchasePrediction {
    let mut out = RepurchasePrediction::no_prediction(&stats.product_id, description, category);
    out.last_purchase_date = stats.last_purchase_date;
    out.avg_days_between = stats.avg_days_between_purchases;

    if stats.total_purchases < config.min_purchases_for_prediction {
        return out;
    }
    let (Some(avg_days), Some(last)) = (stats.avg_days_between_purchases, stats.last_purchase_date)
    else {
        return out;
    };

    let buffer_days = stats.std_dev_days * config.buffer_for(category);
    let predicted = last.and_time(NaiveTime::MIN) + fractional_days(avg_days - buffer_days);
    let days_until = floor_days_between(now, predicted);
    let urgency = urgency_score(days_until, category);

    let data_confidence =
        (stats.total_purchases as f64 / config.max_confidence_purchases as f64).min(1.0);
    let consistency = if avg_days > 0.0 {
        1.0 - (stats.std_dev_days / avg_days).min(1.0)
    } else {
        0.0
    };

    out.predicted_date = Some(predicted);
    out.days_until = Some(days_until);
    out.urgency = urgency;
    out.urgency_label = UrgencyLabel::from_score(urgency, config);
    out.confidence = data_confidence * consistency;
    out
}

/// Filters for a batch prediction query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionQuery {
    pub days_ahead: i64,
    pub category: Option<CategoryType>,
    pub min_confidence: f64,
    pub include_overdue: bool,
}

impl Default for PredictionQuery {
    fn default() -> Self {
        Self {
            days_ahead: 14,
            category: None,
            min_confidence: 0.0,
            include_overdue: true,
        }
    }
}

impl PredictionQuery {
    pub fn matches(&self, p: &RepurchasePrediction) -> bool {
        if self.category.is_some_and(|c| c != p.category) {
            return false;
        }
        if p.confidence < self.min_confidence {
            return false;
        }
        let Some(days) = p.days_until else {
            return false;
        };
        if days < 0 && !self.include_overdue {
            return false;
        }
        days <= self.days_ahead
    }
}

/// Apply `query` and sort by urgency, most urgent first. Ties keep product order.
pub fn select_predictions(
    predictions: Vec<RepurchasePrediction>,
    query: &PredictionQuery,
) -> Vec<RepurchasePrediction> {
    let mut selected: Vec<RepurchasePrediction> =
        predictions.into_iter().filter(|p| query.matches(p)).collect();
    selected.sort_by(|a, b| {
        b.urgency
            .total_cmp(&a.urgency)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    selected
}
