//! Prediction queries over the stored statistics.
//!
//! Nothing here writes. Predictions are computed on demand from the latest
//! statistics row of each product and the caller's `now`.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use larder_core::{
    analyze_history, predict_repurchase, select_predictions, CategoryType, EventType,
    PredictionConfig, PredictionQuery, RepurchasePrediction, TrendInsight,
};

use crate::database::queries;
use crate::error::EngineResult;
use crate::seasonal::{upcoming_seasonal_items, SeasonalItem};

/// Urgency from which a due item counts as high priority in suggestions.
const HIGH_URGENCY: f64 = 0.7;

/// Prediction for one product. Unknown products and products without
/// statistics get the "no prediction" answer.
pub fn predict_for_product(
    conn: &Connection,
    product_id: &str,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<RepurchasePrediction> {
    let product = queries::get_product(conn, product_id)?;
    let stats = queries::get_statistics(conn, product_id)?;
    let description = product.as_ref().and_then(|p| p.description.clone());

    Ok(match (product, stats) {
        (Some(product), Some(stats)) => {
            predict_repurchase(&stats, product.category.value(), description, now, config)
        }
        (None, Some(stats)) => {
            predict_repurchase(&stats, stats.detected_category, description, now, config)
        }
        (product, None) => RepurchasePrediction::no_prediction(
            product_id,
            description,
            product.map_or(CategoryType::Uncategorized, |p| p.category.value()),
        ),
    })
}

/// Predictions for every product matching `query`, most urgent first.
pub fn predictions_for_period(
    conn: &Connection,
    query: &PredictionQuery,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<Vec<RepurchasePrediction>> {
    let predictions = queries::list_statistics_with_products(conn)?
        .into_iter()
        .map(|(product, stats)| {
            predict_repurchase(&stats, product.category.value(), product.description, now, config)
        })
        .collect();
    Ok(select_predictions(predictions, query))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueItem {
    #[serde(flatten)]
    pub prediction: RepurchasePrediction,
    pub days_overdue: i64,
}

/// Products whose predicted date has passed, most urgent first.
pub fn overdue_items(
    conn: &Connection,
    category: Option<CategoryType>,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<Vec<OverdueItem>> {
    let query = PredictionQuery {
        days_ahead: 0,
        category,
        min_confidence: 0.0,
        include_overdue: true,
    };
    Ok(predictions_for_period(conn, &query, now, config)?
        .into_iter()
        .filter_map(|p| {
            let days = p.days_until.filter(|d| *d < 0)?;
            Some(OverdueItem {
                prediction: p,
                days_overdue: days.abs(),
            })
        })
        .collect())
}

/// Which groups a shopping list should contain.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionOptions {
    pub include_routine: bool,
    pub include_predicted: bool,
    pub include_seasonal: bool,
    pub days_ahead: i64,
    pub min_confidence: f64,
}

impl Default for SuggestionOptions {
    fn default() -> Self {
        Self {
            include_routine: true,
            include_predicted: true,
            include_seasonal: true,
            days_ahead: 7,
            min_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestionSummary {
    pub total_suggestions: usize,
    pub overdue_count: usize,
    pub high_urgency_count: usize,
    pub routine_count: usize,
    pub predicted_count: usize,
    pub seasonal_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShoppingSuggestions {
    pub overdue_items: Vec<OverdueItem>,
    pub routine_items: Vec<RepurchasePrediction>,
    pub predicted_needs: Vec<RepurchasePrediction>,
    pub seasonal_items: Vec<SeasonalItem>,
    pub summary: SuggestionSummary,
}

/// A shopping list: overdue items first, then what is due within the window.
pub fn shopping_suggestions(
    conn: &Connection,
    options: &SuggestionOptions,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<ShoppingSuggestions> {
    let mut out = ShoppingSuggestions {
        overdue_items: overdue_items(conn, None, now, config)?,
        ..Default::default()
    };

    let query = PredictionQuery {
        days_ahead: options.days_ahead,
        category: None,
        min_confidence: options.min_confidence,
        include_overdue: false,
    };
    for p in predictions_for_period(conn, &query, now, config)? {
        if p.category == CategoryType::Routine {
            if options.include_routine {
                out.routine_items.push(p);
            }
        } else if options.include_predicted {
            out.predicted_needs.push(p);
        }
    }

    if options.include_seasonal {
        out.seasonal_items = upcoming_seasonal_items(conn, now.date(), options.days_ahead)?;
    }

    let due_high = out
        .routine_items
        .iter()
        .chain(&out.predicted_needs)
        .filter(|p| p.urgency >= HIGH_URGENCY)
        .count();
    out.summary = SuggestionSummary {
        total_suggestions: out.overdue_items.len()
            + out.routine_items.len()
            + out.predicted_needs.len()
            + out.seasonal_items.len(),
        overdue_count: out.overdue_items.len(),
        high_urgency_count: out.overdue_items.len() + due_high,
        routine_count: out.routine_items.len(),
        predicted_count: out.predicted_needs.len(),
        seasonal_count: out.seasonal_items.len(),
    };
    Ok(out)
}

/// Trend view of one product next to its regular prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductInsight {
    pub prediction: RepurchasePrediction,
    pub trend: TrendInsight,
}

pub fn product_insight(
    conn: &Connection,
    product_id: &str,
    now: NaiveDateTime,
    config: &PredictionConfig,
) -> EngineResult<ProductInsight> {
    let events = queries::events_for_product(
        conn,
        product_id,
        &[EventType::OrderPlaced, EventType::PantryDepleted],
    )?;
    Ok(ProductInsight {
        prediction: predict_for_product(conn, product_id, now, config)?,
        trend: analyze_history(&events, now.date(), config.max_confidence_purchases),
    })
}
