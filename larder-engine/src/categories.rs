//! Product categories: manual overrides and batch auto-categorization.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use larder_core::{detect_category, Category, CategoryType, PredictionConfig};

use crate::database::{queries, with_immediate};
use crate::error::EngineResult;
use crate::models::{Product, ProductDetails};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChange {
    pub product_id: String,
    /// `None` when the product did not exist before.
    pub previous: Option<Category>,
    pub current: Category,
}

/// Set a product's category. An override sticks until replaced by another
/// `set_product_category` call; auto-categorization never touches it.
///
/// Unknown products are created.
pub fn set_product_category(
    conn: &Connection,
    product_id: &str,
    category: CategoryType,
    is_override: bool,
    now: NaiveDateTime,
) -> EngineResult<CategoryChange> {
    with_immediate(conn, |tx| {
        let previous = queries::get_product(tx, product_id)?.map(|p| p.category);
        if previous.is_none() {
            queries::ensure_product(tx, product_id, &ProductDetails::default(), None, now)?;
        }
        let current = Category::from_parts(category, is_override);
        queries::update_category(tx, product_id, current, now)?;
        info!(product_id, category = %category, is_override, "category set");
        Ok(CategoryChange {
            product_id: product_id.to_string(),
            previous,
            current,
        })
    })
}

pub fn product_category(conn: &Connection, product_id: &str) -> EngineResult<Option<Category>> {
    Ok(queries::get_product(conn, product_id)?.map(|p| p.category))
}

/// A product in a category listing, with its headline statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedItem {
    pub product: Product,
    pub total_purchases: u32,
    pub avg_days_between_purchases: Option<f64>,
    pub last_purchase_date: Option<chrono::NaiveDate>,
    pub seasonality_score: f64,
}

pub fn items_by_category(
    conn: &Connection,
    category: CategoryType,
) -> EngineResult<Vec<CategorizedItem>> {
    let products = queries::products_in_category(conn, category)?;
    let mut out = Vec::with_capacity(products.len());
    for product in products {
        let stats = queries::get_statistics(conn, &product.product_id)?;
        out.push(CategorizedItem {
            total_purchases: stats.as_ref().map_or(0, |s| s.total_purchases),
            avg_days_between_purchases: stats.as_ref().and_then(|s| s.avg_days_between_purchases),
            last_purchase_date: stats.as_ref().and_then(|s| s.last_purchase_date),
            seasonality_score: stats.as_ref().map_or(0.0, |s| s.seasonality_score),
            product,
        });
    }
    Ok(out)
}

/// Product count per category. Every category is present, possibly with 0.
pub fn category_summary(conn: &Connection) -> EngineResult<BTreeMap<CategoryType, u32>> {
    let mut summary: BTreeMap<CategoryType, u32> =
        CategoryType::ALL.into_iter().map(|c| (c, 0)).collect();
    for (category, n) in queries::category_counts(conn)? {
        summary.insert(category, n);
    }
    Ok(summary)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoCategorizeSummary {
    pub categorized: BTreeMap<CategoryType, u32>,
    /// Products left alone because of a manual override.
    pub skipped_overrides: u32,
    pub total: u32,
}

/// Re-detect the category of every product without a manual override.
pub fn auto_categorize_all(
    conn: &Connection,
    config: &PredictionConfig,
    now: NaiveDateTime,
) -> EngineResult<AutoCategorizeSummary> {
    with_immediate(conn, |tx| {
        let mut summary = AutoCategorizeSummary {
            categorized: CategoryType::ALL.into_iter().map(|c| (c, 0)).collect(),
            ..Default::default()
        };

        for product in queries::list_products(tx)? {
            if product.category.is_override() {
                summary.skipped_overrides += 1;
                continue;
            }
            let stats = queries::get_statistics(tx, &product.product_id)?;
            let detected = detect_category(
                stats.as_ref().and_then(|s| s.avg_days_between_purchases),
                stats.as_ref().map_or(0.0, |s| s.seasonality_score),
                stats.as_ref().map_or(0, |s| s.total_purchases),
                config,
            );
            let next = product.category.apply_detected(detected);
            if next != product.category {
                queries::update_category(tx, &product.product_id, next, now)?;
            }
            *summary.categorized.entry(detected).or_default() += 1;
            summary.total += 1;
        }

        info!(
            total = summary.total,
            skipped = summary.skipped_overrides,
            "auto-categorization finished"
        );
        Ok(summary)
    })
}
