//! Purchase-cadence categories and the rules that detect them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::PredictionConfig;
use crate::error::ValidationError;

/// Minimum purchases before a cadence is trusted.
pub const MIN_PURCHASES_FOR_CATEGORY: u32 = 3;
/// Seasonality above which an infrequent product is a treat rather than regular.
const INFREQUENT_TREAT_SEASONALITY: f64 = 0.4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryType {
    /// Every 1-14 days: milk, bread, eggs.
    #[serde(rename = "routine")]
    Routine,
    /// Every 15-60 days: cleaning supplies, seasonings.
    #[serde(rename = "regular")]
    Regular,
    /// Seasonal or holiday purchases.
    #[serde(rename = "treat")]
    Treat,
    #[serde(rename = "uncategorized")]
    Uncategorized,
}

impl CategoryType {
    pub const ALL: [CategoryType; 4] = [
        CategoryType::Routine,
        CategoryType::Regular,
        CategoryType::Treat,
        CategoryType::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Routine => "routine",
            CategoryType::Regular => "regular",
            CategoryType::Treat => "treat",
            CategoryType::Uncategorized => "uncategorized",
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "routine" => Ok(CategoryType::Routine),
            "regular" => Ok(CategoryType::Regular),
            "treat" => Ok(CategoryType::Treat),
            "uncategorized" => Ok(CategoryType::Uncategorized),
            _ => Err(ValidationError::UnknownCategory(s.to_string())),
        }
    }
}

/// A product's category together with who decided it.
///
/// `Manual` values come from the user and are never replaced by detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", content = "category", rename_all = "snake_case")]
pub enum Category {
    Auto(CategoryType),
    Manual(CategoryType),
}

impl Category {
    pub fn from_parts(category: CategoryType, is_override: bool) -> Self {
        if is_override {
            Category::Manual(category)
        } else {
            Category::Auto(category)
        }
    }

    pub fn value(&self) -> CategoryType {
        match self {
            Category::Auto(c) | Category::Manual(c) => *c,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Category::Manual(_))
    }

    /// Fold in a freshly detected category. Manual choices win.
    pub fn apply_detected(self, detected: CategoryType) -> Self {
        match self {
            Category::Manual(_) => self,
            Category::Auto(_) => Category::Auto(detected),
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Auto(CategoryType::Uncategorized)
    }
}

/// Classify a product from its purchase cadence and seasonality.
pub fn detect_category(
    avg_days: Option<f64>,
    seasonality_score: f64,
    total_purchases: u32,
    config: &PredictionConfig,
) -> CategoryType {
    if total_purchases < MIN_PURCHASES_FOR_CATEGORY {
        return CategoryType::Uncategorized;
    }

    if seasonality_score > config.seasonality_threshold {
        return CategoryType::Treat;
    }

    let Some(avg) = avg_days else {
        return CategoryType::Uncategorized;
    };

    if avg <= config.routine_max_days as f64 {
        CategoryType::Routine
    } else if avg <= config.regular_max_days as f64 {
        CategoryType::Regular
    } else if seasonality_score > INFREQUENT_TREAT_SEASONALITY {
        CategoryType::Treat
    } else {
        CategoryType::Regular
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(avg: Option<f64>, seasonality: f64, total: u32) -> CategoryType {
        detect_category(avg, seasonality, total, &PredictionConfig::default())
    }

    #[test]
    fn test_too_few_purchases() {
        assert_eq!(detect(Some(7.0), 0.9, 2), CategoryType::Uncategorized);
    }

    #[test]
    fn test_seasonal_beats_cadence() {
        assert_eq!(detect(Some(7.0), 0.75, 5), CategoryType::Treat);
        assert_eq!(detect(None, 0.75, 5), CategoryType::Treat);
    }

    #[test]
    fn test_cadence_thresholds() {
        assert_eq!(detect(None, 0.0, 5), CategoryType::Uncategorized);
        assert_eq!(detect(Some(14.0), 0.0, 5), CategoryType::Routine);
        assert_eq!(detect(Some(14.5), 0.0, 5), CategoryType::Regular);
        assert_eq!(detect(Some(60.0), 0.0, 5), CategoryType::Regular);
        assert_eq!(detect(Some(90.0), 0.5, 5), CategoryType::Treat);
        assert_eq!(detect(Some(90.0), 0.4, 5), CategoryType::Regular);
    }

    #[test]
    fn test_thresholds_follow_config() {
        let cfg = PredictionConfig::default()
            .with_value("routine_max_days", "7")
            .unwrap();
        assert_eq!(detect_category(Some(10.0), 0.0, 4, &cfg), CategoryType::Regular);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("Routine".parse::<CategoryType>().unwrap(), CategoryType::Routine);
        assert_eq!(
            "snack".parse::<CategoryType>(),
            Err(ValidationError::UnknownCategory("snack".to_string()))
        );
    }

    #[test]
    fn test_manual_category_is_sticky() {
        let manual = Category::Manual(CategoryType::Treat);
        assert_eq!(manual.apply_detected(CategoryType::Routine), manual);
        let auto = Category::default();
        assert_eq!(
            auto.apply_detected(CategoryType::Routine),
            Category::Auto(CategoryType::Routine)
        );
        assert!(Category::from_parts(CategoryType::Regular, true).is_override());
    }
}
