//! larder-core: Domain types and analytics for repurchase prediction

pub mod category;
pub mod config;
pub mod consumption;
pub mod error;
pub mod event;
pub mod pantry;
pub mod prediction;
pub mod seasonal;
pub mod stats;
pub mod statistics;
pub mod time;
pub mod trend;

pub use category::{detect_category, Category, CategoryType, MIN_PURCHASES_FOR_CATEGORY};
pub use config::{PredictionConfig, CONFIG_KEYS};
pub use consumption::{calculate_consumption_rate, purchase_intervals, ConsumptionRate};
pub use error::{ValidationError, ValidationResult};
pub use event::{checked_quantity, EventType, PurchaseEvent};
pub use pantry::{
    decay, depletion_rate_from, triggers_depletion_feedback, PantryItem, PantryItemStatus,
    PantryStatus, DEPLETED_THRESHOLD,
};
pub use prediction::{
    predict_repurchase, select_predictions, urgency_score, PredictionQuery,
    RepurchasePrediction, UrgencyLabel,
};
pub use seasonal::{
    detect_holiday_association, get_holiday_date, monthly_patterns, seasonality_score,
    upcoming_holidays, Holiday, SeasonalPattern, UpcomingHoliday, MAX_LOOKAHEAD_DAYS,
};
pub use statistics::{compute_statistics, ProductStatistics};
pub use trend::{analyze_history, TrendDirection, TrendInsight};
