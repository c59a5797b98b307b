//! larder-engine: SQLite ledger plus the services that keep statistics,
//! categories, seasonal patterns and pantry levels in step with it.

pub mod categories;
pub mod database;
pub mod error;
pub mod migration;
pub mod models;
pub mod pantry;
pub mod predictions;
pub mod seasonal;
pub mod statistics;
pub mod tracker;

pub use categories::{
    auto_categorize_all, category_summary, items_by_category, product_category,
    set_product_category, AutoCategorizeSummary, CategorizedItem, CategoryChange,
};
pub use database::{init_database, init_in_memory, with_immediate};
pub use error::{EngineError, EngineResult};
pub use migration::{
    clear_migration_marker, migration_status, run_backfill, MigrationInput, MigrationMarker,
    MigrationOutcome, MigrationSummary,
};
pub use models::{OrderRecord, Product, ProductDetails, ProductProfile};
pub use pantry::{
    add_to_pantry, apply_daily_depletion, low_inventory_items, pantry_item, pantry_status,
    remove_from_pantry, restock_item, set_pantry_level, FeedbackOutcome, LevelChange,
    TrackOptions,
};
pub use predictions::{
    overdue_items, predict_for_product, predictions_for_period, product_insight,
    shopping_suggestions, OverdueItem, ProductInsight, ShoppingSuggestions, SuggestionOptions,
    SuggestionSummary,
};
pub use seasonal::{
    holiday_items, refresh_all_seasonal_patterns, upcoming_seasonal_items,
    update_seasonal_patterns, HolidayItem, SeasonalItem,
};
pub use statistics::{
    all_product_statistics, product_statistics, update_all_product_stats, update_product_stats,
    BulkUpdate,
};
pub use tracker::{
    ensure_product, order_history, purchase_events, record_cart_add, record_order, OrderItem,
    OrderReceipt,
};
