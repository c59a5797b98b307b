use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Subcommand;
use serde_json::json;

use larder_core::{upcoming_holidays, Category, CategoryType, Holiday};
use larder_engine::{
    auto_categorize_all, category_summary, holiday_items, items_by_category, product_category,
    refresh_all_seasonal_patterns, set_product_category, upcoming_seasonal_items,
    update_seasonal_patterns,
};

use crate::output::{label, or_dash, print_json};
use crate::Ctx;

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Set a product's category. Manual by default; auto-categorization skips it
    Set {
        product_id: String,

        /// routine, regular, treat or uncategorized
        category: CategoryType,

        /// Record as detected rather than a manual override
        #[arg(long, default_value_t = false)]
        auto: bool,
    },

    /// A product's category and whether it was set by hand
    Show { product_id: String },

    /// Product count per category
    Summary,

    /// Products in one category
    List { category: CategoryType },

    /// Re-detect every category that was not set by hand
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum HolidaysCommand {
    /// Holidays whose shop-by date falls in the next N days
    Upcoming {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Date of a holiday in a given year (default: this year)
    Date {
        /// thanksgiving, christmas, halloween, easter or july_4th
        holiday: Holiday,

        #[arg(long)]
        year: Option<i32>,
    },

    /// Products bought for a holiday
    Items { holiday: Holiday },
}

#[derive(Subcommand, Debug)]
pub enum SeasonalCommand {
    /// Products that usually peak in the coming weeks
    Upcoming {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Rebuild monthly patterns for one product, or all of them
    Refresh { product_id: Option<String> },
}

fn describe_category(category: Category) -> String {
    let source = if category.is_override() { "manual" } else { "auto" };
    format!("{} ({source})", category.value())
}

pub fn run_category(ctx: &Ctx, command: CategoryCommand) -> Result<()> {
    match command {
        CategoryCommand::Set {
            product_id,
            category,
            auto,
        } => {
            let change = set_product_category(&ctx.conn, &product_id, category, !auto, ctx.now)?;
            if ctx.json {
                return print_json(&change);
            }
            println!(
                "{product_id}: {} -> {}",
                or_dash(change.previous.map(describe_category)),
                describe_category(change.current)
            );
        }
        CategoryCommand::Show { product_id } => {
            let category = product_category(&ctx.conn, &product_id)?;
            if ctx.json {
                return print_json(&json!({ "product_id": product_id, "category": category }));
            }
            match category {
                Some(c) => println!("{product_id}: {}", describe_category(c)),
                None => println!("{product_id} is not a known product"),
            }
        }
        CategoryCommand::Summary => {
            let summary = category_summary(&ctx.conn)?;
            if ctx.json {
                return print_json(&summary);
            }
            for (category, n) in &summary {
                println!("{:<14} {n}", category.as_str());
            }
        }
        CategoryCommand::List { category } => {
            let items = items_by_category(&ctx.conn, category)?;
            if ctx.json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("No {category} products");
            }
            for item in &items {
                println!(
                    "{} | purchases {} | every {} day(s) | last {}",
                    label(&item.product.product_id, item.product.description.as_deref()),
                    item.total_purchases,
                    or_dash(item.avg_days_between_purchases.map(|d| format!("{d:.1}"))),
                    or_dash(item.last_purchase_date)
                );
            }
        }
        CategoryCommand::Auto => {
            let summary = auto_categorize_all(&ctx.conn, &ctx.config, ctx.now)?;
            if ctx.json {
                return print_json(&summary);
            }
            println!(
                "Categorized {} product(s), {} manual override(s) kept",
                summary.total, summary.skipped_overrides
            );
            for (category, n) in &summary.categorized {
                println!("  {:<14} {n}", category.as_str());
            }
        }
    }
    Ok(())
}

pub fn run_holidays(ctx: &Ctx, command: HolidaysCommand) -> Result<()> {
    match command {
        HolidaysCommand::Upcoming { days } => {
            let holidays = upcoming_holidays(ctx.now.date(), days);
            if ctx.json {
                return print_json(&holidays);
            }
            if holidays.is_empty() {
                println!("No holiday shopping in the next {days} day(s)");
            }
            for h in &holidays {
                println!(
                    "[{:<8}] {} on {} | shop by {} ({} day(s))",
                    h.urgency.as_str(),
                    h.holiday,
                    h.holiday_date,
                    h.shop_by_date,
                    h.days_until_shopping
                );
            }
        }
        HolidaysCommand::Date { holiday, year } => {
            let year = year.unwrap_or_else(|| ctx.now.year());
            let date = holiday
                .date(year)
                .with_context(|| format!("no {holiday} date for {year}"))?;
            if ctx.json {
                return print_json(&json!({ "holiday": holiday, "year": year, "date": date }));
            }
            println!("{holiday} {year}: {}", date.format("%A %Y-%m-%d"));
        }
        HolidaysCommand::Items { holiday } => {
            let items = holiday_items(&ctx.conn, holiday)?;
            if ctx.json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("No products associated with {holiday} yet");
            }
            for item in &items {
                let months: Vec<String> = item.peak_months.iter().map(u32::to_string).collect();
                println!(
                    "{} | {} purchase(s) | peak month(s) {}",
                    label(&item.product_id, item.description.as_deref()),
                    item.purchase_count,
                    months.join(", ")
                );
            }
        }
    }
    Ok(())
}

pub fn run_seasonal(ctx: &Ctx, command: SeasonalCommand) -> Result<()> {
    match command {
        SeasonalCommand::Upcoming { days } => {
            let items = upcoming_seasonal_items(&ctx.conn, ctx.now.date(), days)?;
            if ctx.json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("No seasonal items in the next {days} day(s)");
            }
            for item in &items {
                println!(
                    "[{:<8}] {} | peak month {} | {} | shop by {}",
                    item.urgency.as_str(),
                    label(&item.product_id, item.description.as_deref()),
                    item.peak_month,
                    or_dash(item.holiday),
                    or_dash(item.shop_by_date)
                );
            }
        }
        SeasonalCommand::Refresh {
            product_id: Some(id),
        } => {
            let patterns = update_seasonal_patterns(&ctx.conn, &id)?;
            if ctx.json {
                return print_json(&patterns);
            }
            if patterns.is_empty() {
                println!("{id} has no orders yet");
            }
            for p in patterns.iter().filter(|p| p.purchase_count > 0) {
                println!(
                    "month {:>2} | {} purchase(s) | avg qty {:.1}{}",
                    p.month,
                    p.purchase_count,
                    p.avg_quantity,
                    if p.is_peak_period { " | peak" } else { "" }
                );
            }
        }
        SeasonalCommand::Refresh { product_id: None } => {
            let refreshed = refresh_all_seasonal_patterns(&ctx.conn)?;
            if ctx.json {
                return print_json(&json!({ "refreshed": refreshed }));
            }
            println!("Refreshed seasonal patterns for {refreshed} product(s)");
        }
    }
    Ok(())
}
