use anyhow::Result;
use clap::Subcommand;

use larder_core::{CategoryType, PredictionQuery};
use larder_engine::{
    overdue_items, predict_for_product, predictions_for_period, product_insight,
    shopping_suggestions, SuggestionOptions,
};

use crate::output::{label, or_dash, prediction_line, print_json};
use crate::Ctx;

#[derive(Subcommand, Debug)]
pub enum PredictCommand {
    /// When one product will be needed again
    Product { product_id: String },

    /// Everything due within the next N days, most urgent first
    Period {
        #[arg(long, default_value_t = 14)]
        days: i64,

        /// routine, regular, treat or uncategorized
        #[arg(long)]
        category: Option<CategoryType>,

        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,

        /// Leave out items whose predicted date has passed
        #[arg(long, default_value_t = false)]
        no_overdue: bool,
    },

    /// Items past their predicted date
    Overdue {
        #[arg(long)]
        category: Option<CategoryType>,
    },

    /// Shopping list: overdue, routine, predicted and seasonal items
    Suggest {
        #[arg(long, default_value_t = 7)]
        days: i64,

        #[arg(long, default_value_t = 0.5)]
        min_confidence: f64,

        #[arg(long, default_value_t = false)]
        no_routine: bool,

        #[arg(long, default_value_t = false)]
        no_predicted: bool,

        #[arg(long, default_value_t = false)]
        no_seasonal: bool,
    },
}

pub fn run(ctx: &Ctx, command: PredictCommand) -> Result<()> {
    match command {
        PredictCommand::Product { product_id } => {
            let p = predict_for_product(&ctx.conn, &product_id, ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&p);
            }
            println!("{}", prediction_line(&p));
            if let Some(date) = p.predicted_date {
                println!(
                    "  predicted {} | last bought {} | every {} day(s)",
                    date.format("%Y-%m-%d"),
                    or_dash(p.last_purchase_date),
                    or_dash(p.avg_days_between.map(|d| format!("{d:.1}")))
                );
            }
        }
        PredictCommand::Period {
            days,
            category,
            min_confidence,
            no_overdue,
        } => {
            let query = PredictionQuery {
                days_ahead: days,
                category,
                min_confidence,
                include_overdue: !no_overdue,
            };
            let predictions = predictions_for_period(&ctx.conn, &query, ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&predictions);
            }
            if predictions.is_empty() {
                println!("Nothing due in the next {days} day(s)");
            }
            for p in &predictions {
                println!("{}", prediction_line(p));
            }
        }
        PredictCommand::Overdue { category } => {
            let items = overdue_items(&ctx.conn, category, ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("Nothing overdue");
            }
            for item in &items {
                println!("{}", prediction_line(&item.prediction));
            }
        }
        PredictCommand::Suggest {
            days,
            min_confidence,
            no_routine,
            no_predicted,
            no_seasonal,
        } => {
            let options = SuggestionOptions {
                include_routine: !no_routine,
                include_predicted: !no_predicted,
                include_seasonal: !no_seasonal,
                days_ahead: days,
                min_confidence,
            };
            let list = shopping_suggestions(&ctx.conn, &options, ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&list);
            }

            let s = &list.summary;
            println!(
                "{} suggestion(s), {} overdue, {} high urgency",
                s.total_suggestions, s.overdue_count, s.high_urgency_count
            );
            if !list.overdue_items.is_empty() {
                println!("\nOverdue");
                for item in &list.overdue_items {
                    println!("  {}", prediction_line(&item.prediction));
                }
            }
            if !list.routine_items.is_empty() {
                println!("\nRoutine");
                for p in &list.routine_items {
                    println!("  {}", prediction_line(p));
                }
            }
            if !list.predicted_needs.is_empty() {
                println!("\nPredicted");
                for p in &list.predicted_needs {
                    println!("  {}", prediction_line(p));
                }
            }
            if !list.seasonal_items.is_empty() {
                println!("\nSeasonal");
                for item in &list.seasonal_items {
                    println!(
                        "  [{:<8}] {} | peak month {} | {}",
                        item.urgency.as_str(),
                        label(&item.product_id, item.description.as_deref()),
                        item.peak_month,
                        or_dash(item.holiday)
                    );
                }
            }
        }
    }
    Ok(())
}

pub fn run_insight(ctx: &Ctx, product_id: &str) -> Result<()> {
    let insight = product_insight(&ctx.conn, product_id, ctx.now, &ctx.config)?;
    if ctx.json {
        return print_json(&insight);
    }
    let t = &insight.trend;
    println!("{}", prediction_line(&insight.prediction));
    println!(
        "  trend {} (strength {:.2}) over {} interval(s)",
        t.trend, t.trend_strength, t.interval_count
    );
    println!(
        "  base {} day(s), trend-adjusted {} day(s), {} day(s) per unit",
        or_dash(t.base_days.map(|d| format!("{d:.1}"))),
        or_dash(t.adjusted_days.map(|d| format!("{d:.1}"))),
        or_dash(t.days_per_unit.map(|d| format!("{d:.1}")))
    );
    println!(
        "  recency {:.2} | interval consistency {:.2} | quantity consistency {:.2} | confidence {:.2}",
        t.recency, t.interval_consistency, t.quantity_consistency, t.confidence
    );
    Ok(())
}
