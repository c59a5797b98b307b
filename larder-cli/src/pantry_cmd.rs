use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use larder_core::PantryItemStatus;
use larder_engine::{
    add_to_pantry, apply_daily_depletion, low_inventory_items, pantry_item, pantry_status,
    remove_from_pantry, restock_item, set_pantry_level, FeedbackOutcome, TrackOptions,
};

use crate::output::{label, or_dash, print_json};
use crate::Ctx;

#[derive(Subcommand, Debug)]
pub enum PantryCommand {
    /// Start tracking a product's level
    Add {
        product_id: String,

        /// Starting level, 0-100
        #[arg(long, default_value_t = 100.0)]
        level: f64,

        /// Level at or under which the item counts as low
        #[arg(long, default_value_t = 20.0)]
        threshold: f64,

        /// Keep the level where it is set instead of estimating use
        #[arg(long, default_value_t = false)]
        no_auto_deplete: bool,
    },

    /// Stop tracking a product
    Remove { product_id: String },

    /// Mark a product as refilled
    Restock {
        product_id: String,

        #[arg(long)]
        level: Option<f64>,
    },

    /// Set the current level by hand
    Set { product_id: String, level: f64 },

    /// Estimated levels of one tracked product, or all of them
    Status { product_id: Option<String> },

    /// Items running low
    Low {
        /// Use this threshold instead of each item's own
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Store estimated levels for every auto-depleting item
    Deplete,
}

fn status_line(s: &PantryItemStatus) -> String {
    format!(
        "{} | {:>3}% {:<8} | empty in {} day(s) | restocked {}",
        label(&s.product_id, s.description.as_deref()),
        s.level_percent,
        s.status.as_str(),
        or_dash(s.days_until_empty),
        or_dash(s.last_restocked_at.map(|t| t.format("%Y-%m-%d")))
    )
}

pub fn run(ctx: &Ctx, command: PantryCommand) -> Result<()> {
    match command {
        PantryCommand::Add {
            product_id,
            level,
            threshold,
            no_auto_deplete,
        } => {
            let options = TrackOptions {
                level,
                low_threshold: threshold,
                auto_deplete: !no_auto_deplete,
            };
            let status = add_to_pantry(&ctx.conn, &product_id, &options, ctx.now)?;
            if ctx.json {
                return print_json(&status);
            }
            println!("Tracking {}", status_line(&status));
        }
        PantryCommand::Remove { product_id } => {
            let removed = remove_from_pantry(&ctx.conn, &product_id)?;
            if ctx.json {
                return print_json(&json!({ "product_id": product_id, "removed": removed }));
            }
            if removed {
                println!("Stopped tracking {product_id}");
            } else {
                println!("{product_id} was not tracked");
            }
        }
        PantryCommand::Restock { product_id, level } => {
            let status = restock_item(&ctx.conn, &product_id, level, ctx.now)?;
            if ctx.json {
                return print_json(&status);
            }
            println!("Restocked {}", status_line(&status));
        }
        PantryCommand::Set { product_id, level } => {
            let change = set_pantry_level(&ctx.conn, &product_id, level, ctx.now, &ctx.config)?;
            if ctx.json {
                return print_json(&change);
            }
            println!("{}", status_line(&change.status));
            match &change.feedback {
                FeedbackOutcome::NotTriggered => {}
                FeedbackOutcome::Recorded => {
                    println!("Recorded as used up; statistics updated")
                }
                FeedbackOutcome::RecomputeFailed(reason) => {
                    println!("warning: level saved but statistics were not updated: {reason}")
                }
            }
        }
        PantryCommand::Status {
            product_id: Some(id),
        } => {
            let status = pantry_item(&ctx.conn, &id, ctx.now)?;
            if ctx.json {
                return print_json(&status);
            }
            match status {
                Some(s) => println!("{}", status_line(&s)),
                None => println!("{id} is not tracked"),
            }
        }
        PantryCommand::Status { product_id: None } => {
            let items = pantry_status(&ctx.conn, ctx.now)?;
            if ctx.json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("Nothing tracked yet. Start with `larder pantry add <product>`.");
            }
            for s in &items {
                println!("{}", status_line(s));
            }
        }
        PantryCommand::Low { threshold } => {
            let items = low_inventory_items(&ctx.conn, threshold, ctx.now)?;
            if ctx.json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("Nothing is running low");
            }
            for s in &items {
                println!("{}", status_line(s));
            }
        }
        PantryCommand::Deplete => {
            let updated = apply_daily_depletion(&ctx.conn, ctx.now)?;
            if ctx.json {
                return print_json(&json!({ "updated": updated }));
            }
            println!("Updated {updated} pantry level(s)");
        }
    }
    Ok(())
}
