use anyhow::Result;
use serde::Serialize;
use std::fmt::Display;

use larder_core::RepurchasePrediction;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn or_dash<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn label(product_id: &str, description: Option<&str>) -> String {
    match description {
        Some(d) => format!("{d} ({product_id})"),
        None => product_id.to_string(),
    }
}

pub fn prediction_line(p: &RepurchasePrediction) -> String {
    let when = match p.days_until {
        Some(d) if d < 0 => format!("overdue by {} day(s)", -d),
        Some(0) => "due today".to_string(),
        Some(d) => format!("due in {d} day(s)"),
        None => "not enough history".to_string(),
    };
    format!(
        "[{:<8}] {} | {} | {} | confidence {:.2}",
        p.urgency_label.as_str(),
        label(&p.product_id, p.description.as_deref()),
        p.category,
        when,
        p.confidence
    )
}
