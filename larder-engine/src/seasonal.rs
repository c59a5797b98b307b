//! Monthly purchase patterns and holiday-driven shopping lists.

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use larder_core::{
    detect_holiday_association, monthly_patterns, upcoming_holidays, EventType, Holiday,
    SeasonalPattern, UrgencyLabel, MAX_LOOKAHEAD_DAYS,
};

use crate::database::{queries, with_immediate};
use crate::error::EngineResult;

/// Extra days of holiday lookahead beyond the shopping window, so that a
/// holiday just past the window still colours the items due inside it.
const HOLIDAY_LOOKAHEAD_SLACK: i64 = 7;

/// Rebuild the twelve monthly rows of one product from its orders.
///
/// Products without orders keep whatever rows they had.
pub fn update_seasonal_patterns(
    conn: &Connection,
    product_id: &str,
) -> EngineResult<Vec<SeasonalPattern>> {
    with_immediate(conn, |tx| {
        let orders = queries::events_for_product(tx, product_id, &[EventType::OrderPlaced])?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let description = queries::get_product(tx, product_id)?.and_then(|p| p.description);
        let holiday = detect_holiday_association(description.as_deref(), &orders);
        let patterns = monthly_patterns(product_id, &orders, holiday);
        queries::upsert_seasonal_patterns(tx, &patterns)?;
        debug!(
            product_id,
            holiday = ?holiday,
            peaks = patterns.iter().filter(|p| p.is_peak_period).count(),
            "seasonal patterns refreshed"
        );
        Ok(patterns)
    })
}

/// Refresh every product with purchases. Returns how many were rebuilt.
pub fn refresh_all_seasonal_patterns(conn: &Connection) -> EngineResult<usize> {
    let mut refreshed = 0;
    for id in queries::products_with_purchases(conn)? {
        if !update_seasonal_patterns(conn, &id)?.is_empty() {
            refreshed += 1;
        }
    }
    Ok(refreshed)
}

/// A product that peaks in a month of the shopping window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalItem {
    pub product_id: String,
    pub description: Option<String>,
    pub peak_month: u32,
    pub purchase_count: u32,
    pub avg_quantity: f64,
    pub holiday: Option<Holiday>,
    pub holiday_date: Option<NaiveDate>,
    pub shop_by_date: Option<NaiveDate>,
    pub days_until_shopping: Option<i64>,
    pub urgency: UrgencyLabel,
}

/// Calendar months touched by `[start, start + days]`.
fn months_in_window(start: NaiveDate, days: i64) -> BTreeSet<u32> {
    let mut months = BTreeSet::new();
    let end = start + Duration::days(days.max(0));
    let mut day = start;
    while day <= end && months.len() < 12 {
        months.insert(day.month());
        day += Duration::days(1);
    }
    months
}

/// Peak-month items due within `days_ahead` days of `today`, most urgent first.
/// The window is capped at [`MAX_LOOKAHEAD_DAYS`].
///
/// Items tied to a holiday whose shop-by date is coming up inherit that
/// holiday's urgency; everything else is `low`.
pub fn upcoming_seasonal_items(
    conn: &Connection,
    today: NaiveDate,
    days_ahead: i64,
) -> EngineResult<Vec<SeasonalItem>> {
    let days_ahead = days_ahead.clamp(0, MAX_LOOKAHEAD_DAYS);
    let holidays = upcoming_holidays(today, days_ahead + HOLIDAY_LOOKAHEAD_SLACK);
    let months = months_in_window(today, days_ahead);

    let mut items: Vec<SeasonalItem> = queries::peak_patterns(conn)?
        .into_iter()
        .filter(|(pattern, _)| months.contains(&pattern.month))
        .map(|(pattern, product)| {
            let upcoming = pattern
                .holiday_association
                .and_then(|h| holidays.iter().find(|u| u.holiday == h));
            SeasonalItem {
                product_id: pattern.product_id,
                description: product.description,
                peak_month: pattern.month,
                purchase_count: pattern.purchase_count,
                avg_quantity: pattern.avg_quantity,
                holiday: pattern.holiday_association,
                holiday_date: upcoming.map(|u| u.holiday_date),
                shop_by_date: upcoming.map(|u| u.shop_by_date),
                days_until_shopping: upcoming.map(|u| u.days_until_shopping),
                urgency: upcoming.map_or(UrgencyLabel::Low, |u| u.urgency),
            }
        })
        .collect();

    items.sort_by_key(|i| (i.urgency, i.days_until_shopping.unwrap_or(999)));
    Ok(items)
}

/// A product whose peak months are tied to a holiday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolidayItem {
    pub product_id: String,
    pub description: Option<String>,
    pub peak_months: Vec<u32>,
    pub purchase_count: u32,
}

pub fn holiday_items(conn: &Connection, holiday: Holiday) -> EngineResult<Vec<HolidayItem>> {
    let mut items: Vec<HolidayItem> = Vec::new();
    for (pattern, product) in queries::peak_patterns(conn)? {
        if pattern.holiday_association != Some(holiday) {
            continue;
        }
        match items.iter_mut().find(|i| i.product_id == pattern.product_id) {
            Some(item) => {
                item.peak_months.push(pattern.month);
                item.purchase_count += pattern.purchase_count;
            }
            None => items.push(HolidayItem {
                product_id: pattern.product_id,
                description: product.description,
                peak_months: vec![pattern.month],
                purchase_count: pattern.purchase_count,
            }),
        }
    }
    items.sort_by(|a, b| {
        b.purchase_count
            .cmp(&a.purchase_count)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_in_memory;
    use crate::models::ProductDetails;
    use larder_core::PurchaseEvent;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seed(conn: &Connection, id: &str, description: &str, dates: &[NaiveDate]) {
        let details = ProductDetails {
            description: Some(description.to_string()),
            ..Default::default()
        };
        let now = dates[0].and_hms_opt(8, 0, 0).unwrap();
        queries::ensure_product(conn, id, &details, None, now).unwrap();
        for day in dates {
            let e = PurchaseEvent::on_date(id, 1, EventType::OrderPlaced, *day);
            queries::insert_event(conn, &e).unwrap();
        }
    }

    #[test]
    fn test_months_in_window_wraps_year() {
        let months = months_in_window(d(2024, 12, 28), 7);
        assert_eq!(months.into_iter().collect::<Vec<_>>(), vec![1, 12]);
        assert_eq!(months_in_window(d(2024, 1, 1), 400).len(), 12);
    }

    #[test]
    fn test_patterns_mark_november_peak_for_turkey() {
        let conn = init_in_memory().unwrap();
        seed(
            &conn,
            "turkey",
            "Whole Turkey",
            &[d(2022, 11, 20), d(2023, 11, 18), d(2023, 11, 22)],
        );
        let patterns = update_seasonal_patterns(&conn, "turkey").unwrap();
        assert_eq!(patterns.len(), 12);
        let nov = &patterns[10];
        assert!(nov.is_peak_period);
        assert_eq!(nov.purchase_count, 3);
        assert_eq!(nov.holiday_association, Some(Holiday::Thanksgiving));
        assert!(patterns.iter().filter(|p| p.month != 11).all(|p| !p.is_peak_period));
        assert_eq!(queries::seasonal_patterns_for(&conn, "turkey").unwrap(), patterns);

        let items = holiday_items(&conn, Holiday::Thanksgiving).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].peak_months, vec![11]);
        assert!(holiday_items(&conn, Holiday::Easter).unwrap().is_empty());
    }

    #[test]
    fn test_upcoming_items_pick_up_holiday_urgency() {
        let conn = init_in_memory().unwrap();
        seed(
            &conn,
            "turkey",
            "Whole Turkey",
            &[d(2022, 11, 20), d(2023, 11, 18), d(2023, 11, 22)],
        );
        seed(&conn, "rice", "Rice", &[d(2023, 3, 1), d(2023, 3, 9), d(2023, 3, 20)]);
        refresh_all_seasonal_patterns(&conn).unwrap();

        // Thanksgiving 2024 is Nov 28, shop by Nov 26.
        let items = upcoming_seasonal_items(&conn, d(2024, 11, 25), 7).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, "turkey");
        assert_eq!(items[0].days_until_shopping, Some(1));
        assert_eq!(items[0].urgency, UrgencyLabel::High);

        let march = upcoming_seasonal_items(&conn, d(2024, 3, 1), 7).unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].product_id, "rice");
        assert_eq!(march[0].urgency, UrgencyLabel::Low);
        assert_eq!(march[0].days_until_shopping, None);
    }

    #[test]
    fn test_extreme_windows_are_capped() {
        let conn = init_in_memory().unwrap();
        seed(&conn, "rice", "Rice", &[d(2023, 3, 1), d(2023, 3, 9), d(2023, 3, 20)]);
        refresh_all_seasonal_patterns(&conn).unwrap();

        let all = upcoming_seasonal_items(&conn, d(2024, 1, 1), i64::MAX).unwrap();
        assert_eq!(all.len(), 1);
        assert!(upcoming_seasonal_items(&conn, d(2024, 1, 1), i64::MIN).unwrap().is_empty());
    }
}
