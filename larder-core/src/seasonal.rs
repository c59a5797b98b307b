//! Seasonality scoring and holiday detection.
//!
//! Holiday items should be bought a couple of days *before* the holiday,
//! so every holiday carries a shopping lead time.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::event::{EventType, PurchaseEvent};
use crate::prediction::UrgencyLabel;
use crate::stats::{mean, sample_std_dev};

/// Minimum events before a monthly distribution means anything.
const MIN_EVENTS_FOR_SEASONALITY: usize = 4;
/// Share of purchases inside a holiday's months that ties a product to it.
const HOLIDAY_MONTH_SHARE: f64 = 0.8;
/// Longest lookahead any seasonal query honours, about ten years.
pub const MAX_LOOKAHEAD_DAYS: i64 = 3660;

/// Holidays in their fixed priority order. Ties in association are broken
/// by this order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Holiday {
    #[serde(rename = "thanksgiving")]
    Thanksgiving,
    #[serde(rename = "christmas")]
    Christmas,
    #[serde(rename = "halloween")]
    Halloween,
    #[serde(rename = "easter")]
    Easter,
    #[serde(rename = "july_4th")]
    July4th,
}

impl Holiday {
    pub const ALL: [Holiday; 5] = [
        Holiday::Thanksgiving,
        Holiday::Christmas,
        Holiday::Halloween,
        Holiday::Easter,
        Holiday::July4th,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Holiday::Thanksgiving => "thanksgiving",
            Holiday::Christmas => "christmas",
            Holiday::Halloween => "halloween",
            Holiday::Easter => "easter",
            Holiday::July4th => "july_4th",
        }
    }

    /// Months in which holiday shopping happens.
    pub fn months(&self) -> &'static [u32] {
        match self {
            Holiday::Thanksgiving => &[10, 11],
            Holiday::Christmas => &[11, 12],
            Holiday::Halloween => &[9, 10],
            Holiday::Easter => &[3, 4],
            Holiday::July4th => &[6, 7],
        }
    }

    /// Lower-case description fragments that mark a holiday item.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Holiday::Thanksgiving => &["turkey", "stuffing", "cranberry", "pie", "gravy"],
            Holiday::Christmas => &["ham", "eggnog", "candy cane", "gingerbread", "fruitcake"],
            Holiday::Halloween => &["candy", "pumpkin", "chocolate"],
            Holiday::Easter => &["ham", "egg", "chocolate", "lamb"],
            Holiday::July4th => &["hotdog", "hamburger", "bun", "chips", "watermelon"],
        }
    }

    /// Days before the holiday by which to shop.
    pub fn lead_days(&self) -> i64 {
        match self {
            Holiday::Christmas => 3,
            _ => 2,
        }
    }

    /// Calendar date of the holiday in `year`.
    pub fn date(&self, year: i32) -> Option<NaiveDate> {
        match self {
            Holiday::Thanksgiving => fourth_thursday_of_november(year),
            Holiday::Christmas => NaiveDate::from_ymd_opt(year, 12, 25),
            Holiday::Halloween => NaiveDate::from_ymd_opt(year, 10, 31),
            Holiday::Easter => easter_sunday(year),
            Holiday::July4th => NaiveDate::from_ymd_opt(year, 7, 4),
        }
    }
}

impl fmt::Display for Holiday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Holiday {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Holiday::ALL
            .into_iter()
            .find(|h| h.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownHoliday(s.to_string()))
    }
}

/// Thanksgiving (US): three weeks after the first Thursday of November.
fn fourth_thursday_of_november(year: i32) -> Option<NaiveDate> {
    let nov_1 = NaiveDate::from_ymd_opt(year, 11, 1)?;
    let thursday = Weekday::Thu.num_days_from_monday() as i64;
    let offset = (thursday - nov_1.weekday().num_days_from_monday() as i64).rem_euclid(7);
    Some(nov_1 + Duration::days(offset) + Duration::weeks(3))
}

/// Easter Sunday by the Anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Look up a holiday by name and compute its date.
pub fn get_holiday_date(holiday: &str, year: i32) -> Result<Option<NaiveDate>, ValidationError> {
    Ok(holiday.parse::<Holiday>()?.date(year))
}

/// Zero-filled purchase counts for January..December.
pub fn monthly_counts(events: &[PurchaseEvent]) -> [u32; 12] {
    let mut counts = [0u32; 12];
    for e in events {
        counts[e.event_date.month0() as usize] += 1;
    }
    counts
}

/// 0 (flat across the year) to 1 (concentrated in a few months).
///
/// Coefficient of variation of the monthly histogram, halved and capped.
pub fn seasonality_score(events: &[PurchaseEvent]) -> f64 {
    if events.len() < MIN_EVENTS_FOR_SEASONALITY {
        return 0.0;
    }
    histogram_seasonality(&monthly_counts(events))
}

/// Seasonality of an arbitrary 12-month histogram.
pub fn histogram_seasonality(counts: &[u32; 12]) -> f64 {
    let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let m = mean(&values).unwrap_or(0.0);
    if m == 0.0 {
        return 0.0;
    }
    let cv = sample_std_dev(&values) / m;
    (cv / 2.0).min(1.0)
}

/// Associate a product with at most one holiday.
///
/// A keyword in the description wins outright. Otherwise, with at least two
/// orders, the first holiday (in [`Holiday::ALL`] order) whose months hold
/// 80% of the orders is chosen.
pub fn detect_holiday_association(
    description: Option<&str>,
    events: &[PurchaseEvent],
) -> Option<Holiday> {
    if let Some(desc) = description {
        let desc = desc.to_lowercase();
        if let Some(h) = Holiday::ALL
            .into_iter()
            .find(|h| h.keywords().iter().any(|kw| desc.contains(kw)))
        {
            return Some(h);
        }
    }

    let orders: Vec<PurchaseEvent> = events
        .iter()
        .filter(|e| e.event_type == EventType::OrderPlaced)
        .cloned()
        .collect();
    if orders.len() < 2 {
        return None;
    }

    let counts = monthly_counts(&orders);
    let total: u32 = counts.iter().sum();
    Holiday::ALL.into_iter().find(|h| {
        let in_season: u32 = h.months().iter().map(|&m| counts[(m - 1) as usize]).sum();
        in_season as f64 / total as f64 >= HOLIDAY_MONTH_SHARE
    })
}

/// Purchase profile of one product in one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonalPattern {
    pub product_id: String,
    /// 1-12.
    pub month: u32,
    pub purchase_count: u32,
    pub avg_quantity: f64,
    /// Count above mean + one standard deviation of the zero-filled year.
    pub is_peak_period: bool,
    /// Set on peak months only.
    pub holiday_association: Option<Holiday>,
}

/// Build the twelve monthly rows for a product from its order events.
pub fn monthly_patterns(
    product_id: &str,
    events: &[PurchaseEvent],
    holiday: Option<Holiday>,
) -> Vec<SeasonalPattern> {
    let mut counts = [0u32; 12];
    let mut quantities = [0u64; 12];
    for e in events.iter().filter(|e| e.event_type == EventType::OrderPlaced) {
        let idx = e.event_date.month0() as usize;
        counts[idx] += 1;
        quantities[idx] += e.quantity as u64;
    }

    let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let peak_cutoff = mean(&values).unwrap_or(0.0) + sample_std_dev(&values);

    (0..12)
        .map(|idx| {
            let count = counts[idx];
            let is_peak = count as f64 > peak_cutoff;
            SeasonalPattern {
                product_id: product_id.to_string(),
                month: idx as u32 + 1,
                purchase_count: count,
                avg_quantity: if count > 0 {
                    quantities[idx] as f64 / count as f64
                } else {
                    0.0
                },
                is_peak_period: is_peak,
                holiday_association: if is_peak { holiday } else { None },
            }
        })
        .collect()
}

/// A holiday whose shopping window falls inside the lookahead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpcomingHoliday {
    pub holiday: Holiday,
    pub holiday_date: NaiveDate,
    pub shop_by_date: NaiveDate,
    pub days_until_shopping: i64,
    pub days_until_holiday: i64,
    pub urgency: UrgencyLabel,
    pub keywords: Vec<String>,
}

/// Urgency of a shopping deadline `days` away.
pub fn shopping_urgency(days: i64) -> UrgencyLabel {
    if days <= 0 {
        UrgencyLabel::Critical
    } else if days <= 2 {
        UrgencyLabel::High
    } else if days <= 5 {
        UrgencyLabel::Medium
    } else {
        UrgencyLabel::Low
    }
}

/// Holidays whose shop-by date is between today and `days_ahead` days out.
pub fn upcoming_holidays(today: NaiveDate, days_ahead: i64) -> Vec<UpcomingHoliday> {
    let days_ahead = days_ahead.min(MAX_LOOKAHEAD_DAYS);
    let mut out = Vec::new();
    for holiday in Holiday::ALL {
        for year in [today.year(), today.year() + 1] {
            let Some(holiday_date) = holiday.date(year) else {
                continue;
            };
            let shop_by_date = holiday_date - Duration::days(holiday.lead_days());
            let days_until_shopping = (shop_by_date - today).num_days();
            if (0..=days_ahead).contains(&days_until_shopping) {
                out.push(UpcomingHoliday {
                    holiday,
                    holiday_date,
                    shop_by_date,
                    days_until_shopping,
                    days_until_holiday: (holiday_date - today).num_days(),
                    urgency: shopping_urgency(days_until_shopping),
                    keywords: holiday.keywords().iter().map(|k| k.to_string()).collect(),
                });
            }
        }
    }
    out.sort_by_key(|h| h.days_until_shopping);
    out
}
