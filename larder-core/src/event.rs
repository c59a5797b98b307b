//! Purchase ledger records.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    #[serde(rename = "cart_add")]
    CartAdd,
    #[serde(rename = "order_placed")]
    OrderPlaced,
    #[serde(rename = "pantry_depleted")]
    PantryDepleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CartAdd => "cart_add",
            EventType::OrderPlaced => "order_placed",
            EventType::PantryDepleted => "pantry_depleted",
        }
    }

    /// Orders and observed depletions count towards consumption; cart adds do not.
    pub fn is_consumption(&self) -> bool {
        matches!(self, EventType::OrderPlaced | EventType::PantryDepleted)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cart_add" => Ok(EventType::CartAdd),
            "order_placed" => Ok(EventType::OrderPlaced),
            "pantry_depleted" => Ok(EventType::PantryDepleted),
            other => Err(ValidationError::UnknownEventType(other.to_string())),
        }
    }
}

/// One immutable entry in the purchase ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseEvent {
    pub product_id: String,
    /// Always at least 1.
    pub quantity: u32,
    pub event_type: EventType,
    /// PICKUP or DELIVERY for retailer events.
    pub modality: Option<String>,
    pub event_date: NaiveDate,
    pub event_timestamp: NaiveDateTime,
    /// Back-reference to the order row for `order_placed` events.
    pub order_id: Option<i64>,
}

impl PurchaseEvent {
    /// Create an event dated from its timestamp.
    pub fn new(
        product_id: impl Into<String>,
        quantity: u32,
        event_type: EventType,
        event_timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            quantity: quantity.max(1),
            event_type,
            modality: None,
            event_date: event_timestamp.date(),
            event_timestamp,
            order_id: None,
        }
    }

    /// Convenience for date-only records (timestamp at midnight).
    pub fn on_date(
        product_id: impl Into<String>,
        quantity: u32,
        event_type: EventType,
        date: NaiveDate,
    ) -> Self {
        Self::new(product_id, quantity, event_type, date.and_time(chrono::NaiveTime::MIN))
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn is_consumption(&self) -> bool {
        self.event_type.is_consumption()
    }
}

/// Validate a caller-supplied quantity.
pub fn checked_quantity(quantity: i64) -> Result<u32, ValidationError> {
    if quantity < 1 || quantity > u32::MAX as i64 {
        return Err(ValidationError::InvalidQuantity(quantity));
    }
    Ok(quantity as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip_names() {
        for t in [EventType::CartAdd, EventType::OrderPlaced, EventType::PantryDepleted] {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
        assert!(matches!(
            "refund".parse::<EventType>(),
            Err(ValidationError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_cart_add_is_not_consumption() {
        assert!(!EventType::CartAdd.is_consumption());
        assert!(EventType::OrderPlaced.is_consumption());
        assert!(EventType::PantryDepleted.is_consumption());
    }

    #[test]
    fn test_on_date_sets_midnight_timestamp() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let e = PurchaseEvent::on_date("milk", 2, EventType::OrderPlaced, d).with_order(7);
        assert_eq!(e.event_date, d);
        assert_eq!(e.event_timestamp.date(), d);
        assert_eq!(e.order_id, Some(7));
    }

    #[test]
    fn test_checked_quantity() {
        assert_eq!(checked_quantity(3), Ok(3));
        assert_eq!(checked_quantity(0), Err(ValidationError::InvalidQuantity(0)));
    }
}
