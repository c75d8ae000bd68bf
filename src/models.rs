use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::location_names::format_route;

/// Arrival delay above which a shipment counts as severely late (days)
pub const SEVERE_DELAY_DAYS: f64 = 7.0;

/// Delay bucket with right-closed bins at 0, 3 and 7 days
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DelayCategory {
    #[serde(rename = "On Time/Early")]
    OnTimeOrEarly,
    #[serde(rename = "1-3 Days Late")]
    OneToThreeDays,
    #[serde(rename = "4-7 Days Late")]
    FourToSevenDays,
    #[serde(rename = "7+ Days Late")]
    OverSevenDays,
}

impl DelayCategory {
    /// All categories in bin order
    pub const ALL: [DelayCategory; 4] = [
        DelayCategory::OnTimeOrEarly,
        DelayCategory::OneToThreeDays,
        DelayCategory::FourToSevenDays,
        DelayCategory::OverSevenDays,
    ];

    pub fn from_delay(delay: f64) -> Self {
        if delay <= 0.0 {
            DelayCategory::OnTimeOrEarly
        } else if delay <= 3.0 {
            DelayCategory::OneToThreeDays
        } else if delay <= SEVERE_DELAY_DAYS {
            DelayCategory::FourToSevenDays
        } else {
            DelayCategory::OverSevenDays
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DelayCategory::OnTimeOrEarly => "On Time/Early",
            DelayCategory::OneToThreeDays => "1-3 Days Late",
            DelayCategory::FourToSevenDays => "4-7 Days Late",
            DelayCategory::OverSevenDays => "7+ Days Late",
        }
    }
}

/// Shipment completion status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShipmentStatus {
    Completed,
    #[serde(rename = "In Transit")]
    InTransit,
    Unknown,
}

impl From<&str> for ShipmentStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "true" | "yes" | "1" | "1.0" => ShipmentStatus::Completed,
            "in transit" | "false" | "no" | "0" | "0.0" => ShipmentStatus::InTransit,
            _ => ShipmentStatus::Unknown,
        }
    }
}

/// Canonical shipment record: one row per container leg.
///
/// Derived fields (`route`, `month_year`, `is_late`, `is_severely_late`,
/// `delay_category`) are computed once when the record is built. A row with
/// no known arrival delay (still in transit, or a blank cell) is neither late
/// nor on time and has no delay category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentRecord {
    /// Shipment grouping key; several containers may share it
    pub bill_of_lading: Option<String>,
    pub container_number: Option<String>,
    pub shipment_id: Option<String>,
    pub carrier_name: String,
    pub origin_country_code: Option<String>,
    pub origin_country: String,
    pub pol_code: Option<String>,
    pub pol_city: String,
    pub pod_code: Option<String>,
    pub pod_city: String,
    pub destination_country: String,
    pub departure_date: Option<NaiveDateTime>,
    pub arrival_date: Option<NaiveDateTime>,
    pub transit_days: Option<f64>,
    pub departure_delay: Option<f64>,
    /// Signed arrival delay in days (negative = early)
    pub arrival_delay: Option<f64>,
    /// Re-handling incidents at the port of loading; missing counts as 0
    pub roll_count: u32,
    pub status: ShipmentStatus,

    pub route: String,
    pub month_year: Option<String>,
    pub is_late: bool,
    pub is_severely_late: bool,
    pub delay_category: Option<DelayCategory>,
}

impl ShipmentRecord {
    /// Build a record with the mandatory fields; everything else starts empty.
    pub fn new(
        bill_of_lading: impl Into<String>,
        carrier_name: impl Into<String>,
        origin_country: impl Into<String>,
        destination_country: impl Into<String>,
        arrival_delay: impl Into<Option<f64>>,
    ) -> Self {
        let origin_country = origin_country.into();
        let destination_country = destination_country.into();
        Self {
            bill_of_lading: Some(bill_of_lading.into()),
            container_number: None,
            shipment_id: None,
            carrier_name: carrier_name.into(),
            origin_country_code: None,
            route: format_route(&origin_country, &destination_country),
            origin_country,
            pol_code: None,
            pol_city: crate::country_names::UNKNOWN.to_string(),
            pod_code: None,
            pod_city: crate::country_names::UNKNOWN.to_string(),
            destination_country,
            departure_date: None,
            arrival_date: None,
            transit_days: None,
            departure_delay: None,
            arrival_delay: None,
            roll_count: 0,
            status: ShipmentStatus::Unknown,
            month_year: None,
            is_late: false,
            is_severely_late: false,
            delay_category: None,
        }
        .with_arrival_delay(arrival_delay)
    }

    /// Set the arrival delay and the flags derived from it
    pub fn with_arrival_delay(mut self, delay: impl Into<Option<f64>>) -> Self {
        let delay = delay.into();
        self.arrival_delay = delay;
        self.is_late = delay.is_some_and(|d| d > 0.0);
        self.is_severely_late = delay.is_some_and(|d| d > SEVERE_DELAY_DAYS);
        self.delay_category = delay.map(DelayCategory::from_delay);
        self
    }

    pub fn without_bill_of_lading(mut self) -> Self {
        self.bill_of_lading = None;
        self
    }

    pub fn with_container(mut self, container_number: impl Into<String>) -> Self {
        self.container_number = Some(container_number.into());
        self
    }

    /// Set the departure date and its month bucket
    pub fn with_departure(mut self, departure: NaiveDateTime) -> Self {
        self.month_year = Some(month_bucket(&departure));
        self.departure_date = Some(departure);
        self
    }

    pub fn with_transit_days(mut self, days: f64) -> Self {
        self.transit_days = Some(days);
        self
    }

    pub fn with_roll_count(mut self, rolls: u32) -> Self {
        self.roll_count = rolls;
        self
    }

    /// On time means arriving no later than scheduled
    pub fn is_on_time(&self) -> bool {
        self.arrival_delay.is_some_and(|d| d <= 0.0)
    }

    pub fn shipment_key(&self) -> Option<&str> {
        self.bill_of_lading.as_deref()
    }
}

/// Month bucket label for a departure timestamp (e.g., "2024-03")
pub fn month_bucket(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_delay_category_bin_edges() {
        assert_eq!(DelayCategory::from_delay(-3.0), DelayCategory::OnTimeOrEarly);
        assert_eq!(DelayCategory::from_delay(0.0), DelayCategory::OnTimeOrEarly);
        assert_eq!(DelayCategory::from_delay(0.5), DelayCategory::OneToThreeDays);
        assert_eq!(DelayCategory::from_delay(3.0), DelayCategory::OneToThreeDays);
        assert_eq!(DelayCategory::from_delay(3.01), DelayCategory::FourToSevenDays);
        assert_eq!(DelayCategory::from_delay(7.0), DelayCategory::FourToSevenDays);
        assert_eq!(DelayCategory::from_delay(7.5), DelayCategory::OverSevenDays);
    }

    #[test]
    fn test_derived_flags() {
        let early = ShipmentRecord::new("BL1", "Maersk", "China", "Germany", -1.0);
        assert!(!early.is_late);
        assert!(early.is_on_time());
        assert_eq!(early.route, "China → Germany");

        let severe = ShipmentRecord::new("BL2", "Maersk", "China", "Germany", 8.0);
        assert!(severe.is_late);
        assert!(severe.is_severely_late);

        let seven = ShipmentRecord::new("BL3", "Maersk", "China", "Germany", 7.0);
        assert!(!seven.is_severely_late);
        assert_eq!(seven.delay_category, Some(DelayCategory::FourToSevenDays));
    }

    #[test]
    fn test_unknown_delay_is_neither_late_nor_on_time() {
        let pending = ShipmentRecord::new("BL4", "Maersk", "China", "Germany", None::<f64>);
        assert!(!pending.is_late);
        assert!(!pending.is_severely_late);
        assert!(!pending.is_on_time());
        assert_eq!(pending.delay_category, None);
        assert_eq!(pending.shipment_key(), Some("BL4"));

        let arrived = pending.with_arrival_delay(9.0);
        assert!(arrived.is_severely_late);
        assert_eq!(arrived.delay_category, Some(DelayCategory::OverSevenDays));
    }

    #[test]
    fn test_month_bucket() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let rec = ShipmentRecord::new("BL1", "MSC", "Italy", "Chile", 0.0).with_departure(dt);
        assert_eq!(rec.month_year.as_deref(), Some("2024-03"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(ShipmentStatus::from("TRUE"), ShipmentStatus::Completed);
        assert_eq!(ShipmentStatus::from("no"), ShipmentStatus::InTransit);
        assert_eq!(ShipmentStatus::from("In Transit"), ShipmentStatus::InTransit);
        assert_eq!(ShipmentStatus::from("maybe"), ShipmentStatus::Unknown);
    }

    #[test]
    fn test_category_labels_serialize() {
        let json = serde_json::to_string(&DelayCategory::OverSevenDays).unwrap();
        assert_eq!(json, "\"7+ Days Late\"");
    }
}
