//! Dataset filtering
//!
//! Filters produce an owned copy of the matching rows. The source dataset is
//! never mutated, so the same load can serve any number of filtered views.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::ShipmentRecord;

/// Row selection for a dashboard view; empty sets mean "no restriction"
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetFilter {
    /// Inclusive departure date range
    pub departure_range: Option<(NaiveDate, NaiveDate)>,
    pub carriers: BTreeSet<String>,
    pub origin_countries: BTreeSet<String>,
}

impl DatasetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_departure_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.departure_range = Some((start, end));
        self
    }

    pub fn with_carriers<I, S>(mut self, carriers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.carriers = carriers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_origin_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origin_countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.departure_range.is_none() && self.carriers.is_empty() && self.origin_countries.is_empty()
    }

    /// Whether a single row passes every active restriction.
    ///
    /// Rows without a departure date fail any date restriction.
    pub fn matches(&self, record: &ShipmentRecord) -> bool {
        if let Some((start, end)) = self.departure_range {
            match record.departure_date {
                Some(dt) if dt.date() >= start && dt.date() <= end => {}
                _ => return false,
            }
        }
        if !self.carriers.is_empty() && !self.carriers.contains(&record.carrier_name) {
            return false;
        }
        if !self.origin_countries.is_empty() && !self.origin_countries.contains(&record.origin_country) {
            return false;
        }
        true
    }

    /// Owned copy of the matching rows, in source order
    pub fn apply(&self, records: &[ShipmentRecord]) -> Vec<ShipmentRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Earliest and latest departure date in the dataset, for default ranges
pub fn date_bounds(records: &[ShipmentRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = records.iter().filter_map(|r| r.departure_date.map(|d| d.date()));
    dates.fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset() -> Vec<ShipmentRecord> {
        let at = |d: NaiveDate| d.and_hms_opt(12, 0, 0).unwrap();
        vec![
            ShipmentRecord::new("1", "MSC", "China", "Italy", 1.0).with_departure(at(day(2024, 1, 10))),
            ShipmentRecord::new("2", "CMA", "China", "Spain", 2.0).with_departure(at(day(2024, 2, 1))),
            ShipmentRecord::new("3", "MSC", "India", "Oman", 3.0).with_departure(at(day(2024, 3, 31))),
            ShipmentRecord::new("4", "ONE", "Japan", "Italy", 4.0),
        ]
    }

    #[test]
    fn test_unrestricted_keeps_everything() {
        let filter = DatasetFilter::new();
        assert!(filter.is_unrestricted());
        assert_eq!(filter.apply(&dataset()).len(), 4);
    }

    #[test]
    fn test_date_range_is_inclusive_and_drops_null_dates() {
        let filter = DatasetFilter::new().with_departure_range(day(2024, 2, 1), day(2024, 3, 31));
        let bls: Vec<String> = filter.apply(&dataset()).into_iter().filter_map(|r| r.bill_of_lading).collect();
        assert_eq!(bls, vec!["2", "3"]);
    }

    #[test]
    fn test_carrier_and_origin_sets() {
        let filter = DatasetFilter::new().with_carriers(["MSC"]).with_origin_countries(["China"]);
        assert!(!filter.is_unrestricted());
        let rows = filter.apply(&dataset());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].shipment_key(), Some("1"));
    }

    #[test]
    fn test_date_bounds() {
        assert_eq!(date_bounds(&dataset()), Some((day(2024, 1, 10), day(2024, 3, 31))));
        assert_eq!(date_bounds(&[]), None);
    }
}
