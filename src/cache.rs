//! Memoized derived tables
//!
//! Optional layer over the aggregation engine. Cached tables are shared as
//! `Arc`s and always equal a fresh recomputation for the same source and
//! filter.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::aggregate::{calculate_kpis, carrier_stats, monthly_trends, route_stats};
use crate::aggregate::{CarrierStats, Kpis, MonthlyStats, RouteStats};
use crate::filter::DatasetFilter;
use crate::models::ShipmentRecord;

/// The tables a dashboard overview needs for one filtered view
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DerivedTables {
    pub kpis: Option<Kpis>,
    pub carriers: Vec<CarrierStats>,
    pub routes: Vec<RouteStats>,
    pub monthly: Vec<MonthlyStats>,
}

impl DerivedTables {
    pub fn compute(records: &[ShipmentRecord]) -> Self {
        Self {
            kpis: calculate_kpis(records),
            carriers: carrier_stats(records),
            routes: route_stats(records),
            monthly: monthly_trends(records),
        }
    }
}

type CacheKey = (String, DatasetFilter);

/// Cache keyed by source identifier (e.g. file path) and filter
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    entries: RwLock<HashMap<CacheKey, Arc<DerivedTables>>>,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tables for `(source, filter)`, computing them from `records` on a miss.
    ///
    /// `records` must be the unfiltered dataset loaded from `source`.
    pub fn get_or_compute(&self, source: &str, filter: &DatasetFilter, records: &[ShipmentRecord]) -> Arc<DerivedTables> {
        let key = (source.to_string(), filter.clone());

        // Check cache first
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(tables) = entries.get(&key) {
                debug!("Cache hit for {}", source);
                return Arc::clone(tables);
            }
        }

        debug!("Cache miss for {}, computing tables", source);
        let tables = if filter.is_unrestricted() {
            DerivedTables::compute(records)
        } else {
            DerivedTables::compute(&filter.apply(records))
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // another caller may have filled the slot meanwhile; keep the first
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(tables)))
    }

    /// Drop every entry computed from `source`
    pub fn invalidate_source(&self, source: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(s, _), _| s != source);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Vec<ShipmentRecord> {
        vec![
            ShipmentRecord::new("1", "MSC", "China", "Italy", 1.0),
            ShipmentRecord::new("1", "MSC", "China", "Italy", 3.0),
            ShipmentRecord::new("2", "CMA", "India", "Oman", -2.0),
        ]
    }

    #[test]
    fn test_cached_equals_recomputed() {
        let cache = AnalyticsCache::new();
        let data = dataset();
        let filter = DatasetFilter::new();

        let first = cache.get_or_compute("a.csv", &filter, &data);
        let second = cache.get_or_compute("a.csv", &filter, &data);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, DerivedTables::compute(&data));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_filters_are_separate_entries() {
        let cache = AnalyticsCache::new();
        let data = dataset();
        let msc = DatasetFilter::new().with_carriers(["MSC"]);

        let all = cache.get_or_compute("a.csv", &DatasetFilter::new(), &data);
        let only_msc = cache.get_or_compute("a.csv", &msc, &data);
        assert_eq!(cache.len(), 2);
        assert_eq!(all.carriers.len(), 2);
        assert_eq!(only_msc.carriers.len(), 1);
        assert_eq!(*only_msc, DerivedTables::compute(&msc.apply(&data)));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = AnalyticsCache::new();
        let data = dataset();
        cache.get_or_compute("a.csv", &DatasetFilter::new(), &data);
        cache.get_or_compute("b.csv", &DatasetFilter::new(), &data);

        cache.invalidate_source("a.csv");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(AnalyticsCache::new());
        let data = Arc::new(dataset());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let data = Arc::clone(&data);
                std::thread::spawn(move || cache.get_or_compute("a.csv", &DatasetFilter::new(), &data))
            })
            .collect();

        for h in handles {
            assert_eq!(*h.join().unwrap(), DerivedTables::compute(&data));
        }
        assert_eq!(cache.len(), 1);
    }
}
