//! Aggregation engine
//!
//! Pure functions from a (possibly filtered) slice of canonical records to
//! freshly computed tables.
//!
//! Counting conventions, held for every table:
//! - `shipments` counts distinct Bill of Lading values; `containers` counts rows.
//! - Delay moments and transit means are taken over rows (container legs)
//!   with a known value. Rows without an arrival delay still count as
//!   containers and their Bill of Lading still counts as a shipment.
//! - On-time / late / severe-late rates are taken over shipments with at least
//!   one known delay. A shipment's delay is the worst known arrival delay
//!   among its containers in the group. A group with no known delay reports
//!   zero delay and zero rates; `measured_containers` tells the cases apart.
//! - Rates leave this module as percentages rounded to one decimal; delays
//!   and transit times are rounded to two decimals.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::models::{DelayCategory, ShipmentRecord, SEVERE_DELAY_DAYS};
use crate::stats::{fraction, mean, median, round_to, sample_std, to_percent};

// ============================================================================
// Data Structures
// ============================================================================

/// Overall KPIs for a dataset
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Kpis {
    pub total_shipments: usize,
    pub total_containers: usize,
    /// Containers with a known arrival delay
    pub measured_containers: usize,
    pub total_carriers: usize,
    pub total_routes: usize,
    pub avg_delay: f64,
    pub median_delay: f64,
    pub std_delay: f64,
    pub on_time_rate: f64,
    pub late_rate: f64,
    pub severe_late_rate: f64,
    pub avg_transit_time: Option<f64>,
    pub total_rolls: u64,
    /// Percentage of containers rolled at least once
    pub roll_rate: f64,
}

/// Statistical battery shared by carrier, route and monthly rows
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceStats {
    pub shipments: usize,
    pub containers: usize,
    pub measured_containers: usize,
    pub avg_delay: f64,
    pub median_delay: f64,
    /// 0 for single-container groups
    pub std_delay: f64,
    pub avg_transit: Option<f64>,
    pub on_time_rate: f64,
    pub late_rate: f64,
    pub severe_late_rate: f64,
    pub total_rolls: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CarrierStats {
    pub carrier_name: String,
    #[serde(flatten)]
    pub stats: PerformanceStats,
    /// This carrier's share of all carrier shipments, in percent
    pub market_share: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteStats {
    pub route: String,
    #[serde(flatten)]
    pub stats: PerformanceStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyStats {
    pub month_year: String,
    #[serde(flatten)]
    pub stats: PerformanceStats,
}

/// Volume and punctuality for an origin or destination country
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountryStats {
    pub country: String,
    pub shipments: usize,
    pub avg_delay: f64,
    pub late_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DelayBucket {
    pub category: DelayCategory,
    pub containers: usize,
    /// Share of containers in this bucket, in percent
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CarrierDelayDistribution {
    pub carrier_name: String,
    pub buckets: Vec<DelayBucket>,
}

/// Delay category counts for one month bucket
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyDelayDistribution {
    pub month_year: String,
    pub buckets: Vec<DelayBucket>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CarrierMonth {
    pub month_year: String,
    pub carrier_name: String,
    pub shipments: usize,
    pub avg_delay: f64,
}

/// Volume and delay for a calendar month (1-12) or quarter (1-4)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeasonalStats {
    pub period: u32,
    pub label: String,
    pub shipments: usize,
    pub avg_delay: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendOverview {
    /// Shipment growth of the recent window over the prior one, in percent
    pub growth_pct: f64,
    pub shipment_change: i64,
    pub recent_avg_delay: f64,
    pub delay_change: f64,
    pub peak_month: String,
    pub peak_shipments: usize,
    pub best_month: String,
    pub best_avg_delay: f64,
}

// ============================================================================
// Group Metrics
// ============================================================================

/// Unrounded metrics for one group, rates as fractions in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GroupMetrics {
    pub shipments: usize,
    pub containers: usize,
    pub measured_containers: usize,
    pub mean_delay: f64,
    pub median_delay: f64,
    pub std_delay: f64,
    pub mean_transit: Option<f64>,
    pub on_time_fraction: f64,
    pub late_fraction: f64,
    pub severe_fraction: f64,
    pub total_rolls: u64,
    pub mean_rolls: f64,
}

impl GroupMetrics {
    /// Compute metrics for a non-empty group; `None` when `rows` is empty.
    pub(crate) fn compute(rows: &[&ShipmentRecord]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let delays: Vec<f64> = rows.iter().filter_map(|r| r.arrival_delay).collect();
        let mean_delay = mean(&delays).unwrap_or(0.0);

        let transit: Vec<f64> = rows.iter().filter_map(|r| r.transit_days).collect();
        let rolls: Vec<f64> = rows.iter().map(|r| r.roll_count as f64).collect();

        let worst = worst_delay_per_shipment(rows);
        let measured: Vec<f64> = worst.values().flatten().copied().collect();

        Some(Self {
            shipments: worst.len(),
            containers: rows.len(),
            measured_containers: delays.len(),
            mean_delay,
            median_delay: median(&delays).unwrap_or(mean_delay),
            std_delay: sample_std(&delays).unwrap_or(0.0),
            mean_transit: mean(&transit),
            on_time_fraction: fraction(&measured, |d| *d <= 0.0),
            late_fraction: fraction(&measured, |d| *d > 0.0),
            severe_fraction: fraction(&measured, |d| *d > SEVERE_DELAY_DAYS),
            total_rolls: rows.iter().map(|r| r.roll_count as u64).sum(),
            mean_rolls: mean(&rolls).unwrap_or(0.0),
        })
    }

    pub(crate) fn to_stats(&self) -> PerformanceStats {
        PerformanceStats {
            shipments: self.shipments,
            containers: self.containers,
            measured_containers: self.measured_containers,
            avg_delay: round_to(self.mean_delay, 2),
            median_delay: round_to(self.median_delay, 2),
            std_delay: round_to(self.std_delay, 2),
            avg_transit: self.mean_transit.map(|t| round_to(t, 2)),
            on_time_rate: to_percent(self.on_time_fraction),
            late_rate: to_percent(self.late_fraction),
            severe_late_rate: to_percent(self.severe_fraction),
            total_rolls: self.total_rolls,
        }
    }
}

/// Worst known arrival delay per Bill of Lading; `None` when no container of
/// the shipment has one. Rows without a Bill of Lading are not shipments.
fn worst_delay_per_shipment<'a>(rows: &[&'a ShipmentRecord]) -> BTreeMap<&'a str, Option<f64>> {
    let mut worst: BTreeMap<&'a str, Option<f64>> = BTreeMap::new();
    for &r in rows {
        let Some(bill_of_lading) = r.shipment_key() else {
            continue;
        };
        let entry = worst.entry(bill_of_lading).or_insert(None);
        *entry = match (*entry, r.arrival_delay) {
            (Some(current), Some(delay)) => Some(current.max(delay)),
            (current, delay) => current.or(delay),
        };
    }
    worst
}

/// Group rows by a key; rows whose key is `None` are left out.
pub(crate) fn group_by<'a, K, F>(records: &'a [ShipmentRecord], key: F) -> BTreeMap<K, Vec<&'a ShipmentRecord>>
where
    K: Ord,
    F: Fn(&'a ShipmentRecord) -> Option<K>,
{
    let mut groups: BTreeMap<K, Vec<&'a ShipmentRecord>> = BTreeMap::new();
    for r in records {
        if let Some(k) = key(r) {
            groups.entry(k).or_default().push(r);
        }
    }
    groups
}

fn distinct_shipments(records: &[ShipmentRecord]) -> usize {
    records
        .iter()
        .filter_map(ShipmentRecord::shipment_key)
        .collect::<BTreeSet<_>>()
        .len()
}

// ============================================================================
// Core Aggregations
// ============================================================================

/// Overall KPIs; `None` for an empty dataset.
pub fn calculate_kpis(records: &[ShipmentRecord]) -> Option<Kpis> {
    let rows: Vec<&ShipmentRecord> = records.iter().collect();
    let metrics = GroupMetrics::compute(&rows)?;
    let rolled = records.iter().filter(|r| r.roll_count > 0).count();

    Some(Kpis {
        total_shipments: distinct_shipments(records),
        total_containers: records.len(),
        measured_containers: metrics.measured_containers,
        total_carriers: records.iter().map(|r| r.carrier_name.as_str()).collect::<BTreeSet<_>>().len(),
        total_routes: records.iter().map(|r| r.route.as_str()).collect::<BTreeSet<_>>().len(),
        avg_delay: round_to(metrics.mean_delay, 2),
        median_delay: round_to(metrics.median_delay, 2),
        std_delay: round_to(metrics.std_delay, 2),
        on_time_rate: to_percent(metrics.on_time_fraction),
        late_rate: to_percent(metrics.late_fraction),
        severe_late_rate: to_percent(metrics.severe_fraction),
        avg_transit_time: metrics.mean_transit.map(|t| round_to(t, 2)),
        total_rolls: metrics.total_rolls,
        roll_rate: to_percent(rolled as f64 / records.len() as f64),
    })
}

/// Per-carrier stats, sorted by shipments descending (ties by name).
pub fn carrier_stats(records: &[ShipmentRecord]) -> Vec<CarrierStats> {
    let groups = group_by(records, |r| Some(r.carrier_name.as_str()));

    let rows: Vec<(String, PerformanceStats)> = groups
        .into_iter()
        .filter_map(|(name, rows)| Some((name.to_string(), GroupMetrics::compute(&rows)?.to_stats())))
        .collect();

    let total_shipments: usize = rows.iter().map(|(_, s)| s.shipments).sum();

    let mut stats: Vec<CarrierStats> = rows
        .into_iter()
        .map(|(carrier_name, stats)| {
            let market_share = if total_shipments > 0 {
                round_to(stats.shipments as f64 / total_shipments as f64 * 100.0, 1)
            } else {
                0.0
            };
            CarrierStats { carrier_name, stats, market_share }
        })
        .collect();

    stats.sort_by(|a, b| b.stats.shipments.cmp(&a.stats.shipments));
    debug!("Computed stats for {} carriers", stats.len());
    stats
}

/// Per-route stats, sorted by shipments descending (ties by route).
pub fn route_stats(records: &[ShipmentRecord]) -> Vec<RouteStats> {
    let mut stats: Vec<RouteStats> = group_by(records, |r| Some(r.route.as_str()))
        .into_iter()
        .filter_map(|(route, rows)| {
            Some(RouteStats {
                route: route.to_string(),
                stats: GroupMetrics::compute(&rows)?.to_stats(),
            })
        })
        .collect();

    stats.sort_by(|a, b| b.stats.shipments.cmp(&a.stats.shipments));
    stats
}

/// Per-month stats in chronological order.
///
/// Rows without a month bucket (null departure date) are excluded.
pub fn monthly_trends(records: &[ShipmentRecord]) -> Vec<MonthlyStats> {
    let mut months: Vec<MonthlyStats> = group_by(records, |r| r.month_year.as_deref())
        .into_iter()
        .filter_map(|(month, rows)| {
            Some(MonthlyStats {
                month_year: month.to_string(),
                stats: GroupMetrics::compute(&rows)?.to_stats(),
            })
        })
        .collect();

    sort_chronologically(&mut months, |m| m.month_year.as_str());
    months
}

/// Months averaged by [`shipment_moving_average`] in the trend view
pub const MOVING_AVERAGE_MONTHS: usize = 3;

/// Trailing mean of monthly shipments over `window` months, aligned with
/// `months`. The first months average over however many months exist so far.
pub fn shipment_moving_average(months: &[MonthlyStats], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let volumes: Vec<f64> = months.iter().map(|m| m.stats.shipments as f64).collect();
    (0..volumes.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            mean(&volumes[start..=i]).map_or(0.0, |v| round_to(v, 2))
        })
        .collect()
}

/// Parse a `YYYY-MM` bucket
pub fn parse_month(month_year: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", month_year.trim()), "%Y-%m-%d").ok()
}

/// Sort rows by their month bucket; unparseable buckets go last.
pub fn sort_chronologically<T>(rows: &mut [T], month: impl Fn(&T) -> &str) {
    rows.sort_by(|a, b| {
        let (ma, mb) = (month(a), month(b));
        let key_a = (parse_month(ma).is_none(), parse_month(ma));
        let key_b = (parse_month(mb).is_none(), parse_month(mb));
        key_a.cmp(&key_b).then_with(|| ma.cmp(mb))
    });
}

// ============================================================================
// Breakdowns
// ============================================================================

fn country_stats<'a>(
    records: &'a [ShipmentRecord],
    country: impl Fn(&'a ShipmentRecord) -> &'a str,
) -> Vec<CountryStats> {
    let mut stats: Vec<CountryStats> = group_by(records, |r| Some(country(r)))
        .into_iter()
        .filter_map(|(name, rows)| {
            let m = GroupMetrics::compute(&rows)?;
            Some(CountryStats {
                country: name.to_string(),
                shipments: m.shipments,
                avg_delay: round_to(m.mean_delay, 2),
                late_rate: to_percent(m.late_fraction),
            })
        })
        .collect();

    stats.sort_by(|a, b| b.shipments.cmp(&a.shipments));
    stats
}

/// Volume and punctuality per origin country
pub fn origin_country_stats(records: &[ShipmentRecord]) -> Vec<CountryStats> {
    country_stats(records, |r| r.origin_country.as_str())
}

/// Volume and punctuality per destination country
pub fn destination_country_stats(records: &[ShipmentRecord]) -> Vec<CountryStats> {
    country_stats(records, |r| r.destination_country.as_str())
}

/// Category counts over the rows with a known delay
fn buckets_for(rows: &[&ShipmentRecord]) -> Vec<DelayBucket> {
    let measured = rows.iter().filter(|r| r.delay_category.is_some()).count();
    DelayCategory::ALL
        .iter()
        .map(|category| {
            let containers = rows.iter().filter(|r| r.delay_category == Some(*category)).count();
            let share = if measured == 0 {
                0.0
            } else {
                to_percent(containers as f64 / measured as f64)
            };
            DelayBucket { category: *category, containers, share }
        })
        .collect()
}

/// Container counts per delay category, all categories in bin order
pub fn delay_distribution(records: &[ShipmentRecord]) -> Vec<DelayBucket> {
    let rows: Vec<&ShipmentRecord> = records.iter().collect();
    buckets_for(&rows)
}

/// Delay category distribution per carrier, carriers by name
pub fn carrier_delay_distribution(records: &[ShipmentRecord]) -> Vec<CarrierDelayDistribution> {
    group_by(records, |r| Some(r.carrier_name.as_str()))
        .into_iter()
        .map(|(name, rows)| CarrierDelayDistribution {
            carrier_name: name.to_string(),
            buckets: buckets_for(&rows),
        })
        .collect()
}

/// Delay category counts per month bucket, chronological
pub fn monthly_delay_distribution(records: &[ShipmentRecord]) -> Vec<MonthlyDelayDistribution> {
    let mut months: Vec<MonthlyDelayDistribution> = group_by(records, |r| r.month_year.as_deref())
        .into_iter()
        .map(|(month, rows)| MonthlyDelayDistribution {
            month_year: month.to_string(),
            buckets: buckets_for(&rows),
        })
        .collect();

    sort_chronologically(&mut months, |m| m.month_year.as_str());
    months
}

/// Shipments and mean delay per (month, carrier), chronological then by carrier
pub fn carrier_monthly_trends(records: &[ShipmentRecord]) -> Vec<CarrierMonth> {
    let groups = group_by(records, |r| {
        r.month_year
            .as_deref()
            .map(|m| (m, r.carrier_name.as_str()))
    });

    let mut rows: Vec<CarrierMonth> = groups
        .into_iter()
        .filter_map(|((month, carrier), rows)| {
            let m = GroupMetrics::compute(&rows)?;
            Some(CarrierMonth {
                month_year: month.to_string(),
                carrier_name: carrier.to_string(),
                shipments: m.shipments,
                avg_delay: round_to(m.mean_delay, 2),
            })
        })
        .collect();

    // stable: carriers stay alphabetical within a month
    sort_chronologically(&mut rows, |r| r.month_year.as_str());
    rows
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn seasonal(records: &[ShipmentRecord], period: impl Fn(u32) -> u32, label: impl Fn(u32) -> String) -> Vec<SeasonalStats> {
    group_by(records, |r| r.departure_date.map(|d| period(d.month())))
        .into_iter()
        .filter_map(|(p, rows)| {
            let m = GroupMetrics::compute(&rows)?;
            Some(SeasonalStats {
                period: p,
                label: label(p),
                shipments: m.shipments,
                avg_delay: round_to(m.mean_delay, 2),
            })
        })
        .collect()
}

/// Shipments and mean delay per calendar month of departure (1-12)
pub fn seasonality_by_month(records: &[ShipmentRecord]) -> Vec<SeasonalStats> {
    seasonal(records, |m| m, |m| MONTH_NAMES[(m - 1) as usize].to_string())
}

/// Shipments and mean delay per quarter of departure (1-4)
pub fn seasonality_by_quarter(records: &[ShipmentRecord]) -> Vec<SeasonalStats> {
    seasonal(records, |m| (m - 1) / 3 + 1, |q| format!("Q{}", q))
}

/// Headline trend figures from chronologically ordered monthly stats.
///
/// With twelve or more months the last six are compared with the six before;
/// otherwise the second half is compared with the first. Delay compares the
/// last three months with the three before (halves below six months).
pub fn trend_overview(months: &[MonthlyStats]) -> Option<TrendOverview> {
    let n = months.len();
    if n == 0 {
        return None;
    }

    let half = (n / 2).max(1);
    let (recent, prior) = if n >= 12 {
        (&months[n - 6..], &months[n - 12..n - 6])
    } else {
        (&months[n - half..], &months[..half])
    };
    let recent_volume: usize = recent.iter().map(|m| m.stats.shipments).sum();
    let prior_volume: usize = prior.iter().map(|m| m.stats.shipments).sum();
    let growth_pct = if prior_volume > 0 {
        (recent_volume as f64 - prior_volume as f64) / prior_volume as f64 * 100.0
    } else {
        0.0
    };

    let (recent_delay, prior_delay) = if n >= 6 {
        (&months[n - 3..], &months[n - 6..n - 3])
    } else {
        (&months[n - half..], &months[..half])
    };
    let avg = |ms: &[MonthlyStats]| {
        let delays: Vec<f64> = ms.iter().map(|m| m.stats.avg_delay).collect();
        mean(&delays).unwrap_or(0.0)
    };
    let recent_avg_delay = avg(recent_delay);

    let mut peak = &months[0];
    let mut best = &months[0];
    for m in months {
        if m.stats.shipments > peak.stats.shipments {
            peak = m;
        }
        if m.stats.avg_delay < best.stats.avg_delay {
            best = m;
        }
    }

    Some(TrendOverview {
        growth_pct: round_to(growth_pct, 1),
        shipment_change: recent_volume as i64 - prior_volume as i64,
        recent_avg_delay: round_to(recent_avg_delay, 2),
        delay_change: round_to(recent_avg_delay - avg(prior_delay), 2),
        peak_month: peak.month_year.clone(),
        peak_shipments: peak.stats.shipments,
        best_month: best.month_year.clone(),
        best_avg_delay: best.stats.avg_delay,
    })
}
