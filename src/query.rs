//! Query helpers composed from the aggregation tables
//!
//! Every selection returns an empty vector when nothing qualifies; callers
//! render "no data" for that case.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::aggregate::{carrier_stats, route_stats, CarrierStats, RouteStats};
use crate::models::ShipmentRecord;
use crate::risk::{risk_score, RiskBand, RiskInput};
use crate::stats::{fraction, mean, round_to, to_percent};

// ============================================================================
// Selections
// ============================================================================

/// Route row with its composite risk score attached
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredRoute {
    #[serde(flatten)]
    pub route: RouteStats,
    pub risk_score: u8,
}

impl ScoredRoute {
    pub fn band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }
}

/// Routes whose mean delay is at or above `threshold_delay`, highest risk first.
///
/// Equal scores keep the route table's order (shipments descending).
pub fn high_risk_routes(records: &[ShipmentRecord], threshold_delay: f64) -> Vec<ScoredRoute> {
    let mut routes: Vec<ScoredRoute> = route_stats(records)
        .into_iter()
        .filter(|r| r.stats.avg_delay >= threshold_delay)
        .map(|route| {
            let risk_score = risk_score(&RiskInput::from(&route));
            ScoredRoute { route, risk_score }
        })
        .collect();

    routes.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
    routes
}

/// Carriers with at least `min_volume` shipments, best on-time rate first
pub fn best_performers(records: &[ShipmentRecord], min_volume: usize) -> Vec<CarrierStats> {
    let mut carriers: Vec<CarrierStats> = carrier_stats(records)
        .into_iter()
        .filter(|c| c.stats.shipments >= min_volume)
        .collect();

    carriers.sort_by(|a, b| b.stats.on_time_rate.total_cmp(&a.stats.on_time_rate));
    carriers
}

/// Carriers with at least `min_volume` shipments, worst severe-late rate first
pub fn severe_delay_carriers(records: &[ShipmentRecord], min_volume: usize) -> Vec<CarrierStats> {
    let mut carriers: Vec<CarrierStats> = carrier_stats(records)
        .into_iter()
        .filter(|c| c.stats.shipments >= min_volume)
        .collect();

    carriers.sort_by(|a, b| b.stats.severe_late_rate.total_cmp(&a.stats.severe_late_rate));
    carriers
}

// ============================================================================
// Carrier x Route Matrix
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum MatrixMetric {
    /// Distinct shipments per cell
    ShipmentCount,
    /// Mean arrival delay per cell, one decimal
    MeanDelay,
    /// Percentage of on-time container rows per cell, one decimal
    OnTimeRate,
    /// Percentage of severely late container rows per cell, one decimal
    SevereLateRate,
}

impl FromStr for MatrixMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" | "shipments" => Ok(MatrixMetric::ShipmentCount),
            "delay" | "avg_delay" => Ok(MatrixMetric::MeanDelay),
            "on_time" | "on-time" | "ontime" => Ok(MatrixMetric::OnTimeRate),
            "severe" | "severe_late" | "severe-late" => Ok(MatrixMetric::SevereLateRate),
            other => Err(format!("unknown matrix metric: {}", other)),
        }
    }
}

/// Carrier-by-route table. `values[i][j]` is carrier `i` on route `j`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CarrierRouteMatrix {
    pub metric: MatrixMetric,
    pub carriers: Vec<String>,
    pub routes: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CarrierRouteMatrix {
    pub fn get(&self, carrier: &str, route: &str) -> Option<f64> {
        let i = self.carriers.iter().position(|c| c == carrier)?;
        let j = self.routes.iter().position(|r| r == route)?;
        self.values[i][j]
    }
}

/// Pivot the dataset into a carrier x route table under `metric`.
///
/// Empty cells hold `Some(0.0)` for counts and `None` for the delay and rate
/// metrics, so a missing lane never reads as perfect or zero performance.
/// Delay and rate cells only look at rows with a known arrival delay.
pub fn carrier_route_matrix(records: &[ShipmentRecord], metric: MatrixMetric) -> CarrierRouteMatrix {
    let carriers: Vec<String> = records
        .iter()
        .map(|r| r.carrier_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let routes: Vec<String> = records
        .iter()
        .map(|r| r.route.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cells: BTreeMap<(&str, &str), Vec<&ShipmentRecord>> = BTreeMap::new();
    for r in records {
        cells
            .entry((r.carrier_name.as_str(), r.route.as_str()))
            .or_default()
            .push(r);
    }

    let values = carriers
        .iter()
        .map(|carrier| {
            routes
                .iter()
                .map(|route| {
                    let rows = cells.get(&(carrier.as_str(), route.as_str()));
                    cell_value(rows.map(Vec::as_slice).unwrap_or(&[]), metric)
                })
                .collect()
        })
        .collect();

    CarrierRouteMatrix {
        metric,
        carriers,
        routes,
        values,
    }
}

fn cell_value(rows: &[&ShipmentRecord], metric: MatrixMetric) -> Option<f64> {
    match metric {
        MatrixMetric::ShipmentCount => {
            let shipments: BTreeSet<&str> = rows.iter().filter_map(|r| r.shipment_key()).collect();
            Some(shipments.len() as f64)
        }
        MatrixMetric::MeanDelay => {
            let delays: Vec<f64> = rows.iter().filter_map(|r| r.arrival_delay).collect();
            mean(&delays).map(|d| round_to(d, 1))
        }
        MatrixMetric::OnTimeRate => measured_share(rows, ShipmentRecord::is_on_time),
        MatrixMetric::SevereLateRate => measured_share(rows, |r| r.is_severely_late),
    }
}

/// Percentage of rows with a known delay that satisfy `pred`
fn measured_share(rows: &[&ShipmentRecord], pred: impl Fn(&ShipmentRecord) -> bool) -> Option<f64> {
    let measured: Vec<&ShipmentRecord> = rows.iter().copied().filter(|r| r.arrival_delay.is_some()).collect();
    if measured.is_empty() {
        return None;
    }
    Some(to_percent(fraction(&measured, |r| pred(*r))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(bl: &str, carrier: &str, origin: &str, dest: &str, delay: impl Into<Option<f64>>) -> ShipmentRecord {
        ShipmentRecord::new(bl, carrier, origin, dest, delay)
    }

    fn dataset() -> Vec<ShipmentRecord> {
        vec![
            rec("1", "MSC", "China", "Italy", 8.0),
            rec("2", "MSC", "China", "Italy", 12.0),
            rec("3", "MSC", "India", "Oman", -1.0),
            rec("4", "CMA", "China", "Italy", 6.0),
            rec("4", "CMA", "China", "Italy", 5.0),
            rec("5", "CMA", "Chile", "Spain", 1.0),
            rec("6", "CMA", "Chile", "Spain", 0.0),
        ]
    }

    #[test]
    fn test_high_risk_routes_threshold_and_order() {
        let routes = high_risk_routes(&dataset(), 5.0);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].route.route, "China → Italy");
        // mean 7.75 (40) + std 3.10 (15) + late 100% (30)
        assert_eq!(routes[0].risk_score, 85);
        assert_eq!(routes[0].band(), RiskBand::Critical);

        let all = high_risk_routes(&dataset(), f64::NEG_INFINITY);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].risk_score >= w[1].risk_score));
    }

    #[test]
    fn test_high_risk_routes_empty() {
        assert!(high_risk_routes(&dataset(), 50.0).is_empty());
        assert!(high_risk_routes(&[], 0.0).is_empty());
    }

    #[test]
    fn test_best_performers() {
        let best = best_performers(&dataset(), 3);
        assert_eq!(best.len(), 2);
        // CMA: shipments 4 (late), 5 (late), 6 (on time) -> 33.3
        // MSC: 1, 2 late, 3 on time -> 33.3; equal rates keep volume order
        assert_eq!(best[0].stats.on_time_rate, best[1].stats.on_time_rate);

        let best = best_performers(&dataset(), 1);
        assert!(best.windows(2).all(|w| w[0].stats.on_time_rate >= w[1].stats.on_time_rate));
        assert!(best_performers(&dataset(), 100).is_empty());
    }

    #[test]
    fn test_severe_delay_carriers() {
        let carriers = severe_delay_carriers(&dataset(), 1);
        assert_eq!(carriers[0].carrier_name, "MSC");
        assert_eq!(carriers[0].stats.severe_late_rate, 66.7);
        assert_eq!(carriers[1].stats.severe_late_rate, 0.0);
    }

    #[test]
    fn test_matrix_count_fills_zero() {
        let m = carrier_route_matrix(&dataset(), MatrixMetric::ShipmentCount);
        assert_eq!(m.carriers, vec!["CMA", "MSC"]);
        assert_eq!(m.routes.len(), 3);
        assert_eq!(m.get("CMA", "China → Italy"), Some(1.0));
        assert_eq!(m.get("MSC", "China → Italy"), Some(2.0));
        assert_eq!(m.get("MSC", "Chile → Spain"), Some(0.0));
    }

    #[test]
    fn test_matrix_delay_and_on_time_leave_gaps() {
        let delay = carrier_route_matrix(&dataset(), MatrixMetric::MeanDelay);
        assert_eq!(delay.get("CMA", "China → Italy"), Some(5.5));
        assert_eq!(delay.get("MSC", "Chile → Spain"), None);

        let on_time = carrier_route_matrix(&dataset(), MatrixMetric::OnTimeRate);
        assert_eq!(on_time.get("CMA", "Chile → Spain"), Some(50.0));
        assert_eq!(on_time.get("MSC", "India → Oman"), Some(100.0));
        assert_eq!(on_time.get("CMA", "India → Oman"), None);
    }

    #[test]
    fn test_matrix_severe_rate() {
        let severe = carrier_route_matrix(&dataset(), MatrixMetric::SevereLateRate);
        assert_eq!(severe.get("MSC", "China → Italy"), Some(100.0));
        assert_eq!(severe.get("CMA", "China → Italy"), Some(0.0));
        assert_eq!(severe.get("MSC", "Chile → Spain"), None);
    }

    #[test]
    fn test_matrix_skips_unknown_delays() {
        let mut data = dataset();
        data.push(rec("7", "CMA", "Chile", "Spain", None::<f64>));
        data.push(rec("8", "ZIM", "Chile", "Spain", None::<f64>));

        let counts = carrier_route_matrix(&data, MatrixMetric::ShipmentCount);
        assert_eq!(counts.get("CMA", "Chile → Spain"), Some(3.0));
        assert_eq!(counts.get("ZIM", "Chile → Spain"), Some(1.0));

        let delay = carrier_route_matrix(&data, MatrixMetric::MeanDelay);
        assert_eq!(delay.get("CMA", "Chile → Spain"), Some(0.5));
        assert_eq!(delay.get("ZIM", "Chile → Spain"), None);

        let on_time = carrier_route_matrix(&data, MatrixMetric::OnTimeRate);
        assert_eq!(on_time.get("CMA", "Chile → Spain"), Some(50.0));
        assert_eq!(on_time.get("ZIM", "Chile → Spain"), None);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("count".parse::<MatrixMetric>(), Ok(MatrixMetric::ShipmentCount));
        assert_eq!("delay".parse::<MatrixMetric>(), Ok(MatrixMetric::MeanDelay));
        assert_eq!("On_Time".parse::<MatrixMetric>(), Ok(MatrixMetric::OnTimeRate));
        assert_eq!("severe".parse::<MatrixMetric>(), Ok(MatrixMetric::SevereLateRate));
        assert!("teu".parse::<MatrixMetric>().is_err());
    }
}
