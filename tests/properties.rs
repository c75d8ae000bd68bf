//! Property tests for the aggregation, scoring and clustering invariants.
//!
//! 1. **Shipments vs containers**: carrier shipment counts partition the
//!    distinct Bills of Lading; container counts partition the rows; no group
//!    ever reports more shipments than containers.
//!
//! 2. **Rates**: on-time and late rates are complementary wherever a delay is
//!    known; market shares sum to 100 within rounding; the delay categories
//!    partition the rows with a known delay.
//!
//! 3. **Scorer**: bounded in [0, 100] and monotonic in each input.
//!
//! 4. **Order independence**: aggregation and clustering results do not depend
//!    on input row order, and clustering is deterministic.

use freight_analytics::aggregate::{calculate_kpis, carrier_stats, delay_distribution, route_stats};
use freight_analytics::clustering::{cluster_routes, RiskLevel};
use freight_analytics::config::ClusteringConfig;
use freight_analytics::risk::{risk_score, RiskInput, MAX_RISK_SCORE};
use freight_analytics::ShipmentRecord;
use proptest::prelude::*;
use std::collections::BTreeSet;

const CARRIERS: &[&str] = &["MSC", "Maersk", "CMA CGM", "COSCO", "ZIM"];
const COUNTRIES: &[&str] = &["China", "Italy", "Chile", "Germany", "India", "Spain"];

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One Bill of Lading: carrier, lane and one delay per container, some not
/// yet known
fn arb_shipment() -> impl Strategy<Value = (usize, usize, usize, Vec<Option<f64>>)> {
    (
        0..CARRIERS.len(),
        0..COUNTRIES.len(),
        0..COUNTRIES.len(),
        // tenth-of-a-day delays, as the export reports them
        prop::collection::vec(
            prop::option::weighted(0.9, (-100i32..250).prop_map(|d| d as f64 / 10.0)),
            1..4,
        ),
    )
}

fn arb_dataset() -> impl Strategy<Value = Vec<ShipmentRecord>> {
    prop::collection::vec(arb_shipment(), 0..60).prop_map(|shipments| {
        shipments
            .into_iter()
            .enumerate()
            .flat_map(|(i, (carrier, origin, dest, delays))| {
                delays.into_iter().enumerate().map(move |(c, delay)| {
                    ShipmentRecord::new(
                        format!("BL{:04}", i),
                        CARRIERS[carrier],
                        COUNTRIES[origin],
                        COUNTRIES[dest],
                        delay,
                    )
                    .with_container(format!("CTR{:04}-{}", i, c))
                })
            })
            .collect()
    })
}

fn arb_dataset_and_shuffle() -> impl Strategy<Value = (Vec<ShipmentRecord>, Vec<ShipmentRecord>)> {
    arb_dataset().prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle()))
}

fn distinct_bls(records: &[ShipmentRecord]) -> usize {
    records.iter().filter_map(|r| r.shipment_key()).collect::<BTreeSet<_>>().len()
}

// ---------------------------------------------------------------------------
// 1. Shipments vs containers
// ---------------------------------------------------------------------------

proptest! {
    /// Each Bill of Lading belongs to exactly one carrier, so carrier
    /// shipment counts sum to the dataset's distinct shipments.
    #[test]
    fn carrier_shipments_partition_total(records in arb_dataset()) {
        let carriers = carrier_stats(&records);
        let shipments: usize = carriers.iter().map(|c| c.stats.shipments).sum();
        let containers: usize = carriers.iter().map(|c| c.stats.containers).sum();

        prop_assert_eq!(shipments, distinct_bls(&records));
        prop_assert_eq!(containers, records.len());

        if let Some(kpis) = calculate_kpis(&records) {
            prop_assert_eq!(kpis.total_shipments, shipments);
            prop_assert_eq!(kpis.total_containers, containers);
        } else {
            prop_assert!(records.is_empty());
        }
    }

    #[test]
    fn shipments_never_exceed_containers(records in arb_dataset()) {
        for c in carrier_stats(&records) {
            prop_assert!(c.stats.shipments <= c.stats.containers, "{}", c.carrier_name);
        }
        for r in route_stats(&records) {
            prop_assert!(r.stats.shipments <= r.stats.containers, "{}", r.route);
        }
    }

// ---------------------------------------------------------------------------
// 2. Rates
// ---------------------------------------------------------------------------

    #[test]
    fn on_time_and_late_rates_are_complementary(records in arb_dataset()) {
        for c in carrier_stats(&records) {
            prop_assert!(c.stats.severe_late_rate <= c.stats.late_rate);
            prop_assert!((0.0..=100.0).contains(&c.stats.on_time_rate));
            prop_assert!(c.stats.measured_containers <= c.stats.containers);
            if c.stats.measured_containers > 0 {
                prop_assert!((c.stats.on_time_rate + c.stats.late_rate - 100.0).abs() <= 0.1 + 1e-9);
            } else {
                prop_assert_eq!(c.stats.on_time_rate + c.stats.late_rate, 0.0);
            }
        }
    }

    #[test]
    fn market_shares_sum_to_hundred(records in arb_dataset()) {
        let carriers = carrier_stats(&records);
        prop_assume!(!carriers.is_empty());
        let total: f64 = carriers.iter().map(|c| c.market_share).sum();
        let tolerance = 0.05 * carriers.len() as f64 + 1e-9;
        prop_assert!((total - 100.0).abs() <= tolerance, "sum={}", total);
    }

    #[test]
    fn delay_categories_partition_rows(records in arb_dataset()) {
        let buckets = delay_distribution(&records);
        prop_assert_eq!(buckets.len(), 4);
        let measured = records.iter().filter(|r| r.arrival_delay.is_some()).count();
        prop_assert_eq!(buckets.iter().map(|b| b.containers).sum::<usize>(), measured);
    }
}

// ---------------------------------------------------------------------------
// 3. Scorer
// ---------------------------------------------------------------------------

fn arb_input() -> impl Strategy<Value = RiskInput> {
    (-20.0f64..40.0, 0.0f64..20.0, 0.0f64..=1.0).prop_map(|(mean_delay, delay_stddev, late_fraction)| RiskInput {
        mean_delay,
        delay_stddev,
        late_fraction,
    })
}

proptest! {
    #[test]
    fn risk_score_is_bounded(input in arb_input()) {
        prop_assert!(risk_score(&input) <= MAX_RISK_SCORE);
    }

    #[test]
    fn risk_score_is_monotonic(
        input in arb_input(),
        d_delay in 0.0f64..10.0,
        d_std in 0.0f64..10.0,
        d_late in 0.0f64..0.5,
    ) {
        let base = risk_score(&input);
        let worse = RiskInput {
            mean_delay: input.mean_delay + d_delay,
            delay_stddev: input.delay_stddev + d_std,
            late_fraction: (input.late_fraction + d_late).min(1.0),
        };
        prop_assert!(risk_score(&worse) >= base);

        let only_delay = RiskInput { mean_delay: input.mean_delay + d_delay, ..input };
        prop_assert!(risk_score(&only_delay) >= base);

        let only_std = RiskInput { delay_stddev: input.delay_stddev + d_std, ..input };
        prop_assert!(risk_score(&only_std) >= base);

        let only_late = RiskInput { late_fraction: (input.late_fraction + d_late).min(1.0), ..input };
        prop_assert!(risk_score(&only_late) >= base);
    }
}

// ---------------------------------------------------------------------------
// 4. Order independence and determinism
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn aggregation_ignores_row_order((records, shuffled) in arb_dataset_and_shuffle()) {
        prop_assert_eq!(calculate_kpis(&records), calculate_kpis(&shuffled));
        prop_assert_eq!(carrier_stats(&records), carrier_stats(&shuffled));
        prop_assert_eq!(route_stats(&records), route_stats(&shuffled));
    }

    #[test]
    fn clustering_ignores_row_order((records, shuffled) in arb_dataset_and_shuffle(), k in 2usize..4) {
        let config = ClusteringConfig::default();
        let a = cluster_routes(&records, k, &config);
        let b = cluster_routes(&shuffled, k, &config);
        match (a, b) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => {
                prop_assert!(a.is_insufficient_data());
                prop_assert!(b.is_insufficient_data());
            }
            (a, b) => prop_assert!(false, "diverged: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }

    /// Every route gets a tier, the lowest-delay cluster is always Low, and
    /// the Low tier never averages more delay than the High tier.
    #[test]
    fn clustering_tiers_are_ordered(records in arb_dataset(), k in 2usize..5) {
        let Ok(result) = cluster_routes(&records, k, &ClusteringConfig::default()) else {
            return Ok(());
        };

        let routes: BTreeSet<&str> = records
            .iter()
            .filter(|r| r.arrival_delay.is_some())
            .map(|r| r.route.as_str())
            .collect();
        prop_assert_eq!(result.routes.len(), routes.len());
        prop_assert!(result.routes_at(RiskLevel::Low).count() > 0);
        if k == 2 {
            prop_assert_eq!(result.routes_at(RiskLevel::Medium).count(), 0);
        }

        let low = result.summary.iter().find(|s| s.risk_level == RiskLevel::Low);
        let high = result.summary.iter().find(|s| s.risk_level == RiskLevel::High);
        if let (Some(low), Some(high)) = (low, high) {
            prop_assert!(low.avg_delay <= high.avg_delay + 0.02, "low={} high={}", low.avg_delay, high.avg_delay);
        }
    }
}
