//! Route risk clustering
//!
//! Routes are described by four features (mean delay, delay deviation, late
//! rate, severe-late rate), standardized per call and partitioned with seeded
//! k-means. Raw cluster indices carry no meaning across calls, so clusters are
//! ranked by mean delay and relabeled Low / Medium / High Risk.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{group_by, GroupMetrics};
use crate::config::ClusteringConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::ShipmentRecord;
use crate::stats::{mean, population_std, round_to};

/// Source rows a caller should have before clustering (strictly more than this)
pub const MIN_CLUSTERING_ROWS: usize = 10;

const FEATURE_COUNT: usize = 4;

type Point = [f64; FEATURE_COUNT];

/// Ordinal risk tier
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    /// Tier for the cluster at `rank` (0 = lowest mean delay) out of `k`
    pub fn from_rank(rank: usize, k: usize) -> Self {
        if rank == 0 {
            RiskLevel::Low
        } else if rank + 1 == k {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

/// One route with its clustering features and assigned tier.
///
/// Rates are fractions in [0, 1].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteCluster {
    pub route: String,
    /// Distinct shipments on the route
    pub volume: usize,
    pub avg_delay: f64,
    pub std_delay: f64,
    pub avg_transit: Option<f64>,
    pub late_rate: f64,
    pub severe_late_rate: f64,
    pub avg_rolls: f64,
    pub cluster: usize,
    pub risk_level: RiskLevel,
}

/// Per-tier summary; rates are fractions in [0, 1]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RiskTierSummary {
    pub risk_level: RiskLevel,
    pub routes: usize,
    pub shipments: usize,
    pub avg_delay: f64,
    pub late_rate: f64,
    pub severe_late_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteClustering {
    pub n_clusters: usize,
    /// Within-cluster sum of squares of the kept initialization
    pub inertia: f64,
    /// Routes ordered by name
    pub routes: Vec<RouteCluster>,
    /// Tiers ordered Low, Medium, High; absent tiers are omitted
    pub summary: Vec<RiskTierSummary>,
}

impl RouteClustering {
    pub fn routes_at(&self, level: RiskLevel) -> impl Iterator<Item = &RouteCluster> {
        self.routes.iter().filter(move |r| r.risk_level == level)
    }
}

/// Whether a dataset is large enough for clustering to be meaningful
pub fn has_enough_rows_for_clustering(records: &[ShipmentRecord]) -> bool {
    records.len() > MIN_CLUSTERING_ROWS
}

struct RouteFeatures {
    route: String,
    metrics: GroupMetrics,
}

impl RouteFeatures {
    fn point(&self) -> Point {
        [
            self.metrics.mean_delay,
            self.metrics.std_delay,
            self.metrics.late_fraction,
            self.metrics.severe_fraction,
        ]
    }
}

/// Partition routes into `k` risk tiers.
///
/// Routes with no known arrival delay have no features and are left out.
/// Fails with [`AnalyticsError::InsufficientData`] when there are fewer
/// routes than clusters, and [`AnalyticsError::InvalidClusterCount`] for
/// `k == 0`.
pub fn cluster_routes(records: &[ShipmentRecord], k: usize, config: &ClusteringConfig) -> Result<RouteClustering> {
    if k == 0 {
        return Err(AnalyticsError::InvalidClusterCount(k));
    }

    let routes: Vec<RouteFeatures> = group_by(records, |r| Some(r.route.as_str()))
        .into_iter()
        .filter_map(|(route, rows)| {
            Some(RouteFeatures {
                route: route.to_string(),
                metrics: GroupMetrics::compute(&rows)?,
            })
        })
        .filter(|r| r.metrics.measured_containers > 0)
        .collect();

    if routes.len() < k {
        return Err(AnalyticsError::InsufficientData {
            available: routes.len(),
            requested: k,
        });
    }

    let raw: Vec<Point> = routes.iter().map(RouteFeatures::point).collect();
    let scaled = StandardScaler::fit(&raw).transform(&raw);

    let fit = KMeans::new(k, config).fit(&scaled);

    // rank clusters by mean of member routes' delay; empty clusters rank last
    let mut cluster_delay = vec![f64::INFINITY; k];
    for (c, slot) in cluster_delay.iter_mut().enumerate() {
        let delays: Vec<f64> = routes
            .iter()
            .zip(&fit.labels)
            .filter(|(_, label)| **label == c)
            .map(|(r, _)| r.metrics.mean_delay)
            .collect();
        if let Some(m) = mean(&delays) {
            *slot = m;
        }
    }
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|a, b| cluster_delay[*a].total_cmp(&cluster_delay[*b]).then(a.cmp(b)));

    let mut levels = vec![RiskLevel::Low; k];
    for (rank, cluster) in order.iter().enumerate() {
        levels[*cluster] = RiskLevel::from_rank(rank, k);
    }

    let rows: Vec<RouteCluster> = routes
        .into_iter()
        .zip(&fit.labels)
        .map(|(r, &cluster)| RouteCluster {
            route: r.route,
            volume: r.metrics.shipments,
            avg_delay: round_to(r.metrics.mean_delay, 2),
            std_delay: round_to(r.metrics.std_delay, 2),
            avg_transit: r.metrics.mean_transit.map(|t| round_to(t, 2)),
            late_rate: round_to(r.metrics.late_fraction, 3),
            severe_late_rate: round_to(r.metrics.severe_fraction, 3),
            avg_rolls: round_to(r.metrics.mean_rolls, 2),
            cluster,
            risk_level: levels[cluster],
        })
        .collect();

    let summary = summarize(&rows);
    info!(
        "Clustered {} routes into {} risk tiers (inertia {:.4})",
        rows.len(),
        k,
        fit.inertia
    );

    Ok(RouteClustering {
        n_clusters: k,
        inertia: fit.inertia,
        routes: rows,
        summary,
    })
}

fn summarize(rows: &[RouteCluster]) -> Vec<RiskTierSummary> {
    RiskLevel::ALL
        .iter()
        .filter_map(|level| {
            let members: Vec<&RouteCluster> = rows.iter().filter(|r| r.risk_level == *level).collect();
            if members.is_empty() {
                return None;
            }
            let avg = |f: fn(&RouteCluster) -> f64| {
                let values: Vec<f64> = members.iter().map(|&r| f(r)).collect();
                mean(&values).unwrap_or(0.0)
            };
            Some(RiskTierSummary {
                risk_level: *level,
                routes: members.len(),
                shipments: members.iter().map(|r| r.volume).sum(),
                avg_delay: round_to(avg(|r| r.avg_delay), 2),
                late_rate: round_to(avg(|r| r.late_rate), 3),
                severe_late_rate: round_to(avg(|r| r.severe_late_rate), 3),
            })
        })
        .collect()
}

// ============================================================================
// Standardization
// ============================================================================

/// Zero-mean, unit-variance scaling fitted on the current routes
struct StandardScaler {
    means: Point,
    scales: Point,
}

impl StandardScaler {
    fn fit(points: &[Point]) -> Self {
        let mut means = [0.0; FEATURE_COUNT];
        let mut scales = [1.0; FEATURE_COUNT];
        for f in 0..FEATURE_COUNT {
            let column: Vec<f64> = points.iter().map(|p| p[f]).collect();
            means[f] = mean(&column).unwrap_or(0.0);
            let std = population_std(&column);
            // constant features stay centred but unscaled
            if std > f64::EPSILON {
                scales[f] = std;
            }
        }
        Self { means, scales }
    }

    fn transform(&self, points: &[Point]) -> Vec<Point> {
        points
            .iter()
            .map(|p| {
                let mut out = [0.0; FEATURE_COUNT];
                for f in 0..FEATURE_COUNT {
                    out[f] = (p[f] - self.means[f]) / self.scales[f];
                }
                out
            })
            .collect()
    }
}

// ============================================================================
// K-Means
// ============================================================================

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Nearest centroid index (lowest index on ties) and its squared distance
fn nearest(point: &Point, centroids: &[Point]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

struct KMeansFit {
    labels: Vec<usize>,
    inertia: f64,
}

/// Lloyd's algorithm with k-means++ seeding and several restarts
struct KMeans {
    k: usize,
    seed: u64,
    n_init: usize,
    max_iter: usize,
    tolerance: f64,
}

impl KMeans {
    fn new(k: usize, config: &ClusteringConfig) -> Self {
        Self {
            k,
            seed: config.seed,
            n_init: config.n_init.max(1),
            max_iter: config.max_iter.max(1),
            tolerance: config.tolerance,
        }
    }

    /// Fit on `points` (at least `k` of them); keeps the lowest-inertia run.
    fn fit(&self, points: &[Point]) -> KMeansFit {
        let mut rng = StdRng::seed_from_u64(self.seed);

        // tolerance is relative to the mean feature variance
        let variances: Vec<f64> = (0..FEATURE_COUNT)
            .map(|f| {
                let column: Vec<f64> = points.iter().map(|p| p[f]).collect();
                population_std(&column).powi(2)
            })
            .collect();
        let tol = self.tolerance * mean(&variances).unwrap_or(0.0);

        let mut best: Option<KMeansFit> = None;
        for run in 0..self.n_init {
            let initial = self.init_plus_plus(points, &mut rng);
            let fit = self.lloyd(points, initial, tol);
            debug!("k-means run {} inertia {:.6}", run, fit.inertia);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.unwrap_or_else(|| KMeansFit {
            labels: vec![0; points.len()],
            inertia: 0.0,
        })
    }

    fn init_plus_plus(&self, points: &[Point], rng: &mut StdRng) -> Vec<Point> {
        let n = points.len();
        let mut centroids = Vec::with_capacity(self.k);
        centroids.push(points[rng.gen_range(0..n)]);

        while centroids.len() < self.k {
            let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
            // all weights zero when the remaining points duplicate the chosen ones
            let next = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..n),
            };
            centroids.push(points[next]);
        }
        centroids
    }

    fn lloyd(&self, points: &[Point], mut centroids: Vec<Point>, tol: f64) -> KMeansFit {
        let mut labels = vec![0; points.len()];

        for _ in 0..self.max_iter {
            for (label, p) in labels.iter_mut().zip(points) {
                *label = nearest(p, &centroids).0;
            }

            let mut sums = vec![[0.0; FEATURE_COUNT]; self.k];
            let mut counts = vec![0usize; self.k];
            for (p, &label) in points.iter().zip(&labels) {
                counts[label] += 1;
                for f in 0..FEATURE_COUNT {
                    sums[label][f] += p[f];
                }
            }

            let mut updated = centroids.clone();
            for c in 0..self.k {
                if counts[c] > 0 {
                    for f in 0..FEATURE_COUNT {
                        updated[c][f] = sums[c][f] / counts[c] as f64;
                    }
                } else {
                    // relocate an empty cluster to the point worst served by its centroid
                    let farthest = points
                        .iter()
                        .zip(&labels)
                        .map(|(p, &l)| squared_distance(p, &centroids[l]))
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |acc, (i, d)| if d > acc.1 { (i, d) } else { acc })
                        .0;
                    updated[c] = points[farthest];
                }
            }

            let shift: f64 = centroids.iter().zip(&updated).map(|(a, b)| squared_distance(a, b)).sum();
            centroids = updated;
            if shift <= tol {
                break;
            }
        }

        let mut inertia = 0.0;
        for (label, p) in labels.iter_mut().zip(points) {
            let (c, d) = nearest(p, &centroids);
            *label = c;
            inertia += d;
        }

        KMeansFit { labels, inertia }
    }
}
