//! Analytics configuration
//!
//! Defaults match the dashboard's initial slider positions. A JSON file may
//! override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// k-means settings; the fixed seed makes cluster assignments reproducible
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusteringConfig {
    pub seed: u64,
    /// Number of k-means++ initializations; the lowest inertia wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold relative to the mean feature variance
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Number of risk clusters (2-5 in practice)
    pub n_clusters: usize,
    /// Mean delay (days) at or above which a route is flagged high-risk
    pub risk_threshold_days: f64,
    /// Minimum shipments for the best-performer ranking
    pub best_performer_min_volume: usize,
    /// Minimum shipments for the severe-delay carrier watchlist
    pub watchlist_min_volume: usize,
    pub clustering: ClusteringConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            risk_threshold_days: 5.0,
            best_performer_min_volume: 20,
            watchlist_min_volume: 50,
            clustering: ClusteringConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
