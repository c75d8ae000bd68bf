//! Composite risk score
//!
//! Three independent tiered penalties summed into a 0-100 score.

use serde::Serialize;

use crate::aggregate::{CarrierStats, PerformanceStats, RouteStats};
use crate::clustering::RouteCluster;

pub const MAX_RISK_SCORE: u8 = 100;

/// Inputs to the scorer. Build it explicitly from whichever row you hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInput {
    /// Mean arrival delay in days
    pub mean_delay: f64,
    /// Standard deviation of arrival delay in days
    pub delay_stddev: f64,
    /// Late share as a fraction in [0, 1]
    pub late_fraction: f64,
}

impl From<&PerformanceStats> for RiskInput {
    fn from(s: &PerformanceStats) -> Self {
        Self {
            mean_delay: s.avg_delay,
            delay_stddev: s.std_delay,
            late_fraction: s.late_rate / 100.0,
        }
    }
}

impl From<&RouteStats> for RiskInput {
    fn from(r: &RouteStats) -> Self {
        RiskInput::from(&r.stats)
    }
}

impl From<&CarrierStats> for RiskInput {
    fn from(c: &CarrierStats) -> Self {
        RiskInput::from(&c.stats)
    }
}

impl From<&RouteCluster> for RiskInput {
    fn from(r: &RouteCluster) -> Self {
        // cluster rows already carry fractional rates
        Self {
            mean_delay: r.avg_delay,
            delay_stddev: r.std_delay,
            late_fraction: r.late_rate,
        }
    }
}

fn delay_penalty(mean_delay: f64) -> u8 {
    match mean_delay {
        d if d > 7.0 => 40,
        d if d > 3.0 => 25,
        d if d > 0.0 => 10,
        _ => 0,
    }
}

fn variability_penalty(stddev: f64) -> u8 {
    match stddev {
        s if s > 5.0 => 30,
        s if s > 2.0 => 15,
        _ => 0,
    }
}

fn lateness_penalty(late_fraction: f64) -> u8 {
    match late_fraction {
        l if l > 0.5 => 30,
        l if l > 0.3 => 15,
        _ => 0,
    }
}

/// Score a row: delay (0/10/25/40) + variability (0/15/30) + lateness (0/15/30).
///
/// Monotonic non-decreasing in each input; non-finite inputs add nothing.
pub fn risk_score(input: &RiskInput) -> u8 {
    delay_penalty(input.mean_delay)
        + variability_penalty(input.delay_stddev)
        + lateness_penalty(input.late_fraction)
}

/// Display band for a score
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskBand {
    Low,      // < 25
    Elevated, // 25-49
    High,     // 50-74
    Critical, // >= 75
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => RiskBand::Low,
            25..=49 => RiskBand::Elevated,
            50..=74 => RiskBand::High,
            _ => RiskBand::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Elevated => "elevated",
            RiskBand::High => "high",
            RiskBand::Critical => "critical",
        }
    }
}
