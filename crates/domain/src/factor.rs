//! Regulation factors — derived per-signal assessments.
//!
//! Factors are transient: recomputed every time new input arrives and
//! never persisted.

use serde::{Deserialize, Serialize};

/// How strongly a signal currently weighs on regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// Short-window direction of a numeric signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// One signal's current value, impact band, and trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationFactor {
    /// Stable signal name (e.g. `"heart_rate"`).
    pub name: &'static str,
    /// Most recent value of the signal.
    pub value: f64,
    /// Impact band assigned by fixed thresholds.
    pub impact: Impact,
    /// Direction over the sliding window.
    pub trend: Trend,
}
