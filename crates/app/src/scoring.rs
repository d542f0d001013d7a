//! Regulation scoring & pattern engine.
//!
//! Maintains a bounded sliding window of biometric readings plus the
//! current self-report snapshot per domain, and derives from them the
//! regulation score (0–100, higher is better), the rumbling-risk score
//! (0–100, independent of the regulation score), the per-signal
//! [`RegulationFactor`] list, and the human-readable detected patterns.
//!
//! Everything here is pure: no IO, deterministic given the same window
//! contents and snapshots. Missing domains contribute zero penalty — a
//! tunable policy, not a physiological model.

use std::collections::VecDeque;

use keel_domain::factor::{Impact, RegulationFactor, Trend};
use keel_domain::reading::Reading;
use keel_domain::snapshot::{Behavioral, DomainSnapshot, Routine, Sensory, Sleep};

/// Number of readings kept in the biometric sliding window.
pub const WINDOW_LEN: usize = 5;

/// Noise threshold below which a heart-rate delta is not a trend, in bpm.
const HR_NOISE: f64 = 2.0;
/// Noise threshold for HRV deltas, in ms.
const HRV_NOISE: f64 = 2.0;
/// Noise threshold for stress deltas.
const STRESS_NOISE: f64 = 5.0;

/// The engine's derived outputs after one input.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// One factor per signal with enough data.
    pub factors: Vec<RegulationFactor>,
    /// Regulation score, 0–100.
    pub score: u8,
    /// Rumbling risk, 0–100.
    pub risk: u8,
    /// Human-readable contributing conditions, in priority order.
    pub patterns: Vec<String>,
}

/// Sliding windows and current snapshots for one user session.
#[derive(Debug, Default)]
pub struct ScoringState {
    window: VecDeque<Reading>,
    sleep: Option<Sleep>,
    sensory: Option<Sensory>,
    routine: Option<Routine>,
    behavioral: Option<Behavioral>,
}

impl ScoringState {
    /// Create an empty state: score 100, risk 0, no patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a reading into the sliding window, evicting the oldest once
    /// the window is full.
    pub fn push_reading(&mut self, reading: Reading) {
        if self.window.len() == WINDOW_LEN {
            self.window.pop_front();
        }
        self.window.push_back(reading);
    }

    /// Replace the current snapshot for the submission's domain wholesale.
    ///
    /// Snapshots never expire on their own; the previous one is simply
    /// overwritten.
    pub fn apply_snapshot(&mut self, snapshot: DomainSnapshot) {
        match snapshot {
            DomainSnapshot::Sleep(sleep) => self.sleep = Some(sleep),
            DomainSnapshot::Sensory(sensory) => self.sensory = Some(sensory),
            DomainSnapshot::Routine(routine) => self.routine = Some(routine),
            DomainSnapshot::Behavioral(behavioral) => self.behavioral = Some(behavioral),
        }
    }

    /// Number of readings currently in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Recompute factors, score, risk, and patterns from current state.
    #[must_use]
    pub fn assess(&self) -> Assessment {
        let (risk, patterns) = self.risk_and_patterns();
        Assessment {
            factors: self.factors(),
            score: self.regulation_score(),
            risk,
            patterns,
        }
    }

    fn heart_rates(&self) -> Vec<f64> {
        self.window.iter().map(|r| f64::from(r.heart_rate)).collect()
    }

    fn hrvs(&self) -> Vec<f64> {
        self.window.iter().map(|r| r.hrv_ms).collect()
    }

    fn stresses(&self) -> Vec<f64> {
        self.window.iter().map(|r| f64::from(r.stress)).collect()
    }

    /// One [`RegulationFactor`] per signal that has data, biometrics first.
    fn factors(&self) -> Vec<RegulationFactor> {
        let mut factors = Vec::new();

        if let Some(last) = self.window.back() {
            factors.push(RegulationFactor {
                name: "heart_rate",
                value: f64::from(last.heart_rate),
                impact: match last.heart_rate {
                    91.. => Impact::High,
                    81..=90 => Impact::Medium,
                    _ => Impact::Low,
                },
                trend: trend(&self.heart_rates(), HR_NOISE),
            });
            factors.push(RegulationFactor {
                name: "hrv",
                value: last.hrv_ms,
                impact: if last.hrv_ms < 40.0 {
                    Impact::High
                } else if last.hrv_ms < 55.0 {
                    Impact::Medium
                } else {
                    Impact::Low
                },
                trend: trend(&self.hrvs(), HRV_NOISE),
            });
            factors.push(RegulationFactor {
                name: "stress",
                value: f64::from(last.stress),
                impact: match last.stress {
                    76.. => Impact::High,
                    61..=75 => Impact::Medium,
                    _ => Impact::Low,
                },
                trend: trend(&self.stresses(), STRESS_NOISE),
            });
        }

        if let Some(sleep) = &self.sleep {
            factors.push(RegulationFactor {
                name: "sleep_quality",
                value: f64::from(sleep.quality),
                impact: if sleep.quality < 4 {
                    Impact::High
                } else if sleep.quality < 6 {
                    Impact::Medium
                } else {
                    Impact::Low
                },
                trend: Trend::Stable,
            });
            factors.push(RegulationFactor {
                name: "sleep_duration",
                value: sleep.duration_hours,
                impact: if sleep.duration_hours < 5.0 {
                    Impact::High
                } else if sleep.duration_hours < 6.5 {
                    Impact::Medium
                } else {
                    Impact::Low
                },
                trend: Trend::Stable,
            });
        }

        if let Some(sensory) = &self.sensory {
            let load = sensory.load();
            factors.push(RegulationFactor {
                name: "sensory_load",
                value: load,
                impact: if load > 75.0 {
                    Impact::High
                } else if load > 60.0 {
                    Impact::Medium
                } else {
                    Impact::Low
                },
                trend: Trend::Stable,
            });
        }

        if let Some(routine) = &self.routine {
            let mut impact = match routine.deviation_score {
                71.. => Impact::High,
                41..=70 => Impact::Medium,
                _ => Impact::Low,
            };
            if routine.unexpected_change && impact == Impact::Low {
                impact = Impact::Medium;
            }
            factors.push(RegulationFactor {
                name: "routine_deviation",
                value: f64::from(routine.deviation_score),
                impact,
                trend: Trend::Stable,
            });
        }

        if let Some(behavioral) = &self.behavioral {
            for (name, value) in [
                ("irritability", behavioral.irritability),
                ("stimming", behavioral.stimming),
                ("social_withdrawal", behavioral.social_withdrawal),
            ] {
                factors.push(RegulationFactor {
                    name,
                    value: f64::from(value),
                    impact: match value {
                        8.. => Impact::High,
                        6..=7 => Impact::Medium,
                        _ => Impact::Low,
                    },
                    trend: Trend::Stable,
                });
            }
            factors.push(RegulationFactor {
                name: "mood",
                value: f64::from(behavioral.mood),
                impact: match behavioral.mood {
                    0..=2 => Impact::High,
                    3..=4 => Impact::Medium,
                    _ => Impact::Low,
                },
                trend: Trend::Stable,
            });
        }

        factors
    }

    /// Start at 100 and subtract a fixed penalty per adverse condition
    /// actually present. Band penalties react to the latest reading;
    /// trend smoothing happens in the risk computation instead.
    fn regulation_score(&self) -> u8 {
        let mut penalty: i32 = 0;

        if let Some(last) = self.window.back() {
            penalty += match last.heart_rate {
                91.. => 15,
                81..=90 => 10,
                71..=80 => 5,
                _ => 0,
            };
            penalty += if last.hrv_ms < 40.0 {
                15
            } else if last.hrv_ms < 50.0 {
                10
            } else if last.hrv_ms < 60.0 {
                5
            } else {
                0
            };
        }

        if let Some(sleep) = &self.sleep {
            penalty += if sleep.quality < 4 {
                15
            } else if sleep.quality < 6 {
                8
            } else {
                0
            };
            penalty += if sleep.duration_hours < 5.0 {
                15
            } else if sleep.duration_hours < 6.5 {
                8
            } else {
                0
            };
        }

        if let Some(sensory) = &self.sensory {
            let load = sensory.load();
            penalty += if load > 75.0 {
                15
            } else if load > 60.0 {
                8
            } else {
                0
            };
        }

        if let Some(routine) = &self.routine {
            if routine.unexpected_change {
                // −10 flat plus up to −10 proportional to the deviation.
                penalty += 10 + i32::from(routine.deviation_score / 10);
            }
        }

        if let Some(behavioral) = &self.behavioral {
            penalty += elevated_penalty(behavioral.irritability, 15, 8);
            penalty += elevated_penalty(behavioral.stimming, 10, 5);
            penalty += elevated_penalty(behavioral.social_withdrawal, 10, 5);
            penalty += match behavioral.mood {
                0..=2 => 15,
                3..=4 => 8,
                _ => 0,
            };
        }

        u8::try_from((100 - penalty).clamp(0, 100)).unwrap_or(0)
    }

    /// Rumbling risk and its contributing patterns, evaluated in fixed
    /// priority order: heart rate, HRV, stress, sleep, environment.
    fn risk_and_patterns(&self) -> (u8, Vec<String>) {
        let mut risk: u32 = 0;
        let mut patterns = Vec::new();

        if trend(&self.heart_rates(), HR_NOISE) == Trend::Increasing {
            risk += 20;
            patterns.push("Heart rate trending upward".to_string());
        }
        if trend(&self.hrvs(), HRV_NOISE) == Trend::Decreasing {
            risk += 25;
            patterns.push("Heart rate variability declining".to_string());
        }
        if !self.window.is_empty() && mean(&self.stresses()) > 60.0 {
            risk += 20;
            patterns.push("Sustained elevated stress".to_string());
        }
        if let Some(sleep) = &self.sleep {
            if sleep.quality < 4 || sleep.duration_hours < 5.0 {
                risk += 15;
                patterns.push("Poor sleep reported".to_string());
            }
        }
        if let Some(sensory) = &self.sensory {
            if sensory.load() > 70.0 {
                risk += 10;
                patterns.push("High sensory load in environment".to_string());
            }
        }

        (u8::try_from(risk.min(100)).unwrap_or(100), patterns)
    }
}

fn elevated_penalty(value: u8, high: i32, medium: i32) -> i32 {
    match value {
        8.. => high,
        6..=7 => medium,
        _ => 0,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    values.iter().sum::<f64>() / len
}

/// Label the direction of a signal over its window.
///
/// Compares the mean of the most recent (up to) 3 values against the mean
/// of the values immediately before them. Fewer than 2 points is always
/// [`Trend::Stable`]; deltas within the noise threshold are too.
#[must_use]
pub fn trend(values: &[f64], noise: f64) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }
    let split = values.len().saturating_sub(3).max(1);
    let older = &values[split.saturating_sub(3)..split];
    let recent = &values[split..];

    let delta = mean(recent) - mean(older);
    if delta > noise {
        Trend::Increasing
    } else if delta < -noise {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}
