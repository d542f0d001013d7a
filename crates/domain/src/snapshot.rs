//! Domain snapshots — self-reported records for one regulation domain.
//!
//! The engine holds at most one "current" snapshot per domain; each user
//! submission replaces the previous one wholesale, never a partial merge.
//! A snapshot stays current until replaced — there is no automatic expiry.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One category of self-reported data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Sleep,
    Sensory,
    Routine,
    Behavioral,
}

impl Domain {
    /// Stable string form used for persistence keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Sensory => "sensory",
            Self::Routine => "routine",
            Self::Behavioral => "behavioral",
        }
    }
}

/// Last night's sleep report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sleep {
    /// Subjective quality, 0–10.
    pub quality: u8,
    /// Hours slept.
    pub duration_hours: f64,
    /// Number of awakenings.
    pub awakenings: u8,
}

/// Current sensory environment, each load on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensory {
    pub noise: u8,
    pub light: u8,
    pub crowding: u8,
    pub temperature: u8,
}

impl Sensory {
    /// Combined sensory load, the mean of the four channels.
    #[must_use]
    pub fn load(&self) -> f64 {
        f64::from(
            u16::from(self.noise)
                + u16::from(self.light)
                + u16::from(self.crowding)
                + u16::from(self.temperature),
        ) / 4.0
    }
}

/// Routine adherence report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    /// How far today deviated from the usual routine, 0–100.
    pub deviation_score: u8,
    /// Whether the deviation was unexpected rather than planned.
    pub unexpected_change: bool,
}

/// Self-observed behavioral state, each signal on a 0–10 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavioral {
    pub irritability: u8,
    pub stimming: u8,
    pub social_withdrawal: u8,
    /// Self-reported mood, 0 (worst) – 10 (best).
    pub mood: u8,
}

/// A fully-formed self-report for exactly one domain.
///
/// Closed union: the submission boundary validates the payload before it
/// ever reaches the sliding windows, so the engine never sees invalid data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainSnapshot {
    Sleep(Sleep),
    Sensory(Sensory),
    Routine(Routine),
    Behavioral(Behavioral),
}

impl DomainSnapshot {
    /// Which domain this snapshot reports on.
    #[must_use]
    pub fn domain(&self) -> Domain {
        match self {
            Self::Sleep(_) => Domain::Sleep,
            Self::Sensory(_) => Domain::Sensory,
            Self::Routine(_) => Domain::Routine,
            Self::Behavioral(_) => Domain::Behavioral,
        }
    }

    /// Check field ranges before the snapshot enters the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Sleep(sleep) => {
                check("quality", sleep.quality, 10)?;
                if !sleep.duration_hours.is_finite()
                    || sleep.duration_hours < 0.0
                    || sleep.duration_hours > 24.0
                {
                    return Err(ValidationError::NotFinite {
                        field: "duration_hours",
                    });
                }
                Ok(())
            }
            Self::Sensory(sensory) => {
                check("noise", sensory.noise, 100)?;
                check("light", sensory.light, 100)?;
                check("crowding", sensory.crowding, 100)?;
                check("temperature", sensory.temperature, 100)
            }
            Self::Routine(routine) => check("deviation_score", routine.deviation_score, 100),
            Self::Behavioral(behavioral) => {
                check("irritability", behavioral.irritability, 10)?;
                check("stimming", behavioral.stimming, 10)?;
                check("social_withdrawal", behavioral.social_withdrawal, 10)?;
                check("mood", behavioral.mood, 10)
            }
        }
    }
}

fn check(field: &'static str, actual: u8, max: u16) -> Result<(), ValidationError> {
    if u16::from(actual) > max {
        return Err(ValidationError::OutOfRange {
            field,
            max,
            actual: u16::from(actual),
        });
    }
    Ok(())
}
