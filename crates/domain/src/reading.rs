//! Reading — one timestamped biometric sample.
//!
//! Readings are produced by a device transport (real or synthetic) or by
//! self-report conversion. They are immutable once created and owned by
//! the stream buffer until consumed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::Timestamp;

/// Highest heart rate the engine accepts, in bpm.
pub const MAX_HEART_RATE: u16 = 250;

/// One biometric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Heart rate in beats per minute.
    pub heart_rate: u16,
    /// Heart-rate variability in milliseconds.
    pub hrv_ms: f64,
    /// Derived stress level, 0–100.
    pub stress: u8,
    /// When the sample was taken.
    pub recorded_at: Timestamp,
}

impl Reading {
    /// Create a reading from fully-known values.
    #[must_use]
    pub fn new(heart_rate: u16, hrv_ms: f64, stress: u8, recorded_at: Timestamp) -> Self {
        Self {
            heart_rate,
            hrv_ms,
            stress,
            recorded_at,
        }
    }

    /// Derive a full reading from a bare heart rate.
    ///
    /// Wearables that expose only the heart-rate measurement (and the
    /// synthetic transport) use the same deterministic derivation so that
    /// both sources feed the scoring windows identically: HRV falls as
    /// heart rate rises, stress climbs once the rate leaves resting range.
    #[must_use]
    pub fn derive(heart_rate: u16, recorded_at: Timestamp) -> Self {
        let hrv_ms = f64::from(165u16.saturating_sub(heart_rate).clamp(15, 110));
        let stress_raw = u32::from(heart_rate.saturating_sub(55)) * 3 / 2;
        let stress = u8::try_from(stress_raw.min(100)).unwrap_or(100);

        Self {
            heart_rate,
            hrv_ms,
            stress,
            recorded_at,
        }
    }

    /// Check invariants before the reading enters the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the heart rate or stress value is
    /// out of range, or when the HRV is negative or not finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.heart_rate > MAX_HEART_RATE {
            return Err(ValidationError::OutOfRange {
                field: "heart_rate",
                max: MAX_HEART_RATE,
                actual: self.heart_rate,
            });
        }
        if self.stress > 100 {
            return Err(ValidationError::OutOfRange {
                field: "stress",
                max: 100,
                actual: u16::from(self.stress),
            });
        }
        if !self.hrv_ms.is_finite() || self.hrv_ms < 0.0 {
            return Err(ValidationError::NotFinite { field: "hrv_ms" });
        }
        Ok(())
    }
}
