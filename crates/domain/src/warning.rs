//! Warning levels and events.
//!
//! The warning level is an ordered severity derived from the rumbling-risk
//! score; a [`WarningEvent`] records one episode where the level left
//! `Normal`, from opening until resolution.

use serde::{Deserialize, Serialize};

use crate::id::{StrategyId, WarningEventId};
use crate::time::Timestamp;

/// Trigger string recorded when an event opens with no detected patterns.
pub const GENERIC_TRIGGER: &str = "general dysregulation";

/// Ordered severity level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    #[default]
    Normal,
    Notice,
    Watch,
    Alert,
}

impl WarningLevel {
    /// Map a rumbling-risk score onto a level using fixed bands.
    #[must_use]
    pub fn from_risk(risk: u8) -> Self {
        match risk {
            76..=u8::MAX => Self::Alert,
            51..=75 => Self::Watch,
            26..=50 => Self::Notice,
            0..=25 => Self::Normal,
        }
    }

    /// Coarse estimated time until the next threshold, keyed by level.
    ///
    /// A lookup table rather than a computed ETA; `Normal` has none.
    #[must_use]
    pub fn time_to_threshold(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::Notice => Some("1\u{2013}2 hours"),
            Self::Watch => Some("30\u{2013}60 minutes"),
            Self::Alert => Some("15\u{2013}30 minutes"),
        }
    }

    /// Stable string form used for persistence and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Notice => "notice",
            Self::Watch => "watch",
            Self::Alert => "alert",
        }
    }
}

/// A persisted record of one dysregulation episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEvent {
    pub id: WarningEventId,
    /// When the episode began.
    pub opened_at: Timestamp,
    /// `100 − regulation score` at open time.
    pub intensity: u8,
    /// Detected patterns at open time, or [`GENERIC_TRIGGER`].
    pub triggers: Vec<String>,
    /// Strategy the user applied, when resolution was explicit.
    pub applied_strategy: Option<StrategyId>,
    /// When the episode ended; `None` while open.
    pub closed_at: Option<Timestamp>,
    /// How the episode was resolved.
    pub resolution_notes: Option<String>,
}

impl WarningEvent {
    /// Open a new event for a regulation score that crossed the threshold.
    ///
    /// `intensity` is `100 − score`; an empty pattern list is replaced by
    /// the generic trigger so the record always names a cause.
    #[must_use]
    pub fn open(score: u8, triggers: Vec<String>, opened_at: Timestamp) -> Self {
        let triggers = if triggers.is_empty() {
            vec![GENERIC_TRIGGER.to_string()]
        } else {
            triggers
        };

        Self {
            id: WarningEventId::new(),
            opened_at,
            intensity: 100u8.saturating_sub(score),
            triggers,
            applied_strategy: None,
            closed_at: None,
            resolution_notes: None,
        }
    }

    /// Whether the episode is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Close the event because the regulation score recovered on its own.
    pub fn close_automatic(&mut self, closed_at: Timestamp) {
        self.closed_at = Some(closed_at);
        self.resolution_notes = Some("resolved automatically".to_string());
    }

    /// Close the event because the user applied a coping strategy.
    pub fn close_with_strategy(&mut self, strategy: StrategyId, closed_at: Timestamp) {
        self.applied_strategy = Some(strategy);
        self.closed_at = Some(closed_at);
        self.resolution_notes = Some("resolved with strategy".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_map_risk_bands_to_levels() {
        assert_eq!(WarningLevel::from_risk(0), WarningLevel::Normal);
        assert_eq!(WarningLevel::from_risk(25), WarningLevel::Normal);
        assert_eq!(WarningLevel::from_risk(26), WarningLevel::Notice);
        assert_eq!(WarningLevel::from_risk(50), WarningLevel::Notice);
        assert_eq!(WarningLevel::from_risk(51), WarningLevel::Watch);
        assert_eq!(WarningLevel::from_risk(75), WarningLevel::Watch);
        assert_eq!(WarningLevel::from_risk(76), WarningLevel::Alert);
        assert_eq!(WarningLevel::from_risk(100), WarningLevel::Alert);
    }

    #[test]
    fn should_order_levels_by_severity() {
        assert!(WarningLevel::Normal < WarningLevel::Notice);
        assert!(WarningLevel::Notice < WarningLevel::Watch);
        assert!(WarningLevel::Watch < WarningLevel::Alert);
    }

    #[test]
    fn should_provide_time_to_threshold_for_non_normal_levels() {
        assert!(WarningLevel::Normal.time_to_threshold().is_none());
        assert_eq!(
            WarningLevel::Alert.time_to_threshold(),
            Some("15\u{2013}30 minutes")
        );
        assert_eq!(
            WarningLevel::Watch.time_to_threshold(),
            Some("30\u{2013}60 minutes")
        );
        assert_eq!(
            WarningLevel::Notice.time_to_threshold(),
            Some("1\u{2013}2 hours")
        );
    }

    #[test]
    fn should_open_event_with_intensity_complement_of_score() {
        let event = WarningEvent::open(62, vec!["Heart rate trending upward".to_string()], now());
        assert_eq!(event.intensity, 38);
        assert!(event.is_open());
        assert!(event.applied_strategy.is_none());
    }

    #[test]
    fn should_substitute_generic_trigger_when_patterns_empty() {
        let event = WarningEvent::open(55, Vec::new(), now());
        assert_eq!(event.triggers, vec![GENERIC_TRIGGER.to_string()]);
    }

    #[test]
    fn should_close_automatically_with_note() {
        let mut event = WarningEvent::open(60, Vec::new(), now());
        event.close_automatic(now());
        assert!(!event.is_open());
        assert_eq!(
            event.resolution_notes.as_deref(),
            Some("resolved automatically")
        );
        assert!(event.applied_strategy.is_none());
    }

    #[test]
    fn should_close_with_strategy_and_stamp_it() {
        let strategy = StrategyId::new();
        let mut event = WarningEvent::open(60, Vec::new(), now());
        event.close_with_strategy(strategy, now());
        assert!(!event.is_open());
        assert_eq!(event.applied_strategy, Some(strategy));
        assert_eq!(
            event.resolution_notes.as_deref(),
            Some("resolved with strategy")
        );
    }

    #[test]
    fn should_saturate_intensity_when_score_above_hundred_complement() {
        let event = WarningEvent::open(0, Vec::new(), now());
        assert_eq!(event.intensity, 100);
    }
}
