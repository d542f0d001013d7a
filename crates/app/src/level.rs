//! Warning-level state machine with hysteresis.
//!
//! The risk bands alone never move the reported level out of `Normal`:
//! an episode only begins once the regulation score corroborates by
//! dropping below the opening threshold, and only ends once the score
//! recovers. While an episode is in progress the level follows the risk
//! band (clamped to at least `Notice`) so severity can escalate and
//! de-escalate without flapping back to `Normal` on noisy risk input.

use keel_domain::warning::WarningLevel;

/// Regulation score below which an episode begins.
pub const OPEN_SCORE: u8 = 70;
/// Regulation score at or above which an episode ends.
pub const RECOVER_SCORE: u8 = 70;

/// Outcome of one tracker update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub previous: WarningLevel,
    pub current: WarningLevel,
}

/// Hysteretic mapping from (risk, score) to the reported warning level.
#[derive(Debug, Default)]
pub struct LevelTracker {
    level: WarningLevel,
    acknowledged: bool,
}

impl LevelTracker {
    /// Start at `Normal`, unacknowledged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently reported level.
    #[must_use]
    pub fn level(&self) -> WarningLevel {
        self.level
    }

    /// Whether the user has acknowledged the current warning.
    ///
    /// Acknowledging never changes the level; it only suppresses the
    /// user-visible alert until the level itself changes.
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Suppress the user-visible alert for the current level.
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    /// Feed the latest risk and regulation score through the state
    /// machine, returning the transition if the reported level changed.
    pub fn update(&mut self, risk: u8, score: u8) -> Option<LevelChange> {
        let next = if score >= RECOVER_SCORE {
            WarningLevel::Normal
        } else {
            // Episode in progress: at least Notice, escalating with risk.
            WarningLevel::from_risk(risk).max(WarningLevel::Notice)
        };

        if next == self.level {
            return None;
        }

        let change = LevelChange {
            previous: self.level,
            current: next,
        };
        self.level = next;
        // A level change re-surfaces the alert.
        self.acknowledged = false;
        Some(change)
    }
}
