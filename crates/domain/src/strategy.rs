//! Coping strategies — interventions with a reinforced effectiveness rating.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::StrategyId;

/// Upper bound of the effectiveness rating scale.
pub const MAX_EFFECTIVENESS: u8 = 5;

/// An intervention the user can apply during an open warning event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopingStrategy {
    pub id: StrategyId,
    pub name: String,
    /// Free-form grouping (e.g. `"breathing"`, `"sensory"`).
    pub category: String,
    /// Rating 0–[`MAX_EFFECTIVENESS`], reinforced each time the strategy
    /// resolves an event.
    pub effectiveness: u8,
}

impl CopingStrategy {
    /// Create a strategy with a fresh id and a zero rating.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when `name` is empty.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self {
            id: StrategyId::new(),
            name,
            category: category.into(),
            effectiveness: 0,
        })
    }

    /// Raise the effectiveness rating by one step, capped at the maximum.
    ///
    /// A simple feedback loop, not a learning model: applying the strategy
    /// to resolve an event counts as one reinforcement.
    pub fn reinforce(&mut self) {
        self.effectiveness = (self.effectiveness + 1).min(MAX_EFFECTIVENESS);
    }
}
