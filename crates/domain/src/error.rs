//! Common error types used across the workspace.
//!
//! Each layer defines its own typed error and converts into [`KeelError`]
//! at the port boundary. Transport and storage failures carry their source
//! boxed so adapter crates never leak concrete error types upward.

/// Top-level error for the keel workspace.
#[derive(Debug, thiserror::Error)]
pub enum KeelError {
    /// A domain invariant was violated at a submission boundary.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The persistence collaborator failed. Retryable; the scoring
    /// pipeline is never blocked by it.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The device transport failed (scan timeout, connect failure,
    /// unexpected disconnect). Always recoverable.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant violation, rejected before data reaches the engine.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A numeric field is outside its allowed range.
    #[error("{field} must be at most {max}, got {actual}")]
    OutOfRange {
        /// Field name (e.g. `"stress"`).
        field: &'static str,
        /// Inclusive upper bound.
        max: u16,
        /// The rejected value.
        actual: u16,
    },

    /// A floating-point field is negative or not finite.
    #[error("{field} must be a finite non-negative number")]
    NotFinite {
        /// Field name (e.g. `"hrv_ms"`).
        field: &'static str,
    },

    /// A name field was empty.
    #[error("name must not be empty")]
    EmptyName,
}

/// A lookup by identifier found nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Record kind (e.g. `"Strategy"`).
    pub entity: &'static str,
    /// The identifier that missed.
    pub id: String,
}
