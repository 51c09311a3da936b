//! Error types for pot construction and pot operations.

use thiserror::Error;

use crate::config::Policy;
use crate::event::SavageId;

/// Rejected configuration. Raised by [`crate::Pot::new`] before any actor starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pot capacity must be positive")]
    ZeroCapacity,

    #[error("at least one savage is required")]
    NoConsumers,

    #[error("service limit must be positive when set")]
    ZeroServiceLimit,

    #[error("service limit is only supported with the turn-ordered policy")]
    LimitWithoutTurns,

    #[error("unknown policy '{0}', expected 'unordered' or 'turn-ordered'")]
    UnknownPolicy(String),
}

/// Outcome of a pot operation that did not produce a serving or a refill.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PotError {
    /// The caller's cancellation token fired. Not a failure.
    #[error("cancelled")]
    Cancelled,

    /// A turn-ordered pot reached its service limit.
    #[error("pot closed after reaching its service limit")]
    Closed,

    #[error("savage {id} does not exist (pot seats {consumers})")]
    UnknownSavage { id: SavageId, consumers: usize },

    #[error("operation requires the {expected} policy but the pot uses {actual}")]
    WrongPolicy { expected: Policy, actual: Policy },
}

impl PotError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
