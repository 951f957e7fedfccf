//! Domain error types.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// The kind of entity a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A board (one per project).
    Board,
    /// A column on a board.
    Column,
    /// A card in a column.
    Card,
    /// A project known to the membership resolver.
    Project,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Board => "board",
            Self::Column => "column",
            Self::Card => "card",
            Self::Project => "project",
        };
        f.write_str(name)
    }
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced board, column, card or project does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        entity: EntityKind,
        /// The identifier that was looked up.
        id: Uuid,
    },

    /// Accepting one more card would exceed the column's WIP limit.
    #[error("column {column_id} is at its WIP limit ({current}/{limit})")]
    CapacityExceeded {
        /// The column that refused the card.
        column_id: Uuid,
        /// The column's configured limit.
        limit: u32,
        /// Number of cards resident when the check ran.
        current: usize,
    },

    /// Malformed operation arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Optimistic concurrency conflict on a board.
    #[error("concurrency conflict on board {board_id}: expected version {expected}, found {actual}")]
    Conflict {
        /// The board that had the conflict.
        board_id: Uuid,
        /// The version the writer read.
        expected: i64,
        /// The version found at commit time.
        actual: i64,
    },

    /// The caller's view of a card's column is out of date.
    #[error("card {card_id} is in column {actual}, not {expected}")]
    StaleSource {
        /// The card being moved.
        card_id: Uuid,
        /// The source column the caller believed the card was in.
        expected: Uuid,
        /// The column the card is actually in.
        actual: Uuid,
    },

    /// The storage collaborator failed or timed out.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl DomainError {
    /// Shorthand for a missing entity.
    #[must_use]
    pub fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether re-running the whole transaction against fresh state may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
