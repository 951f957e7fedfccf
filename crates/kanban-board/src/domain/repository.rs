//! Storage collaborator abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kanban_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{Card, Column};

/// Everything stored for one board: the unit of atomic commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Board identifier.
    pub board_id: Uuid,
    /// The project owning the board (1:1).
    pub project_id: Uuid,
    /// Commit counter; `0` for a board that has never been mutated.
    pub version: i64,
    /// When the board was created.
    pub created_at: DateTime<Utc>,
    /// All columns, in no particular order.
    pub columns: Vec<Column>,
    /// All cards, in no particular order.
    pub cards: Vec<Card>,
}

impl BoardSnapshot {
    /// An empty board for `project_id`.
    #[must_use]
    pub fn empty(board_id: Uuid, project_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            board_id,
            project_id,
            version: 0,
            created_at,
            columns: Vec::new(),
            cards: Vec::new(),
        }
    }

    /// Ids of every column and card on the board.
    pub fn entity_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.columns
            .iter()
            .map(|c| c.id)
            .chain(self.cards.iter().map(|c| c.id))
    }
}

/// Durable store for boards with a transactional read-modify-write primitive.
///
/// Implementations commit a whole board at once and reject the commit when
/// another writer got there first, so concurrent mutators never interleave
/// partial changes.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Reads the columns and cards of a board in one consistent snapshot.
    async fn load_board(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError>;

    /// Reads the board belonging to a project, if it exists.
    async fn find_board_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError>;

    /// Inserts `board` unless its project already has one; returns the
    /// project's board either way.
    async fn create_board(&self, board: BoardSnapshot) -> Result<BoardSnapshot, DomainError>;

    /// Returns the board holding the column or card with `entity_id`.
    async fn locate(&self, entity_id: Uuid) -> Result<Option<Uuid>, DomainError>;

    /// Replaces the stored board atomically if its version still equals
    /// `expected_version`, and returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` when the stored version differs,
    /// `DomainError::NotFound` when the board is gone.
    async fn commit_board(
        &self,
        board: &BoardSnapshot,
        expected_version: i64,
    ) -> Result<i64, DomainError>;
}
