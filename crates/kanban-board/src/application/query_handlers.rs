//! Query handlers for the board engine.
//!
//! These read a board snapshot from the store and return ordered,
//! serializable views. They never write.

use kanban_core::error::{DomainError, EntityKind};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::Board;
use crate::domain::model::Card;
use crate::domain::repository::{BoardSnapshot, BoardStore};

/// Read-only view of a column and its cards.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnView {
    /// Column identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// WIP limit; `0` means unlimited.
    pub wip_limit: u32,
    /// Ordering key among sibling columns.
    pub position: f64,
    /// Cards in read order.
    pub cards: Vec<Card>,
}

/// Read-only view of a board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    /// Board identifier.
    pub board_id: Uuid,
    /// The owning project.
    pub project_id: Uuid,
    /// Commit counter.
    pub version: i64,
    /// Columns in read order.
    pub columns: Vec<ColumnView>,
}

impl From<BoardSnapshot> for BoardView {
    fn from(snapshot: BoardSnapshot) -> Self {
        let board_id = snapshot.board_id;
        let project_id = snapshot.project_id;
        let version = snapshot.version;
        let board = Board::from_snapshot(snapshot);
        let columns = board
            .columns()
            .into_iter()
            .map(|column| ColumnView {
                id: column.id,
                title: column.title.clone(),
                wip_limit: column.wip_limit,
                position: column.position,
                cards: board.cards_in(column.id).into_iter().cloned().collect(),
            })
            .collect();
        Self {
            board_id,
            project_id,
            version,
            columns,
        }
    }
}

/// Retrieves a board by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the board does not exist.
pub async fn get_board(board_id: Uuid, store: &dyn BoardStore) -> Result<BoardView, DomainError> {
    store
        .load_board(board_id)
        .await?
        .map(BoardView::from)
        .ok_or_else(|| DomainError::not_found(EntityKind::Board, board_id))
}

/// Retrieves the board of a project without creating it.
///
/// # Errors
///
/// Returns `DomainError::NotFound` (for the project) if it has no board yet.
pub async fn get_board_for_project(
    project_id: Uuid,
    store: &dyn BoardStore,
) -> Result<BoardView, DomainError> {
    store
        .find_board_by_project(project_id)
        .await?
        .map(BoardView::from)
        .ok_or_else(|| DomainError::not_found(EntityKind::Project, project_id))
}

/// Retrieves a single card.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the card does not exist.
pub async fn get_card(card_id: Uuid, store: &dyn BoardStore) -> Result<Card, DomainError> {
    let missing = || DomainError::not_found(EntityKind::Card, card_id);
    let board_id = store.locate(card_id).await?.ok_or_else(missing)?;
    let snapshot = store.load_board(board_id).await?.ok_or_else(missing)?;
    snapshot
        .cards
        .into_iter()
        .find(|card| card.id == card_id)
        .ok_or_else(missing)
}
