//! In-process `BoardStore`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use kanban_board::domain::repository::{BoardSnapshot, BoardStore};
use kanban_core::error::{DomainError, EntityKind};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    boards: HashMap<Uuid, BoardSnapshot>,
    by_project: HashMap<Uuid, Uuid>,
    owners: HashMap<Uuid, Uuid>,
}

/// A board store held in process memory.
///
/// Every operation takes one lock, so a commit is a single atomic
/// compare-and-swap on the board's version.
#[derive(Debug, Default)]
pub struct InMemoryBoardStore {
    tables: Mutex<Tables>,
}

impl InMemoryBoardStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, DomainError> {
        self.tables
            .lock()
            .map_err(|_| DomainError::StorageUnavailable("board store lock poisoned".into()))
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    async fn load_board(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError> {
        Ok(self.tables()?.boards.get(&board_id).cloned())
    }

    async fn find_board_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError> {
        let tables = self.tables()?;
        Ok(tables
            .by_project
            .get(&project_id)
            .and_then(|board_id| tables.boards.get(board_id))
            .cloned())
    }

    async fn create_board(&self, board: BoardSnapshot) -> Result<BoardSnapshot, DomainError> {
        let mut guard = self.tables()?;
        let tables = &mut *guard;
        if let Some(existing) = tables
            .by_project
            .get(&board.project_id)
            .and_then(|board_id| tables.boards.get(board_id))
        {
            return Ok(existing.clone());
        }
        tables.by_project.insert(board.project_id, board.board_id);
        for entity_id in board.entity_ids() {
            tables.owners.insert(entity_id, board.board_id);
        }
        tables.boards.insert(board.board_id, board.clone());
        Ok(board)
    }

    async fn locate(&self, entity_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        Ok(self.tables()?.owners.get(&entity_id).copied())
    }

    async fn commit_board(
        &self,
        board: &BoardSnapshot,
        expected_version: i64,
    ) -> Result<i64, DomainError> {
        let mut guard = self.tables()?;
        let tables = &mut *guard;
        let stored = tables
            .boards
            .get(&board.board_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Board, board.board_id))?;
        if stored.version != expected_version {
            return Err(DomainError::Conflict {
                board_id: board.board_id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        for entity_id in stored.entity_ids() {
            tables.owners.remove(&entity_id);
        }
        for entity_id in board.entity_ids() {
            tables.owners.insert(entity_id, board.board_id);
        }
        let mut next = board.clone();
        next.version = expected_version + 1;
        tables.boards.insert(board.board_id, next);
        Ok(expected_version + 1)
    }
}
