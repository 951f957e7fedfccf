//! `PostgreSQL` implementation of the `BoardStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kanban_board::domain::model::{Card, Column};
use kanban_board::domain::repository::{BoardSnapshot, BoardStore};
use kanban_core::error::{DomainError, EntityKind};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::schema::CREATE_BOARD_TABLES;

/// JSONB body of a `boards` row.
#[derive(Debug, Serialize, Deserialize)]
struct BoardState {
    columns: Vec<Column>,
    cards: Vec<Card>,
}

/// PostgreSQL-backed board store.
///
/// A commit is one `UPDATE ... WHERE version = $expected` inside a
/// transaction that also rewrites the board's entity index, so a concurrent
/// writer either sees the whole new board or fails its own version check.
#[derive(Debug, Clone)]
pub struct PgBoardStore {
    pool: PgPool,
}

impl PgBoardStore {
    /// Creates a new `PgBoardStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the board tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if the DDL fails.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_BOARD_TABLES)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> DomainError {
    DomainError::StorageUnavailable(err.to_string())
}

fn snapshot_from_row(row: &PgRow) -> Result<BoardSnapshot, DomainError> {
    let Json(state): Json<BoardState> = row.try_get("state").map_err(unavailable)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(unavailable)?;
    Ok(BoardSnapshot {
        board_id: row.try_get("board_id").map_err(unavailable)?,
        project_id: row.try_get("project_id").map_err(unavailable)?,
        version: row.try_get("version").map_err(unavailable)?,
        created_at,
        columns: state.columns,
        cards: state.cards,
    })
}

fn state_of(board: &BoardSnapshot) -> Json<BoardState> {
    Json(BoardState {
        columns: board.columns.clone(),
        cards: board.cards.clone(),
    })
}

const SELECT_BOARD: &str =
    "SELECT board_id, project_id, version, created_at, state FROM boards";

#[async_trait]
impl BoardStore for PgBoardStore {
    async fn load_board(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError> {
        let row = sqlx::query(&format!("{SELECT_BOARD} WHERE board_id = $1"))
            .bind(board_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    async fn find_board_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError> {
        let row = sqlx::query(&format!("{SELECT_BOARD} WHERE project_id = $1"))
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    async fn create_board(&self, board: BoardSnapshot) -> Result<BoardSnapshot, DomainError> {
        let inserted = sqlx::query(
            "INSERT INTO boards (board_id, project_id, version, created_at, state)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (project_id) DO NOTHING",
        )
        .bind(board.board_id)
        .bind(board.project_id)
        .bind(board.version)
        .bind(board.created_at)
        .bind(state_of(&board))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        debug!(
            project_id = %board.project_id,
            inserted = inserted.rows_affected(),
            "create board"
        );

        self.find_board_by_project(board.project_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Project, board.project_id))
    }

    async fn locate(&self, entity_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        sqlx::query_scalar("SELECT board_id FROM board_entities WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn commit_board(
        &self,
        board: &BoardSnapshot,
        expected_version: i64,
    ) -> Result<i64, DomainError> {
        let next_version = expected_version + 1;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let updated = sqlx::query(
            "UPDATE boards SET version = $1, state = $2
             WHERE board_id = $3 AND version = $4",
        )
        .bind(next_version)
        .bind(state_of(board))
        .bind(board.board_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM boards WHERE board_id = $1")
                    .bind(board.board_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(unavailable)?;
            tx.rollback().await.map_err(unavailable)?;
            return Err(match actual {
                Some(actual) => DomainError::Conflict {
                    board_id: board.board_id,
                    expected: expected_version,
                    actual,
                },
                None => DomainError::not_found(EntityKind::Board, board.board_id),
            });
        }

        sqlx::query("DELETE FROM board_entities WHERE board_id = $1")
            .bind(board.board_id)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        let entity_ids: Vec<Uuid> = board.entity_ids().collect();
        sqlx::query(
            "INSERT INTO board_entities (entity_id, board_id)
             SELECT entity_id, $2 FROM UNNEST($1::uuid[]) AS entity_id",
        )
        .bind(entity_ids)
        .bind(board.board_id)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        Ok(next_version)
    }
}
