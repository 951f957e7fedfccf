//! Command handlers for the board engine.
//!
//! `BoardMutator` is the single entry point for structural changes. Each
//! operation runs as one transaction against the store: load the board,
//! apply the command to the aggregate, commit with an optimistic version
//! check. A lost race re-runs the whole transaction on fresh state, up to
//! `MutatorConfig::max_attempts` times.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kanban_core::aggregate::AggregateRoot;
use kanban_core::clock::Clock;
use kanban_core::command::Command;
use kanban_core::error::{DomainError, EntityKind};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Board, ChangeContext};
use crate::domain::commands::{
    CreateCard, CreateColumn, DeleteCard, DeleteColumn, MoveCard, ReorderColumns, UpdateCard,
    UpdateColumn,
};
use crate::domain::events::BoardEvent;
use crate::domain::model::{Card, Column, DEFAULT_WIP_LIMIT};
use crate::domain::repository::{BoardSnapshot, BoardStore};

/// Tunables for the mutator.
#[derive(Debug, Clone)]
pub struct MutatorConfig {
    /// WIP limit for columns created without one.
    pub default_wip_limit: u32,
    /// Transaction attempts before a `Conflict` is surfaced.
    pub max_attempts: u32,
    /// Upper bound on each individual store call.
    pub storage_timeout: Duration,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            default_wip_limit: DEFAULT_WIP_LIMIT,
            max_attempts: 5,
            storage_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of a successfully committed command.
#[derive(Debug)]
pub struct BoardCommandResult<T> {
    /// The board the command changed.
    pub board_id: Uuid,
    /// The project owning the board.
    pub project_id: Uuid,
    /// Board version after the commit.
    pub version: i64,
    /// The operation's output entity or entities.
    pub output: T,
    /// Change records in the order they were produced.
    pub events: Vec<BoardEvent>,
}

/// Applies board commands transactionally.
#[derive(Clone)]
pub struct BoardMutator {
    store: Arc<dyn BoardStore>,
    clock: Arc<dyn Clock>,
    config: MutatorConfig,
}

impl BoardMutator {
    /// Creates a mutator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn BoardStore>, clock: Arc<dyn Clock>, config: MutatorConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// A copy of this mutator whose store calls are bounded by `timeout`.
    #[must_use]
    pub fn with_storage_timeout(&self, timeout: Duration) -> Self {
        let mut mutator = self.clone();
        mutator.config.storage_timeout = timeout;
        mutator
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &MutatorConfig {
        &self.config
    }

    /// Returns the project's board, creating an empty one on first access.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if the store fails.
    #[instrument(skip(self))]
    pub async fn ensure_board(&self, project_id: Uuid) -> Result<BoardSnapshot, DomainError> {
        if let Some(existing) = self
            .bounded(self.store.find_board_by_project(project_id))
            .await?
        {
            return Ok(existing);
        }
        let fresh = BoardSnapshot::empty(Uuid::now_v7(), project_id, self.clock.now());
        let board = self.bounded(self.store.create_board(fresh)).await?;
        info!(board_id = %board.board_id, "board ready");
        Ok(board)
    }

    /// Appends a column to a board.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown board,
    /// `DomainError::InvalidInput` for a blank title, plus the transaction
    /// errors described on [`BoardMutator::transact`].
    #[instrument(skip(self, command), fields(board_id = %command.board_id))]
    pub async fn create_column(
        &self,
        command: &CreateColumn,
    ) -> Result<BoardCommandResult<Column>, DomainError> {
        let wip_limit = command
            .wip_limit
            .unwrap_or(self.config.default_wip_limit);
        self.transact(command.board_id, command, |board, ctx| {
            board.create_column(&command.title, wip_limit, ctx)
        })
        .await
    }

    /// Reassigns column positions to match `command.column_ids`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` unless the ids are exactly the
    /// board's column ids.
    #[instrument(skip(self, command), fields(board_id = %command.board_id))]
    pub async fn reorder_columns(
        &self,
        command: &ReorderColumns,
    ) -> Result<BoardCommandResult<Vec<Column>>, DomainError> {
        self.transact(command.board_id, command, |board, ctx| {
            board.reorder_columns(&command.column_ids, ctx)?;
            Ok(board.columns().into_iter().cloned().collect())
        })
        .await
    }

    /// Changes a column's title or WIP limit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown column.
    #[instrument(skip(self, command), fields(column_id = %command.column_id))]
    pub async fn update_column(
        &self,
        command: &UpdateColumn,
    ) -> Result<BoardCommandResult<Column>, DomainError> {
        let board_id = self.board_of(command.column_id, EntityKind::Column).await?;
        self.transact(board_id, command, |board, ctx| {
            board.update_column(command.column_id, &command.patch, ctx)
        })
        .await
    }

    /// Deletes a column and its cards; the output lists the deleted card ids.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown column.
    #[instrument(skip(self, command), fields(column_id = %command.column_id))]
    pub async fn delete_column(
        &self,
        command: &DeleteColumn,
    ) -> Result<BoardCommandResult<Vec<Uuid>>, DomainError> {
        let board_id = self.board_of(command.column_id, EntityKind::Column).await?;
        self.transact(board_id, command, |board, ctx| {
            board.delete_column(command.column_id, ctx)
        })
        .await
    }

    /// Creates a card after consulting the WIP guard of its column.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown column and
    /// `DomainError::CapacityExceeded` when the column is full.
    #[instrument(skip(self, command), fields(column_id = %command.column_id))]
    pub async fn create_card(
        &self,
        command: &CreateCard,
    ) -> Result<BoardCommandResult<Card>, DomainError> {
        let board_id = self.board_of(command.column_id, EntityKind::Column).await?;
        self.transact(board_id, command, |board, ctx| {
            board.create_card(
                command.column_id,
                command.attributes.clone(),
                command.index,
                ctx,
            )
        })
        .await
    }

    /// Changes a card's descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown card.
    #[instrument(skip(self, command), fields(card_id = %command.card_id))]
    pub async fn update_card(
        &self,
        command: &UpdateCard,
    ) -> Result<BoardCommandResult<Card>, DomainError> {
        let board_id = self.board_of(command.card_id, EntityKind::Card).await?;
        self.transact(board_id, command, |board, ctx| {
            board.update_card(command.card_id, command.patch.clone(), ctx)
        })
        .await
    }

    /// Moves a card; the output is the card at its final column and key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown card or destination,
    /// `DomainError::InvalidInput` when the destination is on another board,
    /// `DomainError::StaleSource` and `DomainError::CapacityExceeded` as
    /// described on [`Board::move_card`].
    #[instrument(
        skip(self, command),
        fields(card_id = %command.card_id, destination = %command.destination_column_id)
    )]
    pub async fn move_card(
        &self,
        command: &MoveCard,
    ) -> Result<BoardCommandResult<Card>, DomainError> {
        let board_id = self.board_of(command.card_id, EntityKind::Card).await?;
        let destination_board = self
            .board_of(command.destination_column_id, EntityKind::Column)
            .await?;
        if destination_board != board_id {
            return Err(DomainError::InvalidInput(format!(
                "column {} is not on the board of card {}",
                command.destination_column_id, command.card_id
            )));
        }
        self.transact(board_id, command, |board, ctx| {
            board.move_card(
                command.card_id,
                command.destination_column_id,
                command.destination_index,
                command.expected_source_column_id,
                ctx,
            )
        })
        .await
    }

    /// Deletes a card; the output is the card as it was.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown card.
    #[instrument(skip(self, command), fields(card_id = %command.card_id))]
    pub async fn delete_card(
        &self,
        command: &DeleteCard,
    ) -> Result<BoardCommandResult<Card>, DomainError> {
        let board_id = self.board_of(command.card_id, EntityKind::Card).await?;
        self.transact(board_id, command, |board, ctx| {
            board.delete_card(command.card_id, ctx)
        })
        .await
    }

    /// Runs `mutation` against a consistent snapshot of `board_id` and
    /// commits the result atomically.
    ///
    /// Nothing is written unless `mutation` succeeds and the commit's
    /// version check passes. Dropping the returned future before the commit
    /// call leaves the board untouched.
    ///
    /// # Errors
    ///
    /// Returns whatever `mutation` returns, `DomainError::NotFound` for an
    /// unknown board, `DomainError::Conflict` once retries are exhausted, and
    /// `DomainError::StorageUnavailable` on store failure or timeout.
    pub async fn transact<T, F>(
        &self,
        board_id: Uuid,
        command: &dyn Command,
        mut mutation: F,
    ) -> Result<BoardCommandResult<T>, DomainError>
    where
        F: FnMut(&mut Board, &ChangeContext<'_>) -> Result<T, DomainError> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let snapshot = self
                .bounded(self.store.load_board(board_id))
                .await?
                .ok_or_else(|| DomainError::not_found(EntityKind::Board, board_id))?;
            let mut board = Board::from_snapshot(snapshot);
            let ctx = ChangeContext {
                correlation_id: command.correlation_id(),
                actor_id: command.actor_id(),
                clock: self.clock.as_ref(),
            };

            let output = mutation(&mut board, &ctx)?;

            let commit = self
                .bounded(self.store.commit_board(&board.to_snapshot(), board.version()))
                .await;
            match commit {
                Ok(version) => {
                    let events = board.take_uncommitted_events();
                    info!(
                        command = command.command_type(),
                        correlation_id = %command.correlation_id(),
                        version,
                        events = events.len(),
                        "board mutation committed"
                    );
                    return Ok(BoardCommandResult {
                        board_id,
                        project_id: board.project_id,
                        version,
                        output,
                        events,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    debug!(attempt, error = %err, "commit lost a race, retrying");
                }
                Err(err) => {
                    warn!(
                        command = command.command_type(),
                        attempt,
                        error = %err,
                        "board mutation failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn board_of(&self, entity_id: Uuid, entity: EntityKind) -> Result<Uuid, DomainError> {
        self.bounded(self.store.locate(entity_id))
            .await?
            .ok_or_else(|| DomainError::not_found(entity, entity_id))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        let timeout = self.config.storage_timeout;
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            DomainError::StorageUnavailable(format!("storage call exceeded {timeout:?}"))
        })?
    }
}
