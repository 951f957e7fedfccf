//! Test stores — `BoardStore` doubles that fail, stall or race on purpose.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kanban_board::domain::repository::{BoardSnapshot, BoardStore};
use kanban_core::error::DomainError;
use tokio::sync::Barrier;
use uuid::Uuid;

/// A board store that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingBoardStore;

fn refused() -> DomainError {
    DomainError::StorageUnavailable("connection refused".into())
}

#[async_trait]
impl BoardStore for FailingBoardStore {
    async fn load_board(&self, _board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError> {
        Err(refused())
    }

    async fn find_board_by_project(
        &self,
        _project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError> {
        Err(refused())
    }

    async fn create_board(&self, _board: BoardSnapshot) -> Result<BoardSnapshot, DomainError> {
        Err(refused())
    }

    async fn locate(&self, _entity_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        Err(refused())
    }

    async fn commit_board(
        &self,
        _board: &BoardSnapshot,
        _expected_version: i64,
    ) -> Result<i64, DomainError> {
        Err(refused())
    }
}

/// Reads go to `inner`; commits never complete.
pub struct StalledBoardStore {
    inner: Arc<dyn BoardStore>,
}

impl StalledBoardStore {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn BoardStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BoardStore for StalledBoardStore {
    async fn load_board(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError> {
        self.inner.load_board(board_id).await
    }

    async fn find_board_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError> {
        self.inner.find_board_by_project(project_id).await
    }

    async fn create_board(&self, board: BoardSnapshot) -> Result<BoardSnapshot, DomainError> {
        self.inner.create_board(board).await
    }

    async fn locate(&self, entity_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        self.inner.locate(entity_id).await
    }

    async fn commit_board(
        &self,
        _board: &BoardSnapshot,
        _expected_version: i64,
    ) -> Result<i64, DomainError> {
        std::future::pending().await
    }
}

/// Fails the first `conflicts` commits with `Conflict`, then delegates to
/// `inner`. Counts every commit attempt.
pub struct ConflictingBoardStore {
    inner: Arc<dyn BoardStore>,
    conflicts_remaining: AtomicUsize,
    commit_attempts: AtomicUsize,
}

impl ConflictingBoardStore {
    /// Wraps `inner`, failing the first `conflicts` commits.
    #[must_use]
    pub fn new(inner: Arc<dyn BoardStore>, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts_remaining: AtomicUsize::new(conflicts),
            commit_attempts: AtomicUsize::new(0),
        }
    }

    /// Wraps `inner`, failing every commit.
    #[must_use]
    pub fn always(inner: Arc<dyn BoardStore>) -> Self {
        Self::new(inner, usize::MAX)
    }

    /// Number of `commit_board` calls seen so far.
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BoardStore for ConflictingBoardStore {
    async fn load_board(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError> {
        self.inner.load_board(board_id).await
    }

    async fn find_board_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError> {
        self.inner.find_board_by_project(project_id).await
    }

    async fn create_board(&self, board: BoardSnapshot) -> Result<BoardSnapshot, DomainError> {
        self.inner.create_board(board).await
    }

    async fn locate(&self, entity_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        self.inner.locate(entity_id).await
    }

    async fn commit_board(
        &self,
        board: &BoardSnapshot,
        expected_version: i64,
    ) -> Result<i64, DomainError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let conflicted = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(DomainError::Conflict {
                board_id: board.board_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.commit_board(board, expected_version).await
    }
}

/// Holds the first `parties` board loads at a barrier until all of them
/// have read, so concurrent transactions start from the same version.
/// Later loads pass straight through.
pub struct LockstepBoardStore {
    inner: Arc<dyn BoardStore>,
    barrier: Barrier,
    gated_loads: AtomicUsize,
}

impl LockstepBoardStore {
    /// Wraps `inner`, gating the first `parties` loads together.
    #[must_use]
    pub fn new(inner: Arc<dyn BoardStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            gated_loads: AtomicUsize::new(parties),
        }
    }
}

#[async_trait]
impl BoardStore for LockstepBoardStore {
    async fn load_board(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, DomainError> {
        let loaded = self.inner.load_board(board_id).await;
        let gated = self
            .gated_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if gated {
            self.barrier.wait().await;
        }
        loaded
    }

    async fn find_board_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<BoardSnapshot>, DomainError> {
        self.inner.find_board_by_project(project_id).await
    }

    async fn create_board(&self, board: BoardSnapshot) -> Result<BoardSnapshot, DomainError> {
        self.inner.create_board(board).await
    }

    async fn locate(&self, entity_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        self.inner.locate(entity_id).await
    }

    async fn commit_board(
        &self,
        board: &BoardSnapshot,
        expected_version: i64,
    ) -> Result<i64, DomainError> {
        self.inner.commit_board(board, expected_version).await
    }
}
