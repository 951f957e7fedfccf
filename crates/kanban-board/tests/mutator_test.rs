//! Integration tests for `BoardMutator` over real and failing stores.

use std::sync::Arc;
use std::time::Duration;

use kanban_board::application::command_handlers::{BoardMutator, MutatorConfig};
use kanban_board::application::query_handlers::{get_board, get_board_for_project, get_card};
use kanban_board::domain::commands::{
    CreateCard, CreateColumn, DeleteCard, DeleteColumn, MoveCard, ReorderColumns, UpdateCard,
    UpdateColumn,
};
use kanban_board::domain::events::BoardEventKind;
use kanban_board::domain::model::{Card, CardAttributes, CardPatch, Column, ColumnPatch, Priority};
use kanban_board::domain::repository::BoardStore;
use kanban_core::error::{DomainError, EntityKind};
use kanban_core::event::DomainEvent;
use kanban_store::in_memory::InMemoryBoardStore;
use kanban_test_support::{
    ConflictingBoardStore, FailingBoardStore, FixedClock, LockstepBoardStore, StalledBoardStore,
};
use uuid::Uuid;

fn mutator_over(store: Arc<dyn BoardStore>) -> BoardMutator {
    BoardMutator::new(store, Arc::new(FixedClock::default()), MutatorConfig::default())
}

struct Harness {
    store: Arc<InMemoryBoardStore>,
    mutator: BoardMutator,
    board_id: Uuid,
    actor_id: Uuid,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(InMemoryBoardStore::new());
        let mutator = mutator_over(store.clone());
        let board = mutator.ensure_board(Uuid::new_v4()).await.unwrap();
        Self {
            store,
            mutator,
            board_id: board.board_id,
            actor_id: Uuid::new_v4(),
        }
    }

    async fn column(&self, title: &str, wip_limit: u32) -> Column {
        self.mutator
            .create_column(&CreateColumn {
                correlation_id: Uuid::new_v4(),
                actor_id: self.actor_id,
                board_id: self.board_id,
                title: title.into(),
                wip_limit: Some(wip_limit),
            })
            .await
            .unwrap()
            .output
    }

    async fn create_card(&self, column_id: Uuid, title: &str) -> Result<Card, DomainError> {
        self.mutator
            .create_card(&CreateCard {
                correlation_id: Uuid::new_v4(),
                actor_id: self.actor_id,
                column_id,
                attributes: CardAttributes::titled(title),
                index: None,
            })
            .await
            .map(|result| result.output)
    }

    fn move_command(&self, card_id: Uuid, destination_column_id: Uuid, index: usize) -> MoveCard {
        MoveCard {
            correlation_id: Uuid::new_v4(),
            actor_id: self.actor_id,
            card_id,
            expected_source_column_id: None,
            destination_column_id,
            destination_index: index,
        }
    }

    async fn titles_in(&self, column_id: Uuid) -> Vec<String> {
        let view = get_board(self.board_id, self.store.as_ref()).await.unwrap();
        view.columns
            .into_iter()
            .find(|column| column.id == column_id)
            .map(|column| column.cards.into_iter().map(|card| card.title).collect())
            .unwrap_or_default()
    }
}

#[tokio::test]
async fn test_full_column_refuses_card_until_limit_is_raised() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 2).await;
    h.create_card(todo.id, "A").await.unwrap();
    h.create_card(todo.id, "B").await.unwrap();

    // Act
    let refused = h.create_card(todo.id, "C").await;

    // Assert
    match refused {
        Err(DomainError::CapacityExceeded {
            column_id,
            limit,
            current,
        }) => {
            assert_eq!(column_id, todo.id);
            assert_eq!(limit, 2);
            assert_eq!(current, 2);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
    assert_eq!(h.titles_in(todo.id).await, vec!["A", "B"]);

    // Act
    h.mutator
        .update_column(&UpdateColumn {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: todo.id,
            patch: ColumnPatch {
                title: None,
                wip_limit: Some(3),
            },
        })
        .await
        .unwrap();
    h.create_card(todo.id, "C").await.unwrap();

    // Assert
    assert_eq!(h.titles_in(todo.id).await, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_zero_wip_limit_is_unlimited() {
    let h = Harness::new().await;
    let backlog = h.column("Backlog", 0).await;

    for n in 0..10 {
        h.create_card(backlog.id, &format!("card {n}")).await.unwrap();
    }

    assert_eq!(h.titles_in(backlog.id).await.len(), 10);
}

#[tokio::test]
async fn test_create_column_uses_default_wip_limit() {
    let h = Harness::new().await;

    let column = h
        .mutator
        .create_column(&CreateColumn {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            board_id: h.board_id,
            title: "  Review  ".into(),
            wip_limit: None,
        })
        .await
        .unwrap()
        .output;

    assert_eq!(column.wip_limit, 5);
    assert_eq!(column.title, "Review");
}

#[tokio::test]
async fn test_reorder_within_full_column_is_never_capacity_exceeded() {
    // Arrange
    let h = Harness::new().await;
    let doing = h.column("Doing", 2).await;
    h.create_card(doing.id, "A").await.unwrap();
    let b = h.create_card(doing.id, "B").await.unwrap();

    // Act
    let moved = h.mutator.move_card(&h.move_command(b.id, doing.id, 0)).await;

    // Assert
    assert!(moved.is_ok());
    assert_eq!(h.titles_in(doing.id).await, vec!["B", "A"]);
}

#[tokio::test]
async fn test_move_places_card_at_requested_index() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let done = h.column("Done", 5).await;
    let card = h.create_card(todo.id, "X").await.unwrap();
    for title in ["D1", "D2", "D3"] {
        h.create_card(done.id, title).await.unwrap();
    }

    // Act
    let result = h.mutator.move_card(&h.move_command(card.id, done.id, 1)).await.unwrap();

    // Assert
    assert_eq!(result.output.column_id, done.id);
    assert_eq!(h.titles_in(done.id).await, vec!["D1", "X", "D2", "D3"]);
    assert!(h.titles_in(todo.id).await.is_empty());
    match &result.events[0].kind {
        BoardEventKind::CardMoved(moved) => assert_eq!(moved.from_column_id, todo.id),
        other => panic!("expected CardMoved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_move_index_past_end_is_clamped() {
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let a = h.create_card(todo.id, "A").await.unwrap();
    h.create_card(todo.id, "B").await.unwrap();

    h.mutator.move_card(&h.move_command(a.id, todo.id, 99)).await.unwrap();

    assert_eq!(h.titles_in(todo.id).await, vec!["B", "A"]);
}

#[tokio::test]
async fn test_move_with_stale_source_is_rejected_and_changes_nothing() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let done = h.column("Done", 5).await;
    let card = h.create_card(todo.id, "X").await.unwrap();
    let mut command = h.move_command(card.id, todo.id, 0);
    command.expected_source_column_id = Some(done.id);

    // Act
    let result = h.mutator.move_card(&command).await;

    // Assert
    assert!(matches!(result, Err(DomainError::StaleSource { .. })));
    let stored = get_card(card.id, h.store.as_ref()).await.unwrap();
    assert_eq!(stored.column_id, todo.id);
}

#[tokio::test]
async fn test_move_to_column_of_another_board_is_invalid() {
    let h = Harness::new().await;
    let other = Harness {
        store: h.store.clone(),
        mutator: h.mutator.clone(),
        board_id: h.mutator.ensure_board(Uuid::new_v4()).await.unwrap().board_id,
        actor_id: h.actor_id,
    };
    let here = h.column("Here", 5).await;
    let there = other.column("There", 5).await;
    let card = h.create_card(here.id, "X").await.unwrap();

    let result = h.mutator.move_card(&h.move_command(card.id, there.id, 0)).await;

    assert!(matches!(result, Err(DomainError::InvalidInput(_))));
}

#[tokio::test]
async fn test_reorder_columns_applies_permutation_and_rejects_mismatch() {
    // Arrange
    let h = Harness::new().await;
    let a = h.column("A", 5).await;
    let b = h.column("B", 5).await;
    let c = h.column("C", 5).await;
    let reorder = |column_ids: Vec<Uuid>| ReorderColumns {
        correlation_id: Uuid::new_v4(),
        actor_id: h.actor_id,
        board_id: h.board_id,
        column_ids,
    };

    // Act
    let result = h
        .mutator
        .reorder_columns(&reorder(vec![c.id, a.id, b.id]))
        .await
        .unwrap();

    // Assert
    let ids: Vec<Uuid> = result.output.iter().map(|column| column.id).collect();
    assert_eq!(ids, vec![c.id, a.id, b.id]);

    // Act
    let missing = h.mutator.reorder_columns(&reorder(vec![c.id, a.id])).await;
    let duplicated = h
        .mutator
        .reorder_columns(&reorder(vec![c.id, a.id, a.id]))
        .await;

    // Assert
    assert!(matches!(missing, Err(DomainError::InvalidInput(_))));
    assert!(matches!(duplicated, Err(DomainError::InvalidInput(_))));
    let view = get_board(h.board_id, h.store.as_ref()).await.unwrap();
    let ids: Vec<Uuid> = view.columns.iter().map(|column| column.id).collect();
    assert_eq!(ids, vec![c.id, a.id, b.id]);
}

#[tokio::test]
async fn test_delete_column_emits_card_deletions_before_column_deletion() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let a = h.create_card(todo.id, "A").await.unwrap();
    let b = h.create_card(todo.id, "B").await.unwrap();

    // Act
    let result = h
        .mutator
        .delete_column(&DeleteColumn {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: todo.id,
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(result.output, vec![a.id, b.id]);
    let types: Vec<&str> = result.events.iter().map(DomainEvent::event_type).collect();
    assert_eq!(types, vec!["card-deleted", "card-deleted", "column-deleted"]);
    for card_id in [a.id, b.id] {
        assert!(matches!(
            get_card(card_id, h.store.as_ref()).await,
            Err(DomainError::NotFound {
                entity: EntityKind::Card,
                ..
            })
        ));
    }
}

#[tokio::test]
async fn test_update_card_changes_fields_but_never_position() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let card = h.create_card(todo.id, "A").await.unwrap();

    // Act
    let updated = h
        .mutator
        .update_card(&UpdateCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            card_id: card.id,
            patch: CardPatch {
                title: Some("A, revised".into()),
                priority: Some(Priority::Urgent),
                ..CardPatch::default()
            },
        })
        .await
        .unwrap()
        .output;

    // Assert
    assert_eq!(updated.title, "A, revised");
    assert_eq!(updated.priority, Priority::Urgent);
    assert_eq!(updated.column_id, card.column_id);
    assert!((updated.position - card.position).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_delete_card_frees_capacity() {
    let h = Harness::new().await;
    let todo = h.column("To Do", 1).await;
    let card = h.create_card(todo.id, "A").await.unwrap();

    h.mutator
        .delete_card(&DeleteCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            card_id: card.id,
        })
        .await
        .unwrap();

    assert!(h.create_card(todo.id, "B").await.is_ok());
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let h = Harness::new().await;

    let missing_column = h.create_card(Uuid::new_v4(), "A").await;
    let missing_card = h
        .mutator
        .delete_card(&DeleteCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            card_id: Uuid::new_v4(),
        })
        .await;

    assert!(matches!(
        missing_column,
        Err(DomainError::NotFound {
            entity: EntityKind::Column,
            ..
        })
    ));
    assert!(matches!(
        missing_card,
        Err(DomainError::NotFound {
            entity: EntityKind::Card,
            ..
        })
    ));
}

#[tokio::test]
async fn test_concurrent_moves_into_single_slot_column_admit_exactly_one() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let doing = h.column("Doing", 1).await;
    let x = h.create_card(todo.id, "X").await.unwrap();
    let y = h.create_card(todo.id, "Y").await.unwrap();
    let racing = mutator_over(Arc::new(LockstepBoardStore::new(h.store.clone(), 2)));
    let move_x = h.move_command(x.id, doing.id, 0);
    let move_y = h.move_command(y.id, doing.id, 0);

    // Act
    let (first, second) = tokio::join!(racing.move_card(&move_x), racing.move_card(&move_y));

    // Assert
    let outcomes = [first, second];
    let admitted = outcomes.iter().filter(|r| r.is_ok()).count();
    let refused = outcomes
        .iter()
        .filter(|r| matches!(r, Err(DomainError::CapacityExceeded { .. })))
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(refused, 1);
    assert_eq!(h.titles_in(doing.id).await.len(), 1);
    assert_eq!(h.titles_in(todo.id).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_card_creation_never_exceeds_limit() {
    // Arrange
    let h = Harness::new().await;
    let doing = h.column("Doing", 3).await;

    // Act
    let mut tasks = Vec::new();
    for n in 0..8 {
        let mutator = h.mutator.clone();
        let command = CreateCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: doing.id,
            attributes: CardAttributes::titled(format!("card {n}")),
            index: None,
        };
        tasks.push(tokio::spawn(async move { mutator.create_card(&command).await }));
    }
    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(DomainError::CapacityExceeded { .. } | DomainError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    // Assert
    let stored = h.titles_in(doing.id).await.len();
    assert_eq!(stored, admitted);
    assert!(stored <= 3);
}

#[tokio::test]
async fn test_lost_race_is_retried_on_fresh_state() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let store = Arc::new(ConflictingBoardStore::new(h.store.clone(), 1));
    let mutator = mutator_over(store.clone());

    // Act
    let result = mutator
        .create_card(&CreateCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: todo.id,
            attributes: CardAttributes::titled("A"),
            index: None,
        })
        .await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(store.commit_attempts(), 2);
    assert_eq!(h.titles_in(todo.id).await, vec!["A"]);
}

#[tokio::test]
async fn test_conflict_surfaces_after_retries_are_exhausted() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let store = Arc::new(ConflictingBoardStore::always(h.store.clone()));
    let mutator = mutator_over(store.clone());

    // Act
    let result = mutator
        .create_card(&CreateCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: todo.id,
            attributes: CardAttributes::titled("A"),
            index: None,
        })
        .await;

    // Assert
    assert!(matches!(result, Err(DomainError::Conflict { .. })));
    assert_eq!(store.commit_attempts(), 5);
    assert!(h.titles_in(todo.id).await.is_empty());
}

#[tokio::test]
async fn test_stalled_commit_times_out_and_writes_nothing() {
    // Arrange
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;
    let mutator = mutator_over(Arc::new(StalledBoardStore::new(h.store.clone())))
        .with_storage_timeout(Duration::from_millis(50));

    // Act
    let result = mutator
        .create_card(&CreateCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: todo.id,
            attributes: CardAttributes::titled("A"),
            index: None,
        })
        .await;

    // Assert
    assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
    assert!(h.titles_in(todo.id).await.is_empty());
}

#[tokio::test]
async fn test_failing_store_is_storage_unavailable() {
    let mutator = mutator_over(Arc::new(FailingBoardStore));

    let result = mutator.ensure_board(Uuid::new_v4()).await;

    assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
}

#[tokio::test]
async fn test_ensure_board_is_idempotent_and_queryable_by_project() {
    // Arrange
    let store = Arc::new(InMemoryBoardStore::new());
    let mutator = mutator_over(store.clone());
    let project_id = Uuid::new_v4();

    // Act
    let first = mutator.ensure_board(project_id).await.unwrap();
    let second = mutator.ensure_board(project_id).await.unwrap();

    // Assert
    assert_eq!(first.board_id, second.board_id);
    let view = get_board_for_project(project_id, store.as_ref()).await.unwrap();
    assert_eq!(view.board_id, first.board_id);
    assert!(view.columns.is_empty());
}

#[tokio::test]
async fn test_board_for_unknown_project_is_not_found() {
    let store = InMemoryBoardStore::new();

    let result = get_board_for_project(Uuid::new_v4(), &store).await;

    assert!(matches!(
        result,
        Err(DomainError::NotFound {
            entity: EntityKind::Project,
            ..
        })
    ));
}

#[tokio::test]
async fn test_committed_events_carry_actor_and_sequence() {
    let h = Harness::new().await;
    let todo = h.column("To Do", 5).await;

    let result = h
        .mutator
        .create_card(&CreateCard {
            correlation_id: Uuid::new_v4(),
            actor_id: h.actor_id,
            column_id: todo.id,
            attributes: CardAttributes::titled("A"),
            index: Some(0),
        })
        .await
        .unwrap();

    assert_eq!(result.events.len(), 1);
    let meta = result.events[0].metadata();
    assert_eq!(meta.actor_id, h.actor_id);
    assert_eq!(meta.aggregate_id, h.board_id);
    assert_eq!(result.version, 2);
}
