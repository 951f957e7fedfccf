//! The board aggregate.
//!
//! All columns and cards of one board live in a single arena addressed by
//! id. Every method validates against the current state first and only then
//! records an event, so a rejected operation leaves the board untouched.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use kanban_core::aggregate::AggregateRoot;
use kanban_core::clock::Clock;
use kanban_core::error::{DomainError, EntityKind};
use kanban_core::event::EventMetadata;
use uuid::Uuid;

use super::events::{
    BoardEvent, BoardEventKind, CardCreated, CardDeleted, CardMoved, CardPosition, CardUpdated,
    ColumnCreated, ColumnDeleted, ColumnUpdated, ColumnsReordered,
};
use super::model::{
    Card, CardAttributes, CardPatch, Column, ColumnPatch, card_order, column_order,
    normalize_title,
};
use super::position::{self, Allocation, POSITION_STEP};
use super::repository::BoardSnapshot;
use super::wip;

/// Who is changing the board, and when.
#[derive(Clone, Copy)]
pub struct ChangeContext<'a> {
    /// Correlation ID of the command being applied.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// Source of timestamps.
    pub clock: &'a dyn Clock,
}

/// The aggregate root for a project's board.
#[derive(Debug)]
pub struct Board {
    /// Aggregate identifier.
    pub id: Uuid,
    /// The owning project.
    pub project_id: Uuid,
    /// Version the board was loaded at.
    pub(crate) version: i64,
    created_at: DateTime<Utc>,
    columns: HashMap<Uuid, Column>,
    cards: HashMap<Uuid, Card>,
    uncommitted_events: Vec<BoardEvent>,
}

impl Board {
    /// Rebuilds a board from its stored snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: BoardSnapshot) -> Self {
        Self {
            id: snapshot.board_id,
            project_id: snapshot.project_id,
            version: snapshot.version,
            created_at: snapshot.created_at,
            columns: snapshot.columns.into_iter().map(|c| (c.id, c)).collect(),
            cards: snapshot.cards.into_iter().map(|c| (c.id, c)).collect(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Captures the current state for the store. Columns and cards are
    /// written in read order.
    #[must_use]
    pub fn to_snapshot(&self) -> BoardSnapshot {
        let columns: Vec<Column> = self.columns().into_iter().cloned().collect();
        let cards = columns
            .iter()
            .flat_map(|column| self.cards_in(column.id))
            .cloned()
            .collect();
        BoardSnapshot {
            board_id: self.id,
            project_id: self.project_id,
            version: self.version,
            created_at: self.created_at,
            columns,
            cards,
        }
    }

    /// Looks up a column.
    #[must_use]
    pub fn column(&self, column_id: Uuid) -> Option<&Column> {
        self.columns.get(&column_id)
    }

    /// Looks up a card.
    #[must_use]
    pub fn card(&self, card_id: Uuid) -> Option<&Card> {
        self.cards.get(&card_id)
    }

    /// Columns in read order.
    #[must_use]
    pub fn columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.values().collect();
        columns.sort_by(|a, b| column_order(a, b));
        columns
    }

    /// Cards of a column in read order.
    #[must_use]
    pub fn cards_in(&self, column_id: Uuid) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self
            .cards
            .values()
            .filter(|c| c.column_id == column_id)
            .collect();
        cards.sort_by(|a, b| card_order(a, b));
        cards
    }

    /// Number of cards resident in a column.
    #[must_use]
    pub fn card_count(&self, column_id: Uuid) -> usize {
        self.cards
            .values()
            .filter(|c| c.column_id == column_id)
            .count()
    }

    /// Appends a column after the current last column.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` for a blank title.
    pub fn create_column(
        &mut self,
        title: &str,
        wip_limit: u32,
        ctx: &ChangeContext<'_>,
    ) -> Result<Column, DomainError> {
        let title = normalize_title(title)?;
        let position = self
            .columns()
            .last()
            .map_or(POSITION_STEP, |last| last.position + POSITION_STEP);
        let now = ctx.clock.now();
        let column = Column {
            id: Uuid::now_v7(),
            board_id: self.id,
            title,
            wip_limit,
            position,
            created_at: now,
            updated_at: now,
        };

        self.record(
            BoardEventKind::ColumnCreated(ColumnCreated {
                column: column.clone(),
            }),
            ctx,
        );
        Ok(column)
    }

    /// Puts the columns in the order of `column_ids`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` unless `column_ids` is exactly a
    /// permutation of the board's column ids.
    pub fn reorder_columns(
        &mut self,
        column_ids: &[Uuid],
        ctx: &ChangeContext<'_>,
    ) -> Result<(), DomainError> {
        let requested: HashSet<Uuid> = column_ids.iter().copied().collect();
        if requested.len() != column_ids.len() {
            return Err(DomainError::InvalidInput(
                "column order contains duplicate ids".into(),
            ));
        }
        let existing: HashSet<Uuid> = self.columns.keys().copied().collect();
        if requested != existing {
            let missing = existing.difference(&requested).count();
            let foreign = requested.difference(&existing).count();
            return Err(DomainError::InvalidInput(format!(
                "column order must list every column of board {} exactly once \
                 ({missing} missing, {foreign} unknown)",
                self.id
            )));
        }

        self.record(
            BoardEventKind::ColumnsReordered(ColumnsReordered {
                board_id: self.id,
                column_ids: column_ids.to_vec(),
            }),
            ctx,
        );
        Ok(())
    }

    /// Changes a column's title or WIP limit.
    ///
    /// Lowering the limit below the current occupancy is accepted; the
    /// resident cards stay and only later additions are refused.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown column and
    /// `DomainError::InvalidInput` for a blank title.
    pub fn update_column(
        &mut self,
        column_id: Uuid,
        patch: &ColumnPatch,
        ctx: &ChangeContext<'_>,
    ) -> Result<Column, DomainError> {
        let mut column = self.require_column(column_id)?.clone();
        if let Some(title) = &patch.title {
            column.title = normalize_title(title)?;
        }
        if let Some(wip_limit) = patch.wip_limit {
            column.wip_limit = wip_limit;
        }
        column.updated_at = ctx.clock.now();

        self.record(
            BoardEventKind::ColumnUpdated(ColumnUpdated {
                column: column.clone(),
            }),
            ctx,
        );
        Ok(column)
    }

    /// Deletes a column and every card in it: one `CardDeleted` per card,
    /// in read order, followed by one `ColumnDeleted`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown column.
    pub fn delete_column(
        &mut self,
        column_id: Uuid,
        ctx: &ChangeContext<'_>,
    ) -> Result<Vec<Uuid>, DomainError> {
        self.require_column(column_id)?;
        let card_ids: Vec<Uuid> = self.cards_in(column_id).iter().map(|c| c.id).collect();

        for &card_id in &card_ids {
            self.record(
                BoardEventKind::CardDeleted(CardDeleted { card_id, column_id }),
                ctx,
            );
        }
        self.record(
            BoardEventKind::ColumnDeleted(ColumnDeleted {
                board_id: self.id,
                column_id,
                deleted_card_ids: card_ids.clone(),
            }),
            ctx,
        );
        Ok(card_ids)
    }

    /// Creates a card at `index` of a column, or at its end when `None`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown column,
    /// `DomainError::InvalidInput` for a blank title, and
    /// `DomainError::CapacityExceeded` when the column is full.
    pub fn create_card(
        &mut self,
        column_id: Uuid,
        attributes: CardAttributes,
        index: Option<usize>,
        ctx: &ChangeContext<'_>,
    ) -> Result<Card, DomainError> {
        let column = self.require_column(column_id)?;
        let title = normalize_title(&attributes.title)?;
        wip::ensure_capacity(column, self.card_count(column_id))?;

        let (sibling_ids, keys) = self.sibling_keys(column_id, None);
        let allocation = position::allocate(&keys, index.unwrap_or(keys.len()));
        let now = ctx.clock.now();
        let card = Card {
            id: Uuid::now_v7(),
            column_id,
            title,
            description: attributes.description,
            assignee_ids: attributes.assignee_ids,
            label_ids: attributes.label_ids,
            milestone_id: attributes.milestone_id,
            priority: attributes.priority,
            due_date: attributes.due_date,
            position: allocation.position(),
            created_at: now,
            updated_at: now,
        };

        self.record(
            BoardEventKind::CardCreated(CardCreated {
                card: card.clone(),
                renumbered: renumbering(&sibling_ids, &allocation),
            }),
            ctx,
        );
        Ok(card)
    }

    /// Changes a card's descriptive fields. Never touches column or position.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown card and
    /// `DomainError::InvalidInput` for a blank title.
    pub fn update_card(
        &mut self,
        card_id: Uuid,
        patch: CardPatch,
        ctx: &ChangeContext<'_>,
    ) -> Result<Card, DomainError> {
        let mut card = self.require_card(card_id)?.clone();
        if let Some(title) = &patch.title {
            card.title = normalize_title(title)?;
        }
        if let Some(description) = patch.description {
            card.description = description;
        }
        if let Some(assignee_ids) = patch.assignee_ids {
            card.assignee_ids = assignee_ids;
        }
        if let Some(label_ids) = patch.label_ids {
            card.label_ids = label_ids;
        }
        if let Some(milestone_id) = patch.milestone_id {
            card.milestone_id = milestone_id;
        }
        if let Some(priority) = patch.priority {
            card.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            card.due_date = due_date;
        }
        card.updated_at = ctx.clock.now();

        self.record(
            BoardEventKind::CardUpdated(CardUpdated { card: card.clone() }),
            ctx,
        );
        Ok(card)
    }

    /// Moves a card to `index` among the other cards of `destination_id`.
    ///
    /// The card's current column is taken from this board, never from the
    /// caller. `expected_source` only turns a stale client view into a
    /// `StaleSource` rejection. The WIP guard runs only when the card changes
    /// column.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown card or destination,
    /// `DomainError::StaleSource` when `expected_source` is out of date, and
    /// `DomainError::CapacityExceeded` when a different destination is full.
    pub fn move_card(
        &mut self,
        card_id: Uuid,
        destination_id: Uuid,
        index: usize,
        expected_source: Option<Uuid>,
        ctx: &ChangeContext<'_>,
    ) -> Result<Card, DomainError> {
        let card = self.require_card(card_id)?.clone();
        if let Some(expected) = expected_source.filter(|expected| *expected != card.column_id) {
            return Err(DomainError::StaleSource {
                card_id,
                expected,
                actual: card.column_id,
            });
        }
        let destination = self.require_column(destination_id)?;
        if destination_id != card.column_id {
            wip::ensure_capacity(destination, self.card_count(destination_id))?;
        }

        let (sibling_ids, keys) = self.sibling_keys(destination_id, Some(card_id));
        let allocation = position::allocate(&keys, index);
        let mut moved = card.clone();
        moved.column_id = destination_id;
        moved.position = allocation.position();
        moved.updated_at = ctx.clock.now();

        self.record(
            BoardEventKind::CardMoved(CardMoved {
                card: moved.clone(),
                from_column_id: card.column_id,
                from_position: card.position,
                renumbered: renumbering(&sibling_ids, &allocation),
            }),
            ctx,
        );
        Ok(moved)
    }

    /// Deletes a card. Sibling keys are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown card.
    pub fn delete_card(
        &mut self,
        card_id: Uuid,
        ctx: &ChangeContext<'_>,
    ) -> Result<Card, DomainError> {
        let card = self.require_card(card_id)?.clone();
        self.record(
            BoardEventKind::CardDeleted(CardDeleted {
                card_id,
                column_id: card.column_id,
            }),
            ctx,
        );
        Ok(card)
    }

    fn require_column(&self, column_id: Uuid) -> Result<&Column, DomainError> {
        self.columns
            .get(&column_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Column, column_id))
    }

    fn require_card(&self, card_id: Uuid) -> Result<&Card, DomainError> {
        self.cards
            .get(&card_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Card, card_id))
    }

    /// Ids and keys of a column's cards in read order, optionally leaving one out.
    fn sibling_keys(&self, column_id: Uuid, excluding: Option<Uuid>) -> (Vec<Uuid>, Vec<f64>) {
        self.cards_in(column_id)
            .into_iter()
            .filter(|c| Some(c.id) != excluding)
            .map(|c| (c.id, c.position))
            .unzip()
    }

    /// Returns the sequence number for the next event of this transaction.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.uncommitted_events.len() as i64 + 1
    }

    fn record(&mut self, kind: BoardEventKind, ctx: &ChangeContext<'_>) {
        // TODO: event_id uses Uuid::new_v4(), so replaying a command yields
        // different event ids; derive them from correlation_id + sequence.
        let event = BoardEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.next_sequence_number(),
                correlation_id: ctx.correlation_id,
                actor_id: ctx.actor_id,
                occurred_at: ctx.clock.now(),
            },
            kind,
        };
        self.apply(&event);
        self.uncommitted_events.push(event);
    }

    fn apply_renumbering(&mut self, renumbered: &[CardPosition], at: DateTime<Utc>) {
        for entry in renumbered {
            if let Some(card) = self.cards.get_mut(&entry.card_id) {
                card.position = entry.position;
                card.updated_at = at;
            }
        }
    }
}

/// Pairs each sibling with its new key when the allocation compacted.
fn renumbering(sibling_ids: &[Uuid], allocation: &Allocation) -> Vec<CardPosition> {
    match allocation {
        Allocation::Slot(_) => Vec::new(),
        Allocation::Compacted { siblings, .. } => sibling_ids
            .iter()
            .zip(siblings)
            .map(|(&card_id, &position)| CardPosition { card_id, position })
            .collect(),
    }
}

impl AggregateRoot for Board {
    type Event = BoardEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            BoardEventKind::ColumnCreated(payload) => {
                self.columns
                    .insert(payload.column.id, payload.column.clone());
            }
            BoardEventKind::ColumnUpdated(payload) => {
                self.columns
                    .insert(payload.column.id, payload.column.clone());
            }
            BoardEventKind::ColumnDeleted(payload) => {
                self.columns.remove(&payload.column_id);
                self.cards.retain(|_, c| c.column_id != payload.column_id);
            }
            BoardEventKind::ColumnsReordered(payload) => {
                for (column_id, key) in payload.column_ids.iter().zip(position::spaced(
                    payload.column_ids.len(),
                )) {
                    if let Some(column) = self.columns.get_mut(column_id) {
                        column.position = key;
                        column.updated_at = at;
                    }
                }
            }
            BoardEventKind::CardCreated(payload) => {
                self.cards.insert(payload.card.id, payload.card.clone());
                self.apply_renumbering(&payload.renumbered, at);
            }
            BoardEventKind::CardUpdated(payload) => {
                self.cards.insert(payload.card.id, payload.card.clone());
            }
            BoardEventKind::CardMoved(payload) => {
                self.cards.insert(payload.card.id, payload.card.clone());
                self.apply_renumbering(&payload.renumbered, at);
            }
            BoardEventKind::CardDeleted(payload) => {
                self.cards.remove(&payload.card_id);
            }
        }
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}
