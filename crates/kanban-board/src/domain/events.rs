//! Change records produced by board mutations.

use kanban_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{Card, Column};

/// Event type name for `ColumnCreated`.
pub const COLUMN_CREATED_EVENT_TYPE: &str = "column-created";
/// Event type name for `ColumnUpdated`.
pub const COLUMN_UPDATED_EVENT_TYPE: &str = "column-updated";
/// Event type name for `ColumnDeleted`.
pub const COLUMN_DELETED_EVENT_TYPE: &str = "column-deleted";
/// Event type name for `ColumnsReordered`.
pub const COLUMN_REORDERED_EVENT_TYPE: &str = "column-reordered";
/// Event type name for `CardCreated`.
pub const CARD_CREATED_EVENT_TYPE: &str = "card-created";
/// Event type name for `CardUpdated`.
pub const CARD_UPDATED_EVENT_TYPE: &str = "card-updated";
/// Event type name for `CardMoved`.
pub const CARD_MOVED_EVENT_TYPE: &str = "card-moved";
/// Event type name for `CardDeleted`.
pub const CARD_DELETED_EVENT_TYPE: &str = "card-deleted";

/// A sibling whose key was rewritten by compaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPosition {
    /// The renumbered card.
    pub card_id: Uuid,
    /// Its new key.
    pub position: f64,
}

/// Emitted when a column is appended to a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCreated {
    /// The new column.
    pub column: Column,
}

/// Emitted when a column's title or WIP limit changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnUpdated {
    /// The column after the update.
    pub column: Column,
}

/// Emitted after the cards of a deleted column have been removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDeleted {
    /// The board the column belonged to.
    pub board_id: Uuid,
    /// The removed column.
    pub column_id: Uuid,
    /// Cards removed with it, in their former read order.
    pub deleted_card_ids: Vec<Uuid>,
}

/// Emitted when the columns of a board are put in a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnsReordered {
    /// The board whose columns moved.
    pub board_id: Uuid,
    /// Column ids in their new read order.
    pub column_ids: Vec<Uuid>,
}

/// Emitted when a card is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardCreated {
    /// The new card.
    pub card: Card,
    /// Siblings renumbered by compaction during the insertion.
    pub renumbered: Vec<CardPosition>,
}

/// Emitted when a card's descriptive fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardUpdated {
    /// The card after the update.
    pub card: Card,
}

/// Emitted when a card changes column or position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMoved {
    /// The card at its new place.
    pub card: Card,
    /// The column the card left (equal to `card.column_id` for a reorder).
    pub from_column_id: Uuid,
    /// The key the card had before the move.
    pub from_position: f64,
    /// Siblings in the destination renumbered by compaction.
    pub renumbered: Vec<CardPosition>,
}

/// Emitted when a card is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDeleted {
    /// The removed card.
    pub card_id: Uuid,
    /// The column it was in.
    pub column_id: Uuid,
}

/// Event payload variants for a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoardEventKind {
    /// A column has been created.
    ColumnCreated(ColumnCreated),
    /// A column has been updated.
    ColumnUpdated(ColumnUpdated),
    /// A column has been deleted.
    ColumnDeleted(ColumnDeleted),
    /// The columns have been reordered.
    ColumnsReordered(ColumnsReordered),
    /// A card has been created.
    CardCreated(CardCreated),
    /// A card has been updated.
    CardUpdated(CardUpdated),
    /// A card has been moved.
    CardMoved(CardMoved),
    /// A card has been deleted.
    CardDeleted(CardDeleted),
}

/// Domain event envelope for a board.
#[derive(Debug, Clone)]
pub struct BoardEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: BoardEventKind,
}

impl BoardEventKind {
    /// The wire name of this kind.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ColumnCreated(_) => COLUMN_CREATED_EVENT_TYPE,
            Self::ColumnUpdated(_) => COLUMN_UPDATED_EVENT_TYPE,
            Self::ColumnDeleted(_) => COLUMN_DELETED_EVENT_TYPE,
            Self::ColumnsReordered(_) => COLUMN_REORDERED_EVENT_TYPE,
            Self::CardCreated(_) => CARD_CREATED_EVENT_TYPE,
            Self::CardUpdated(_) => CARD_UPDATED_EVENT_TYPE,
            Self::CardMoved(_) => CARD_MOVED_EVENT_TYPE,
            Self::CardDeleted(_) => CARD_DELETED_EVENT_TYPE,
        }
    }
}

impl DomainEvent for BoardEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match &self.kind {
            BoardEventKind::ColumnCreated(p) => serde_json::to_value(p),
            BoardEventKind::ColumnUpdated(p) => serde_json::to_value(p),
            BoardEventKind::ColumnDeleted(p) => serde_json::to_value(p),
            BoardEventKind::ColumnsReordered(p) => serde_json::to_value(p),
            BoardEventKind::CardCreated(p) => serde_json::to_value(p),
            BoardEventKind::CardUpdated(p) => serde_json::to_value(p),
            BoardEventKind::CardMoved(p) => serde_json::to_value(p),
            BoardEventKind::CardDeleted(p) => serde_json::to_value(p),
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_payload_is_the_inner_record_without_variant_tag() {
        // Arrange
        let card_id = Uuid::new_v4();
        let column_id = Uuid::new_v4();
        let event = BoardEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: CARD_DELETED_EVENT_TYPE.to_owned(),
                aggregate_id: Uuid::new_v4(),
                sequence_number: 1,
                correlation_id: Uuid::new_v4(),
                actor_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
            },
            kind: BoardEventKind::CardDeleted(CardDeleted { card_id, column_id }),
        };

        // Act
        let payload = event.to_payload().unwrap();

        // Assert
        assert_eq!(event.event_type(), "card-deleted");
        assert_eq!(payload["card_id"], card_id.to_string());
        assert_eq!(payload["column_id"], column_id.to_string());
        assert!(payload.get("CardDeleted").is_none());
    }
}
