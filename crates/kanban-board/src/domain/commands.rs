//! Commands accepted by the board mutator.
//!
//! Callers are already authenticated and authorized; `actor_id` is carried
//! only so the resulting events can name who caused them.

use kanban_core::command::Command;
use uuid::Uuid;

use super::model::{CardAttributes, CardPatch, ColumnPatch};

/// Command to append a column to a board.
#[derive(Debug, Clone)]
pub struct CreateColumn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The board receiving the column.
    pub board_id: Uuid,
    /// Display title.
    pub title: String,
    /// WIP limit; the configured default when `None`.
    pub wip_limit: Option<u32>,
}

/// Command to put a board's columns in a new order.
#[derive(Debug, Clone)]
pub struct ReorderColumns {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The board whose columns are reordered.
    pub board_id: Uuid,
    /// Every column id of the board, exactly once, in the new order.
    pub column_ids: Vec<Uuid>,
}

/// Command to change a column's title or WIP limit.
#[derive(Debug, Clone)]
pub struct UpdateColumn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The column to update.
    pub column_id: Uuid,
    /// Fields to change.
    pub patch: ColumnPatch,
}

/// Command to delete a column together with its cards.
#[derive(Debug, Clone)]
pub struct DeleteColumn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The column to delete.
    pub column_id: Uuid,
}

/// Command to create a card in a column.
#[derive(Debug, Clone)]
pub struct CreateCard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The column receiving the card.
    pub column_id: Uuid,
    /// Card attributes.
    pub attributes: CardAttributes,
    /// Target index; the end of the column when `None`.
    pub index: Option<usize>,
}

/// Command to change a card's descriptive fields.
#[derive(Debug, Clone)]
pub struct UpdateCard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The card to update.
    pub card_id: Uuid,
    /// Fields to change.
    pub patch: CardPatch,
}

/// Command to move a card to an index of a (possibly different) column.
#[derive(Debug, Clone)]
pub struct MoveCard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The card to move.
    pub card_id: Uuid,
    /// The column the caller believes the card is in. Only used to reject
    /// stale clients; the authoritative source is read in the transaction.
    pub expected_source_column_id: Option<Uuid>,
    /// The destination column.
    pub destination_column_id: Uuid,
    /// Target index among the destination's other cards (clamped).
    pub destination_index: usize,
}

/// Command to delete a card.
#[derive(Debug, Clone)]
pub struct DeleteCard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user issuing the command.
    pub actor_id: Uuid,
    /// The card to delete.
    pub card_id: Uuid,
}

macro_rules! impl_command {
    ($($command:ty => $name:literal),+ $(,)?) => {
        $(
            impl Command for $command {
                fn command_type(&self) -> &'static str {
                    $name
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }

                fn actor_id(&self) -> Uuid {
                    self.actor_id
                }
            }
        )+
    };
}

impl_command! {
    CreateColumn => "create_column",
    ReorderColumns => "reorder_columns",
    UpdateColumn => "update_column",
    DeleteColumn => "delete_column",
    CreateCard => "create_card",
    UpdateCard => "update_card",
    MoveCard => "move_card",
    DeleteCard => "delete_card",
}
