//! Route modules organized by resource.

pub mod boards;
pub mod cards;
pub mod columns;
pub mod health;
pub mod projects;
pub mod ws;

use kanban_board::application::command_handlers::BoardCommandResult;
use kanban_fanout::notification::ProjectEvent;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

/// Response body returned after a board mutation commits.
#[derive(Debug, Serialize)]
pub struct CommandResponse<T> {
    /// The board that changed.
    pub board_id: Uuid,
    /// Board version after the commit.
    pub version: i64,
    /// The operation's resulting entity or entities.
    pub data: T,
    /// IDs of the change records produced, in order.
    pub event_ids: Vec<Uuid>,
}

/// Publishes a committed result's events and builds its response body.
pub(crate) fn committed<T>(state: &AppState, result: BoardCommandResult<T>) -> CommandResponse<T> {
    let event_ids = result
        .events
        .iter()
        .map(|event| event.metadata.event_id)
        .collect();
    state.publish(ProjectEvent::from_board_events(
        result.project_id,
        result.version,
        result.events,
    ));
    CommandResponse {
        board_id: result.board_id,
        version: result.version,
        data: result.output,
        event_ids,
    }
}
