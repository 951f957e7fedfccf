//! Routes for reading, editing and moving cards.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use kanban_board::application::query_handlers;
use kanban_board::domain::commands;
use kanban_board::domain::model::{Card, CardPatch};

use super::columns::clamp_index;
use super::{CommandResponse, committed};
use crate::error::ApiError;
use crate::extract::Actor;
use crate::state::AppState;

/// Request body for POST /cards/{card_id}/move.
#[derive(Debug, Deserialize)]
pub struct MoveCardRequest {
    /// The destination column.
    pub destination_column_id: Uuid,
    /// Target index among the destination's other cards.
    pub index: i64,
    /// The column the client believes the card is in.
    #[serde(default)]
    pub expected_source_column_id: Option<Uuid>,
}

/// GET /cards/{card_id}
#[instrument(skip(state))]
async fn get_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<Card>, ApiError> {
    let card = query_handlers::get_card(card_id, state.store.as_ref()).await?;
    Ok(Json(card))
}

/// PATCH /cards/{card_id}
#[instrument(skip(state, patch))]
async fn update_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Actor(actor_id): Actor,
    Json(patch): Json<CardPatch>,
) -> Result<Json<CommandResponse<Card>>, ApiError> {
    let command = commands::UpdateCard {
        correlation_id: Uuid::new_v4(),
        actor_id,
        card_id,
        patch,
    };

    info!(correlation_id = %command.correlation_id, "handling update_card command");

    let result = state.mutator.update_card(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// DELETE /cards/{card_id}
#[instrument(skip(state))]
async fn delete_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Actor(actor_id): Actor,
) -> Result<Json<CommandResponse<Card>>, ApiError> {
    let command = commands::DeleteCard {
        correlation_id: Uuid::new_v4(),
        actor_id,
        card_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_card command");

    let result = state.mutator.delete_card(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// POST /cards/{card_id}/move
#[instrument(skip(state, request), fields(destination = %request.destination_column_id))]
async fn move_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Actor(actor_id): Actor,
    Json(request): Json<MoveCardRequest>,
) -> Result<Json<CommandResponse<Card>>, ApiError> {
    let command = commands::MoveCard {
        correlation_id: Uuid::new_v4(),
        actor_id,
        card_id,
        expected_source_column_id: request.expected_source_column_id,
        destination_column_id: request.destination_column_id,
        destination_index: clamp_index(request.index),
    };

    info!(correlation_id = %command.correlation_id, "handling move_card command");

    let result = state.mutator.move_card(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// Returns the router for cards.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/cards/{card_id}",
            get(get_card).patch(update_card).delete(delete_card),
        )
        .route("/cards/{card_id}/move", post(move_card))
}
