//! Routes for columns and card creation.

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use kanban_board::domain::commands;
use kanban_board::domain::model::{Card, CardAttributes, Column, ColumnPatch};

use super::{CommandResponse, committed};
use crate::error::ApiError;
use crate::extract::Actor;
use crate::state::AppState;

/// Request body for POST /columns/{column_id}/cards.
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    /// Card attributes.
    #[serde(flatten)]
    pub attributes: CardAttributes,
    /// Target index; the end of the column when omitted. Negative values
    /// are treated as zero.
    pub index: Option<i64>,
}

/// Converts a client index to a slot, clamping negatives to zero.
pub(crate) fn clamp_index(index: i64) -> usize {
    usize::try_from(index.max(0)).unwrap_or(usize::MAX)
}

/// PATCH /columns/{column_id}
#[instrument(skip(state, patch))]
async fn update_column(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Actor(actor_id): Actor,
    Json(patch): Json<ColumnPatch>,
) -> Result<Json<CommandResponse<Column>>, ApiError> {
    let command = commands::UpdateColumn {
        correlation_id: Uuid::new_v4(),
        actor_id,
        column_id,
        patch,
    };

    info!(correlation_id = %command.correlation_id, "handling update_column command");

    let result = state.mutator.update_column(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// DELETE /columns/{column_id}
///
/// The response data lists the ids of the cards deleted with the column.
#[instrument(skip(state))]
async fn delete_column(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Actor(actor_id): Actor,
) -> Result<Json<CommandResponse<Vec<Uuid>>>, ApiError> {
    let command = commands::DeleteColumn {
        correlation_id: Uuid::new_v4(),
        actor_id,
        column_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_column command");

    let result = state.mutator.delete_column(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// POST /columns/{column_id}/cards
#[instrument(skip(state, request))]
async fn create_card(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Actor(actor_id): Actor,
    Json(request): Json<CreateCardRequest>,
) -> Result<Json<CommandResponse<Card>>, ApiError> {
    let command = commands::CreateCard {
        correlation_id: Uuid::new_v4(),
        actor_id,
        column_id,
        attributes: request.attributes,
        index: request.index.map(clamp_index),
    };

    info!(correlation_id = %command.correlation_id, "handling create_card command");

    let result = state.mutator.create_card(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// Returns the router for columns.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/columns/{column_id}",
            patch(update_column).delete(delete_column),
        )
        .route("/columns/{column_id}/cards", post(create_card))
}
