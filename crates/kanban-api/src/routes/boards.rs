//! Routes for boards and their column layout.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use kanban_board::application::query_handlers::{self, BoardView};
use kanban_board::domain::commands;
use kanban_board::domain::model::Column;

use super::{CommandResponse, committed};
use crate::error::ApiError;
use crate::extract::Actor;
use crate::state::AppState;

/// Request body for POST /boards/{board_id}/columns.
#[derive(Debug, Deserialize)]
pub struct CreateColumnRequest {
    /// Display title.
    pub title: String,
    /// WIP limit; `0` means unlimited, the server default when omitted.
    pub wip_limit: Option<u32>,
}

/// Request body for PUT /boards/{board_id}/columns/order.
#[derive(Debug, Deserialize)]
pub struct ReorderColumnsRequest {
    /// Every column id of the board, in the new order.
    pub column_ids: Vec<Uuid>,
}

/// POST /projects/{project_id}/board
#[instrument(skip(state))]
async fn ensure_board(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Actor(_actor_id): Actor,
) -> Result<Json<BoardView>, ApiError> {
    let snapshot = state.mutator.ensure_board(project_id).await?;
    Ok(Json(BoardView::from(snapshot)))
}

/// GET /projects/{project_id}/board
#[instrument(skip(state))]
async fn get_project_board(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<BoardView>, ApiError> {
    let view = query_handlers::get_board_for_project(project_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// GET /boards/{board_id}
#[instrument(skip(state))]
async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<Json<BoardView>, ApiError> {
    let view = query_handlers::get_board(board_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// POST /boards/{board_id}/columns
#[instrument(skip(state, request))]
async fn create_column(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Actor(actor_id): Actor,
    Json(request): Json<CreateColumnRequest>,
) -> Result<Json<CommandResponse<Column>>, ApiError> {
    let command = commands::CreateColumn {
        correlation_id: Uuid::new_v4(),
        actor_id,
        board_id,
        title: request.title,
        wip_limit: request.wip_limit,
    };

    info!(correlation_id = %command.correlation_id, "handling create_column command");

    let result = state.mutator.create_column(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// PUT /boards/{board_id}/columns/order
#[instrument(skip(state, request))]
async fn reorder_columns(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Actor(actor_id): Actor,
    Json(request): Json<ReorderColumnsRequest>,
) -> Result<Json<CommandResponse<Vec<Column>>>, ApiError> {
    let command = commands::ReorderColumns {
        correlation_id: Uuid::new_v4(),
        actor_id,
        board_id,
        column_ids: request.column_ids,
    };

    info!(correlation_id = %command.correlation_id, "handling reorder_columns command");

    let result = state.mutator.reorder_columns(&command).await?;
    Ok(Json(committed(&state, result)))
}

/// Returns the router for boards.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/board",
            post(ensure_board).get(get_project_board),
        )
        .route("/boards/{board_id}", get(get_board))
        .route("/boards/{board_id}/columns", post(create_column))
        .route("/boards/{board_id}/columns/order", put(reorder_columns))
}
