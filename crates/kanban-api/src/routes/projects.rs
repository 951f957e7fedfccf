//! Routes for project membership and join requests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use kanban_core::clock::Clock;
use kanban_fanout::notification::{JoinRequest, ProjectEvent};

use crate::error::ApiError;
use crate::extract::Actor;
use crate::state::AppState;

/// Request body for PUT /projects/{project_id}/members.
#[derive(Debug, Deserialize)]
pub struct SetMembersRequest {
    /// The project owner.
    pub owner_id: Uuid,
    /// Every other member.
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

/// Request body for POST /projects/{project_id}/join-requests/{user_id}/decision.
#[derive(Debug, Deserialize)]
pub struct JoinDecisionRequest {
    /// `true` admits the requester, `false` turns them away.
    pub approve: bool,
}

/// PUT /projects/{project_id}/members
#[instrument(skip(state, request))]
async fn set_members(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Actor(_actor_id): Actor,
    Json(request): Json<SetMembersRequest>,
) -> StatusCode {
    info!(members = request.member_ids.len(), "replacing project membership");
    state
        .membership
        .set_project(project_id, request.owner_id, request.member_ids);
    StatusCode::NO_CONTENT
}

/// POST /projects/{project_id}/join-requests
#[instrument(skip(state))]
async fn raise_join_request(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Actor(requester_id): Actor,
) -> Result<(StatusCode, Json<JoinRequest>), ApiError> {
    state
        .membership
        .raise_join_request(project_id, requester_id)?;
    let request = JoinRequest {
        project_id,
        requester_id,
        actor_id: requester_id,
        occurred_at: state.clock.now(),
    };
    state.publish(vec![ProjectEvent::JoinRequestRaised(request.clone())]);
    Ok((StatusCode::ACCEPTED, Json(request)))
}

/// POST /projects/{project_id}/join-requests/{user_id}/decision
#[instrument(skip(state, decision))]
async fn decide_join_request(
    State(state): State<AppState>,
    Path((project_id, requester_id)): Path<(Uuid, Uuid)>,
    Actor(actor_id): Actor,
    Json(decision): Json<JoinDecisionRequest>,
) -> Result<Json<JoinRequest>, ApiError> {
    state
        .membership
        .decide_join_request(project_id, requester_id, decision.approve)?;
    let request = JoinRequest {
        project_id,
        requester_id,
        actor_id,
        occurred_at: state.clock.now(),
    };
    let event = if decision.approve {
        ProjectEvent::JoinRequestApproved(request.clone())
    } else {
        ProjectEvent::JoinRequestRejected(request.clone())
    };
    state.publish(vec![event]);
    Ok(Json(request))
}

/// Returns the router for projects.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/members", put(set_members))
        .route(
            "/projects/{project_id}/join-requests",
            post(raise_join_request),
        )
        .route(
            "/projects/{project_id}/join-requests/{user_id}/decision",
            post(decide_join_request),
        )
}
