//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kanban_core::error::DomainError;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user's id, set by the upstream proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| DomainError::InvalidInput(format!("missing {USER_ID_HEADER} header")))?;
        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Actor)
            .ok_or_else(|| {
                ApiError(DomainError::InvalidInput(format!(
                    "{USER_ID_HEADER} header is not a valid id"
                )))
            })
    }
}
