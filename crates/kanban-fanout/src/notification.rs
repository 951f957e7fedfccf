//! Outbound events and their audience.

use chrono::{DateTime, Utc};
use kanban_board::domain::events::BoardEvent;
use kanban_core::event::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type name for `JoinRequestRaised`.
pub const JOIN_REQUEST_RAISED_EVENT_TYPE: &str = "join-request-raised";
/// Event type name for `JoinRequestApproved`.
pub const JOIN_REQUEST_APPROVED_EVENT_TYPE: &str = "join-request-approved";
/// Event type name for `JoinRequestRejected`.
pub const JOIN_REQUEST_REJECTED_EVENT_TYPE: &str = "join-request-rejected";

/// Who receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every current member (and the owner) of the project.
    MembersOf(Uuid),
    /// Every user with a live channel, member or not.
    AllConnected,
}

/// A request to join a project, or the decision on one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// The project being joined.
    pub project_id: Uuid,
    /// The user asking to join.
    pub requester_id: Uuid,
    /// Who raised or decided the request.
    pub actor_id: Uuid,
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
}

/// Every event the dispatcher knows how to deliver.
#[derive(Debug, Clone)]
pub enum ProjectEvent {
    /// A committed change to a project's board.
    Board {
        /// The project owning the board.
        project_id: Uuid,
        /// Board version written by the commit that produced the event.
        version: i64,
        /// The change record.
        event: BoardEvent,
    },
    /// A user asked to join a project.
    JoinRequestRaised(JoinRequest),
    /// A join request was approved.
    JoinRequestApproved(JoinRequest),
    /// A join request was rejected.
    JoinRequestRejected(JoinRequest),
}

/// The record handed to the transport, one per recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Event type, e.g. `card-moved`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The project the event concerns.
    pub project_id: Uuid,
    /// Event-specific body.
    pub payload: serde_json::Value,
    /// The user whose action caused the event.
    pub actor_id: Uuid,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Board version after the commit, for board changes. Clients apply a
    /// change only when it is newer than the last version they saw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl ProjectEvent {
    /// Wraps the change records of one commit that left the board at `version`.
    pub fn from_board_events(
        project_id: Uuid,
        version: i64,
        events: impl IntoIterator<Item = BoardEvent>,
    ) -> Vec<Self> {
        events
            .into_iter()
            .map(|event| Self::Board {
                project_id,
                version,
                event,
            })
            .collect()
    }

    /// The audience of this event.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match self {
            Self::Board { project_id, .. } => Scope::MembersOf(*project_id),
            Self::JoinRequestRaised(_)
            | Self::JoinRequestApproved(_)
            | Self::JoinRequestRejected(_) => Scope::AllConnected,
        }
    }

    /// The project this event concerns.
    #[must_use]
    pub fn project_id(&self) -> Uuid {
        match self {
            Self::Board { project_id, .. } => *project_id,
            Self::JoinRequestRaised(request)
            | Self::JoinRequestApproved(request)
            | Self::JoinRequestRejected(request) => request.project_id,
        }
    }

    /// The event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Board { event, .. } => event.event_type(),
            Self::JoinRequestRaised(_) => JOIN_REQUEST_RAISED_EVENT_TYPE,
            Self::JoinRequestApproved(_) => JOIN_REQUEST_APPROVED_EVENT_TYPE,
            Self::JoinRequestRejected(_) => JOIN_REQUEST_REJECTED_EVENT_TYPE,
        }
    }

    /// Builds the transport record.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be encoded.
    pub fn to_notification(&self) -> Result<Notification, serde_json::Error> {
        let (payload, actor_id, timestamp, version) = match self {
            Self::Board { event, version, .. } => {
                let meta = event.metadata();
                (
                    event.to_payload()?,
                    meta.actor_id,
                    meta.occurred_at,
                    Some(*version),
                )
            }
            Self::JoinRequestRaised(request)
            | Self::JoinRequestApproved(request)
            | Self::JoinRequestRejected(request) => (
                serde_json::to_value(request)?,
                request.actor_id,
                request.occurred_at,
                None,
            ),
        };
        Ok(Notification {
            event_type: self.event_type().to_owned(),
            project_id: self.project_id(),
            payload,
            actor_id,
            timestamp,
            version,
        })
    }
}
