//! Project membership lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use kanban_core::error::{DomainError, EntityKind};
use uuid::Uuid;

/// Resolves who belongs to a project at the moment of asking.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    /// The project's owner and members, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown project, or
    /// `DomainError::StorageUnavailable` if the lookup fails.
    async fn members_of(&self, project_id: Uuid) -> Result<BTreeSet<Uuid>, DomainError>;
}

#[derive(Debug, Clone)]
struct Roster {
    owner_id: Uuid,
    member_ids: BTreeSet<Uuid>,
    pending: BTreeSet<Uuid>,
}

impl Roster {
    fn includes(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.member_ids.contains(&user_id)
    }
}

/// Membership held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMembershipRegistry {
    projects: RwLock<HashMap<Uuid, Roster>>,
}

impl InMemoryMembershipRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a project's owner and member list.
    ///
    /// Pending join requests survive the replacement, except those from
    /// users the new list already includes.
    pub fn set_project(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
        member_ids: impl IntoIterator<Item = Uuid>,
    ) {
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut roster = Roster {
            owner_id,
            member_ids: member_ids.into_iter().collect(),
            pending: BTreeSet::new(),
        };
        if let Some(previous) = projects.remove(&project_id) {
            roster.pending = previous
                .pending
                .into_iter()
                .filter(|user_id| !roster.includes(*user_id))
                .collect();
        }
        projects.insert(project_id, roster);
    }

    /// Adds one member to an existing project. Adding a current member is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the project is unknown.
    pub fn add_member(&self, project_id: Uuid, user_id: Uuid) -> Result<(), DomainError> {
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let roster = projects
            .get_mut(&project_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Project, project_id))?;
        roster.pending.remove(&user_id);
        roster.member_ids.insert(user_id);
        Ok(())
    }

    /// Records a pending request by `requester_id` to join the project.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown project and
    /// `DomainError::InvalidInput` if the requester already belongs to it.
    pub fn raise_join_request(
        &self,
        project_id: Uuid,
        requester_id: Uuid,
    ) -> Result<(), DomainError> {
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let roster = projects
            .get_mut(&project_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Project, project_id))?;
        if roster.includes(requester_id) {
            return Err(DomainError::InvalidInput(format!(
                "user {requester_id} is already a member of project {project_id}"
            )));
        }
        roster.pending.insert(requester_id);
        Ok(())
    }

    /// Settles a pending join request. Approval makes the requester a member
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown project and
    /// `DomainError::InvalidInput` if no request from `requester_id` is
    /// pending.
    pub fn decide_join_request(
        &self,
        project_id: Uuid,
        requester_id: Uuid,
        approve: bool,
    ) -> Result<(), DomainError> {
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let roster = projects
            .get_mut(&project_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Project, project_id))?;
        if !roster.pending.remove(&requester_id) {
            return Err(DomainError::InvalidInput(format!(
                "no pending join request from user {requester_id}"
            )));
        }
        if approve {
            roster.member_ids.insert(requester_id);
        }
        Ok(())
    }

    /// The owner of a project, if the project is known.
    #[must_use]
    pub fn owner_of(&self, project_id: Uuid) -> Option<Uuid> {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .map(|roster| roster.owner_id)
    }
}

#[async_trait]
impl MembershipResolver for InMemoryMembershipRegistry {
    async fn members_of(&self, project_id: Uuid) -> Result<BTreeSet<Uuid>, DomainError> {
        let projects = self
            .projects
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let roster = projects
            .get(&project_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Project, project_id))?;
        let mut members = roster.member_ids.clone();
        members.insert(roster.owner_id);
        Ok(members)
    }
}
