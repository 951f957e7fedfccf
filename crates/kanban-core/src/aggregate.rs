//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// An aggregate mutated only inside one transaction boundary.
///
/// Every accepted change is recorded as an event: it is applied to the
/// in-memory state immediately and queued so the caller can publish it once
/// the store has committed the new state.
pub trait AggregateRoot: Send + Sync {
    /// The change record this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the version the aggregate was loaded at.
    ///
    /// Stores compare this against their own version before committing.
    fn version(&self) -> i64;

    /// Apply an event to the in-memory state.
    fn apply(&mut self, event: &Self::Event);

    /// Returns events recorded since the aggregate was loaded.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drains the recorded events, leaving the queue empty.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}
