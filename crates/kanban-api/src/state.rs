//! Shared application state.

use std::sync::Arc;

use kanban_board::application::command_handlers::{BoardMutator, MutatorConfig};
use kanban_board::domain::repository::BoardStore;
use kanban_core::clock::Clock;
use kanban_fanout::dispatcher::{DispatchQueue, EventDispatcher};
use kanban_fanout::hub::BroadcastHub;
use kanban_fanout::membership::InMemoryMembershipRegistry;
use kanban_fanout::notification::ProjectEvent;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Applies board commands.
    pub mutator: BoardMutator,
    /// Board storage, for queries.
    pub store: Arc<dyn BoardStore>,
    /// Project owners, members and pending join requests.
    pub membership: Arc<InMemoryMembershipRegistry>,
    /// Per-user notification channels.
    pub hub: Arc<BroadcastHub>,
    /// Delivers committed events to subscribers in publish order.
    pub dispatch_queue: DispatchQueue,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state over `store` and start the dispatch
    /// worker on the current Tokio runtime.
    #[must_use]
    pub fn new(
        store: Arc<dyn BoardStore>,
        clock: Arc<dyn Clock>,
        config: MutatorConfig,
        channel_capacity: usize,
    ) -> Self {
        let membership = Arc::new(InMemoryMembershipRegistry::new());
        let hub = Arc::new(BroadcastHub::new(channel_capacity));
        let (dispatch_queue, _worker) =
            DispatchQueue::start(EventDispatcher::new(membership.clone(), hub.clone()));
        Self {
            mutator: BoardMutator::new(store.clone(), clock.clone(), config),
            store,
            dispatch_queue,
            membership,
            hub,
            clock,
        }
    }

    /// Queues `events` for delivery without waiting for it.
    ///
    /// Handlers publish right after their commit returns, so one client's
    /// successive changes reach subscribers in the order they committed.
    pub fn publish(&self, events: Vec<ProjectEvent>) {
        self.dispatch_queue.publish(events);
    }
}
