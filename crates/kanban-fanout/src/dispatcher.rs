//! Delivers committed events to the right subscribers.
//!
//! Delivery happens after the commit that produced the events and never
//! feeds back into it: a member who cannot be reached is logged and skipped.
//! Batches published through a `DispatchQueue` are delivered one at a time,
//! in the order they were queued.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::hub::SubscriberChannels;
use crate::membership::MembershipResolver;
use crate::notification::{ProjectEvent, Scope};

/// Counts from one `dispatch` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Messages handed to a live channel.
    pub delivered: usize,
    /// Messages whose recipient could not be reached.
    pub dropped: usize,
    /// Events skipped because their audience could not be resolved.
    pub unresolved: usize,
}

impl DeliveryReport {
    fn absorb(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.unresolved += other.unresolved;
    }
}

/// Fans events out to project members over `SubscriberChannels`.
#[derive(Clone)]
pub struct EventDispatcher {
    membership: Arc<dyn MembershipResolver>,
    channels: Arc<dyn SubscriberChannels>,
}

impl EventDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        membership: Arc<dyn MembershipResolver>,
        channels: Arc<dyn SubscriberChannels>,
    ) -> Self {
        Self {
            membership,
            channels,
        }
    }

    /// Delivers `events` in order, each exactly once to each recipient.
    ///
    /// Project membership is resolved once per call, so members added by an
    /// earlier commit are always included.
    pub async fn dispatch(&self, events: &[ProjectEvent]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut audiences: HashMap<Scope, Option<BTreeSet<Uuid>>> = HashMap::new();

        for event in events {
            let scope = event.scope();
            if !audiences.contains_key(&scope) {
                let resolved = self.resolve(scope).await;
                audiences.insert(scope, resolved);
            }
            let Some(Some(recipients)) = audiences.get(&scope) else {
                report.unresolved += 1;
                continue;
            };

            let encoded = event
                .to_notification()
                .and_then(|notification| serde_json::to_string(&notification));
            let message = match encoded {
                Ok(message) => message,
                Err(err) => {
                    warn!(event_type = event.event_type(), error = %err, "notification not serializable");
                    report.unresolved += 1;
                    continue;
                }
            };
            for recipient in recipients {
                match self.channels.send_to(*recipient, &message) {
                    Ok(()) => report.delivered += 1,
                    Err(err) => {
                        debug!(
                            event_type = event.event_type(),
                            recipient = %recipient,
                            error = %err,
                            "notification dropped"
                        );
                        report.dropped += 1;
                    }
                }
            }
        }

        debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            unresolved = report.unresolved,
            "dispatch finished"
        );
        report
    }

    async fn resolve(&self, scope: Scope) -> Option<BTreeSet<Uuid>> {
        match scope {
            Scope::MembersOf(project_id) => match self.membership.members_of(project_id).await {
                Ok(members) => Some(members),
                Err(err) => {
                    warn!(project_id = %project_id, error = %err, "membership lookup failed, events dropped");
                    None
                }
            },
            Scope::AllConnected => Some(self.channels.connected().into_iter().collect()),
        }
    }
}

/// Single background worker that delivers queued batches in order.
///
/// Each commit hands its events to `publish` after it succeeds; the worker
/// drains them one batch at a time, so a batch is never overtaken by a
/// later one.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::UnboundedSender<Vec<ProjectEvent>>,
}

impl DispatchQueue {
    /// Starts the worker on the current Tokio runtime.
    ///
    /// The worker stops once every clone of the returned queue is dropped;
    /// the handle resolves to the totals over every batch it delivered.
    #[must_use]
    pub fn start(dispatcher: EventDispatcher) -> (Self, JoinHandle<DeliveryReport>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<ProjectEvent>>();
        let worker = tokio::spawn(async move {
            let mut totals = DeliveryReport::default();
            while let Some(batch) = receiver.recv().await {
                totals.absorb(dispatcher.dispatch(&batch).await);
            }
            debug!(delivered = totals.delivered, "dispatch queue closed");
            totals
        });
        (Self { sender }, worker)
    }

    /// Queues `events` for delivery without waiting for it.
    pub fn publish(&self, events: Vec<ProjectEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(err) = self.sender.send(events) {
            warn!(events = err.0.len(), "dispatch worker gone, events dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::BroadcastHub;
    use crate::membership::InMemoryMembershipRegistry;
    use crate::notification::{JoinRequest, Notification};
    use chrono::Utc;
    use kanban_board::domain::events::{
        BoardEvent, BoardEventKind, CARD_DELETED_EVENT_TYPE, COLUMN_DELETED_EVENT_TYPE,
        CardDeleted, ColumnDeleted,
    };
    use kanban_core::event::EventMetadata;
    use tokio::sync::broadcast;

    struct Fixture {
        project_id: Uuid,
        owner: Uuid,
        members: [Uuid; 2],
        outsider: Uuid,
        registry: Arc<InMemoryMembershipRegistry>,
        hub: Arc<BroadcastHub>,
        dispatcher: EventDispatcher,
    }

    fn fixture() -> Fixture {
        let project_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let members = [Uuid::new_v4(), Uuid::new_v4()];
        let registry = Arc::new(InMemoryMembershipRegistry::new());
        registry.set_project(project_id, owner, [owner, members[0], members[1]]);
        let hub = Arc::new(BroadcastHub::default());
        let dispatcher = EventDispatcher::new(registry.clone(), hub.clone());
        Fixture {
            project_id,
            owner,
            members,
            outsider: Uuid::new_v4(),
            registry,
            hub,
            dispatcher,
        }
    }

    fn board_event(event_type: &str, kind: BoardEventKind, actor_id: Uuid, seq: i64) -> BoardEvent {
        BoardEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: event_type.to_owned(),
                aggregate_id: Uuid::new_v4(),
                sequence_number: seq,
                correlation_id: Uuid::new_v4(),
                actor_id,
                occurred_at: Utc::now(),
            },
            kind,
        }
    }

    fn card_deleted(actor_id: Uuid) -> BoardEvent {
        board_event(
            CARD_DELETED_EVENT_TYPE,
            BoardEventKind::CardDeleted(CardDeleted {
                card_id: Uuid::new_v4(),
                column_id: Uuid::new_v4(),
            }),
            actor_id,
            1,
        )
    }

    fn drain(receiver: &mut broadcast::Receiver<String>) -> Vec<Notification> {
        let mut received = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            received.push(serde_json::from_str(&message).unwrap());
        }
        received
    }

    #[tokio::test]
    async fn test_board_change_reaches_each_member_once_and_no_outsider() {
        // Arrange
        let f = fixture();
        let mut owner_rx = f.hub.subscribe(f.owner);
        let mut first_rx = f.hub.subscribe(f.members[0]);
        let mut second_rx = f.hub.subscribe(f.members[1]);
        let mut outsider_rx = f.hub.subscribe(f.outsider);
        let events = ProjectEvent::from_board_events(f.project_id, 1, [card_deleted(f.members[0])]);

        // Act
        let report = f.dispatcher.dispatch(&events).await;

        // Assert
        assert_eq!(report.delivered, 3);
        assert_eq!(report.dropped, 0);
        for receiver in [&mut owner_rx, &mut first_rx, &mut second_rx] {
            let received = drain(receiver);
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].event_type, CARD_DELETED_EVENT_TYPE);
            assert_eq!(received[0].actor_id, f.members[0]);
            assert_eq!(received[0].project_id, f.project_id);
        }
        assert!(drain(&mut outsider_rx).is_empty());
    }

    #[tokio::test]
    async fn test_events_arrive_in_commit_order() {
        // Arrange
        let f = fixture();
        let mut owner_rx = f.hub.subscribe(f.owner);
        let column_deleted = board_event(
            COLUMN_DELETED_EVENT_TYPE,
            BoardEventKind::ColumnDeleted(ColumnDeleted {
                board_id: Uuid::new_v4(),
                column_id: Uuid::new_v4(),
                deleted_card_ids: vec![],
            }),
            f.owner,
            3,
        );
        let events = ProjectEvent::from_board_events(
            f.project_id,
            1,
            [card_deleted(f.owner), card_deleted(f.owner), column_deleted],
        );

        // Act
        f.dispatcher.dispatch(&events).await;

        // Assert
        let types: Vec<String> = drain(&mut owner_rx)
            .into_iter()
            .map(|n| n.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                CARD_DELETED_EVENT_TYPE,
                CARD_DELETED_EVENT_TYPE,
                COLUMN_DELETED_EVENT_TYPE
            ]
        );
    }

    #[tokio::test]
    async fn test_disconnected_member_is_dropped_without_affecting_others() {
        // Arrange
        let f = fixture();
        let mut owner_rx = f.hub.subscribe(f.owner);
        let events = ProjectEvent::from_board_events(f.project_id, 1, [card_deleted(f.owner)]);

        // Act
        let report = f.dispatcher.dispatch(&events).await;

        // Assert
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(drain(&mut owner_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_newly_added_member_receives_next_dispatch() {
        // Arrange
        let f = fixture();
        let mut newcomer_rx = f.hub.subscribe(f.outsider);
        f.registry.add_member(f.project_id, f.outsider).unwrap();
        let events = ProjectEvent::from_board_events(f.project_id, 1, [card_deleted(f.owner)]);

        // Act
        f.dispatcher.dispatch(&events).await;

        // Assert
        assert_eq!(drain(&mut newcomer_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_join_request_reaches_all_connected_users() {
        // Arrange
        let f = fixture();
        let mut owner_rx = f.hub.subscribe(f.owner);
        let mut outsider_rx = f.hub.subscribe(f.outsider);
        let request = JoinRequest {
            project_id: f.project_id,
            requester_id: f.outsider,
            actor_id: f.outsider,
            occurred_at: Utc::now(),
        };

        // Act
        let report = f
            .dispatcher
            .dispatch(&[ProjectEvent::JoinRequestRaised(request)])
            .await;

        // Assert
        assert_eq!(report.delivered, 2);
        assert_eq!(drain(&mut owner_rx).len(), 1);
        assert_eq!(drain(&mut outsider_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_project_events_are_unresolved() {
        let f = fixture();
        let (queue, worker) = DispatchQueue::start(f.dispatcher.clone());
        queue.publish(ProjectEvent::from_board_events(
            Uuid::new_v4(),
            1,
            [card_deleted(f.owner)],
        ));
        drop(queue);

        let totals = worker.await.unwrap();

        assert_eq!(totals.unresolved, 1);
        assert_eq!(totals.delivered, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_sequential_commits_are_delivered_in_commit_order() {
        // Arrange
        const COMMITS: u32 = 500;
        let f = fixture();
        let hub = Arc::new(BroadcastHub::new(COMMITS as usize));
        let mut owner_rx = hub.subscribe(f.owner);
        let dispatcher = EventDispatcher::new(f.registry.clone(), hub.clone());
        let (queue, worker) = DispatchQueue::start(dispatcher);

        // Act
        for commit in 1..=COMMITS {
            let event = board_event(
                CARD_DELETED_EVENT_TYPE,
                BoardEventKind::CardDeleted(CardDeleted {
                    card_id: Uuid::from_u128(u128::from(commit)),
                    column_id: Uuid::new_v4(),
                }),
                f.owner,
                1,
            );
            queue.publish(ProjectEvent::from_board_events(
                f.project_id,
                i64::from(commit),
                [event],
            ));
        }
        drop(queue);
        let totals = worker.await.unwrap();

        // Assert
        assert_eq!(totals.delivered, COMMITS as usize);
        let received = drain(&mut owner_rx);
        assert_eq!(received.len(), COMMITS as usize);
        for (expected, notification) in (1..=COMMITS).zip(&received) {
            assert_eq!(notification.version, Some(i64::from(expected)));
            assert_eq!(
                notification.payload["card_id"],
                Uuid::from_u128(u128::from(expected)).to_string()
            );
        }
    }
}
