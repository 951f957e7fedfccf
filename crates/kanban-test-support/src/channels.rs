//! Test fanout doubles.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use kanban_core::error::DomainError;
use kanban_fanout::hub::{DeliveryError, SubscriberChannels};
use kanban_fanout::membership::MembershipResolver;
use uuid::Uuid;

/// Channels that record every message sent to a connected subscriber.
#[derive(Debug, Default)]
pub struct RecordingChannels {
    connected: Mutex<HashSet<Uuid>>,
    sent: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingChannels {
    /// Creates channels with the given subscribers connected.
    #[must_use]
    pub fn with_connected(subscribers: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            connected: Mutex::new(subscribers.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of every `(subscriber, message)` pair sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<(Uuid, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages sent to one subscriber, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent_to(&self, subscriber_id: Uuid) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == subscriber_id)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl SubscriberChannels for RecordingChannels {
    fn send_to(&self, subscriber_id: Uuid, message: &str) -> Result<(), DeliveryError> {
        if !self.connected.lock().unwrap().contains(&subscriber_id) {
            return Err(DeliveryError::NotConnected(subscriber_id));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subscriber_id, message.to_owned()));
        Ok(())
    }

    fn connected(&self) -> Vec<Uuid> {
        self.connected.lock().unwrap().iter().copied().collect()
    }
}

/// A membership resolver that always fails.
#[derive(Debug)]
pub struct FailingMembershipResolver;

#[async_trait]
impl MembershipResolver for FailingMembershipResolver {
    async fn members_of(&self, _project_id: Uuid) -> Result<BTreeSet<Uuid>, DomainError> {
        Err(DomainError::StorageUnavailable("membership service down".into()))
    }
}
