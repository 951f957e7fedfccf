//! Per-user notification channels.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default buffer size of each user's channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Why a message could not be handed to a subscriber.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber has no live channel.
    #[error("subscriber {0} is not connected")]
    NotConnected(Uuid),
}

/// The transport the dispatcher writes to.
pub trait SubscriberChannels: Send + Sync {
    /// Hands `message` to one subscriber's private channel.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::NotConnected` if nobody is listening.
    fn send_to(&self, subscriber_id: Uuid, message: &str) -> Result<(), DeliveryError>;

    /// Subscribers with at least one live channel.
    fn connected(&self) -> Vec<Uuid>;
}

/// One `broadcast` channel per user; every open connection of that user is
/// a receiver on it.
#[derive(Debug)]
pub struct BroadcastHub {
    capacity: usize,
    channels: RwLock<HashMap<Uuid, broadcast::Sender<String>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastHub {
    /// Creates a hub whose channels buffer `capacity` messages each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a receiver on `user_id`'s private channel.
    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<String> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Forgets `user_id`'s channel once its last receiver is gone.
    ///
    /// Called when a connection closes; a user with another open
    /// connection keeps the channel.
    pub fn release(&self, user_id: Uuid) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(&user_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&user_id);
        }
    }

    /// Number of users with a channel entry, live or not.
    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SubscriberChannels for BroadcastHub {
    fn send_to(&self, subscriber_id: Uuid, message: &str) -> Result<(), DeliveryError> {
        let sent = {
            let channels = self
                .channels
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            channels
                .get(&subscriber_id)
                .map(|sender| sender.send(message.to_owned()))
        };
        match sent {
            Some(Ok(_)) => Ok(()),
            Some(Err(_)) => {
                self.release(subscriber_id);
                Err(DeliveryError::NotConnected(subscriber_id))
            }
            None => Err(DeliveryError::NotConnected(subscriber_id)),
        }
    }

    fn connected(&self) -> Vec<Uuid> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, sender)| sender.receiver_count() > 0)
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}
