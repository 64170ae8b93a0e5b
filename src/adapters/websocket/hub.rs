//! Realtime fan-out hub.
//!
//! One live channel per operator. Registering again replaces the previous
//! channel; dropping its sender ends the old connection's forward loop.
//!
//! ```text
//! publish(event) ──serialize once──► try_send ──► user-1 channel
//!                                     ├────────► user-2 channel
//!                                     └────────► user-3 channel (full → dropped)
//! ```
//!
//! Delivery never waits on a recipient. A full or closed channel is
//! unregistered on the spot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::foundation::UserId;
use crate::ports::{LiveEvent, LiveEventPublisher};

use super::messages::{EventFrame, ServerMessage};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Unique identifier for one registered channel.
///
/// Distinguishes a replaced channel from its successor for the same user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    client_id: ClientId,
    tx: mpsc::Sender<Arc<String>>,
}

/// Registry of live operator channels.
pub struct FanoutHub {
    channels: RwLock<HashMap<UserId, Subscription>>,
    channel_capacity: usize,
}

impl FanoutHub {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Register a fresh channel for `user`, replacing any prior one.
    pub fn register(&self, user: UserId) -> (ClientId, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let client_id = ClientId::new();
        let previous = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                user.clone(),
                Subscription {
                    client_id: client_id.clone(),
                    tx,
                },
            );
        if let Some(previous) = previous {
            tracing::debug!(user_id = %user, replaced = %previous.client_id, "replaced live channel");
        }
        (client_id, rx)
    }

    /// Remove the channel of `user`, whichever it is.
    pub fn unregister(&self, user: &UserId) -> bool {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user)
            .is_some()
    }

    /// Remove the channel of `user` only if it is still `client_id`.
    ///
    /// Used by connection cleanup so a replaced connection cannot evict its
    /// successor.
    pub fn release(&self, user: &UserId, client_id: &ClientId) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        match channels.get(user) {
            Some(sub) if &sub.client_id == client_id => {
                channels.remove(user);
                true
            }
            _ => false,
        }
    }

    /// Send a control message to one user.
    pub fn send_to(&self, user: &UserId, message: &ServerMessage) -> bool {
        let Some(json) = Self::serialize(message) else {
            return false;
        };
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(user)
            .is_some_and(|sub| sub.tx.try_send(json).is_ok())
    }

    /// Deliver a serializable payload to every registered channel.
    ///
    /// Returns the number of channels that accepted it.
    pub fn broadcast<T: Serialize>(&self, payload: &T) -> usize {
        if self.is_empty() {
            return 0;
        }
        let Some(json) = Self::serialize(payload) else {
            return 0;
        };

        let mut failed = Vec::new();
        let mut delivered = 0;
        {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            for (user, sub) in channels.iter() {
                if sub.tx.try_send(Arc::clone(&json)).is_ok() {
                    delivered += 1;
                } else {
                    failed.push((user.clone(), sub.client_id.clone()));
                }
            }
        }

        for (user, client_id) in failed {
            if self.release(&user, &client_id) {
                tracing::warn!(user_id = %user, "dropped unresponsive live channel");
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.channels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_registered(&self, user: &UserId) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user)
    }

    fn serialize<T: Serialize>(payload: &T) -> Option<Arc<String>> {
        match serde_json::to_string(payload) {
            Ok(json) => Some(Arc::new(json)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize live message");
                None
            }
        }
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl LiveEventPublisher for FanoutHub {
    fn publish(&self, event: LiveEvent) {
        let delivered = self.broadcast(&EventFrame::from(&event));
        tracing::debug!(event_type = %event.kind, recipients = delivered, "published live event");
    }
}
