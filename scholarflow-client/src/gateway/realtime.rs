use crate::atomic_sequence::AtomicSequence;
use crate::chat::model::ChatMessage;
use crate::gateway::error::GatewayError;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use static_assertions::assert_obj_safe;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("Subscription({_0})")]
pub struct SubscriptionId(u64);

/// A live feed of messages inserted into one room.
///
/// The handle has to be given back to [`RealtimeGateway::unsubscribe`] through its id, after which
/// the event queue ends.
#[derive(Debug)]
pub struct Subscription {
	id: SubscriptionId,
	room_uuid: Uuid,
	events: mpsc::Receiver<ChatMessage>,
}

impl Subscription {
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	pub fn room_uuid(&self) -> Uuid {
		self.room_uuid
	}

	pub fn into_events(self) -> mpsc::Receiver<ChatMessage> {
		self.events
	}
}

#[async_trait]
pub trait RealtimeGateway: Send + Sync {
	/// Opens a subscription to insert events on the messages of `room_uuid`.
	/// Returns once the transport acknowledged it. At most `buffer` undelivered events are queued.
	async fn subscribe(&self, room_uuid: Uuid, buffer: usize) -> Result<Subscription, GatewayError>;

	/// Releases a subscription. Returns once the transport acknowledged the release.
	async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<(), GatewayError>;
}

assert_obj_safe!(RealtimeGateway);

/// Routes insert events to the subscriptions of their room.
pub(crate) struct SubscriberRegistry {
	id_sequence: AtomicSequence,
	subscribers: parking_lot::Mutex<HashMap<SubscriptionId, Subscriber>>,
}

struct Subscriber {
	room_uuid: Uuid,
	sender: mpsc::Sender<ChatMessage>,
}

impl Default for SubscriberRegistry {
	fn default() -> Self {
		Self {
			id_sequence: AtomicSequence::starting_at(1),
			subscribers: Default::default(),
		}
	}
}

impl SubscriberRegistry {
	pub fn register(&self, room_uuid: Uuid, buffer: usize) -> Subscription {
		let id = SubscriptionId(self.id_sequence.next());
		let (sender, events) = mpsc::channel(buffer.max(1));
		self.subscribers.lock().insert(id, Subscriber { room_uuid, sender });

		Subscription { id, room_uuid, events }
	}

	/// Drops the sending side, so the subscription's queue ends after the already queued events.
	pub fn remove(&self, subscription_id: SubscriptionId) -> bool {
		self.subscribers.lock().remove(&subscription_id).is_some()
	}

	pub fn room_of(&self, subscription_id: SubscriptionId) -> Option<Uuid> {
		self.subscribers
			.lock()
			.get(&subscription_id)
			.map(|subscriber| subscriber.room_uuid)
	}

	pub fn active_count(&self) -> usize {
		self.subscribers.lock().len()
	}

	/// Delivers to every subscription of the message's room without waiting for slow consumers.
	pub fn publish(&self, message: &ChatMessage) {
		let mut subscribers = self.subscribers.lock();
		subscribers.retain(|id, subscriber| {
			if subscriber.room_uuid != message.room_uuid {
				return true;
			}

			match subscriber.sender.try_send(message.clone()) {
				Ok(()) => true,
				Err(TrySendError::Full(_)) => {
					warn!(subscription = %id, message = %message.uuid, "Event queue is full, dropping event.");
					true
				}
				Err(TrySendError::Closed(_)) => {
					debug!(subscription = %id, "Subscriber went away, removing it.");
					false
				}
			}
		});
	}

	/// Ends the queues of every subscription of a room, as a lost connection does.
	#[cfg(test)]
	pub fn remove_room(&self, room_uuid: Uuid) -> usize {
		let mut subscribers = self.subscribers.lock();
		let before = subscribers.len();
		subscribers.retain(|_, subscriber| subscriber.room_uuid != room_uuid);
		before - subscribers.len()
	}
}
