//! Live view of one chat room.
//!
//! Entering a room subscribes to its insert events, loads the history and then hands the
//! subscription's queue to a single drain task which appends events in arrival order.
//! Sending never touches the local list, the sender sees their message once it comes back
//! through the subscription like everybody else's.

use crate::chat::error::ChatError;
use crate::chat::lifecycle::SubscriptionState;
use crate::chat::model::{ChatEntry, ChatMessage, NewChatMessage};
use crate::chat::profile_cache::ProfileCache;
use crate::gateway::Gateway;
use crate::gateway::realtime::SubscriptionId;
use crate::types::uuid::Uuid;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod profile_cache;


pub struct ChatRoom {
	gateway: Arc<dyn Gateway>,
	event_buffer: usize,
	shared: Arc<Shared>,
	active: Option<ActiveRoom>,
}

struct Shared {
	local: parking_lot::Mutex<LocalState>,
	profile_cache: ProfileCache,
	updates: watch::Sender<usize>,
}

#[derive(Default)]
struct LocalState {
	subscription_state: SubscriptionState,
	/// Incremented on every entry, so a drain task of an earlier entry can't write.
	generation: u64,
	room_uuid: Option<Uuid>,
	entries: Vec<ChatEntry>,
}

/// Owned from the moment the subscription exists, so a cancelled entry can still be released.
struct ActiveRoom {
	room_uuid: Uuid,
	subscription_id: SubscriptionId,
	drain_task: Option<JoinHandle<()>>,
}

impl ChatRoom {
	pub fn new(gateway: Arc<dyn Gateway>, event_buffer: usize, profile_cache_capacity: usize) -> Self {
		let shared = Shared {
			local: Default::default(),
			profile_cache: ProfileCache::with_capacity(profile_cache_capacity),
			updates: watch::channel(0).0,
		};

		Self {
			gateway,
			event_buffer,
			shared: Arc::new(shared),
			active: None,
		}
	}

	/// Loads the room's history and keeps it live until [`ChatRoom::leave`] or another entry.
	///
	/// A room that is already entered (this one or another) is released first, so there is
	/// never more than one subscription.
	pub async fn enter_room(&mut self, room_uuid: Uuid) -> Result<(), ChatError> {
		self.leave().await?;

		let generation = {
			let mut local = self.shared.local.lock();
			local.subscription_state = local.subscription_state.transition(SubscriptionState::Opening)?;
			local.generation += 1;
			local.room_uuid = Some(room_uuid);
			local.generation
		};

		let subscription = match self.gateway.realtime().subscribe(room_uuid, self.event_buffer).await {
			Ok(subscription) => subscription,
			Err(error) => {
				warn!(room = %room_uuid, %error, "Failed to subscribe to room.");
				let mut local = self.shared.local.lock();
				local.subscription_state = local.subscription_state.transition(SubscriptionState::Closed)?;
				local.room_uuid = None;
				return Err(error.into());
			}
		};
		let subscription_id = subscription.id();
		self.active = Some(ActiveRoom {
			room_uuid,
			subscription_id,
			drain_task: None,
		});
		self.shared.transition(SubscriptionState::Open)?;
		debug!(room = %room_uuid, subscription = %subscription_id, "Subscription is open.");

		// Events arriving while the history loads stay queued and are appended afterwards.
		let history = match self.gateway.chat().fetch_messages(room_uuid).await {
			Ok(history) => history,
			Err(error) => {
				warn!(room = %room_uuid, %error, "Failed to load chat history.");
				self.leave().await?;
				return Err(error.into());
			}
		};

		for author in history.iter().filter_map(|entry| entry.author.clone()) {
			self.shared.profile_cache.insert(author);
		}
		let history_length = history.len();
		self.shared.local.lock().entries = history;
		self.shared.updates.send_replace(history_length);
		info!(room = %room_uuid, messages = history_length, "Entered room.");

		let drain_task = tokio::spawn(drain_events(
			Arc::clone(&self.shared),
			Arc::clone(&self.gateway),
			generation,
			subscription.into_events(),
		));
		if let Some(active) = self.active.as_mut() {
			active.drain_task = Some(drain_task);
		}

		Ok(())
	}

	/// Releases the subscription and discards the local message list.
	///
	/// Also brings the room back to [`SubscriptionState::Closed`] after an entry that was cancelled
	/// or a subscription the transport ended. Does nothing outside a room.
	pub async fn leave(&mut self) -> Result<(), ChatError> {
		let Some(ActiveRoom {
			room_uuid,
			subscription_id,
			drain_task,
		}) = self.active.take()
		else {
			// an entry cancelled while subscribing leaves Opening behind
			if self.state() != SubscriptionState::Closed {
				self.shared.close()?;
			}
			return Ok(());
		};

		self.release(subscription_id, drain_task).await?;
		info!(room = %room_uuid, "Left room.");
		Ok(())
	}

	async fn release(&self, subscription_id: SubscriptionId, drain_task: Option<JoinHandle<()>>) -> Result<(), ChatError> {
		if self.state() == SubscriptionState::Open {
			self.shared.transition(SubscriptionState::Closing)?;
		}
		if let Some(drain_task) = drain_task {
			drain_task.abort();
		}

		if let Err(error) = self.gateway.realtime().unsubscribe(subscription_id).await {
			warn!(subscription = %subscription_id, %error, "Failed to release subscription.");
		}

		self.shared.close()
	}

	/// Writes a message into a room. Whitespace-only bodies are ignored and yield `None`.
	///
	/// The local list is left alone, the message shows up when its insert event arrives.
	pub async fn send_message(
		&self,
		room_uuid: Uuid,
		author_uuid: Uuid,
		body: &str,
	) -> Result<Option<ChatMessage>, ChatError> {
		let body = body.trim();
		if body.is_empty() {
			debug!(room = %room_uuid, "Ignoring empty message.");
			return Ok(None);
		}

		let message = self
			.gateway
			.chat()
			.insert_message(NewChatMessage {
				room_uuid,
				author_uuid,
				body: body.to_owned(),
			})
			.await?;
		debug!(room = %room_uuid, message = %message.uuid, "Message sent.");

		Ok(Some(message))
	}

	/// Snapshot of the local message list.
	pub fn messages(&self) -> Vec<ChatEntry> {
		self.shared.local.lock().entries.clone()
	}

	pub fn state(&self) -> SubscriptionState {
		self.shared.local.lock().subscription_state
	}

	pub fn room_uuid(&self) -> Option<Uuid> {
		self.shared.local.lock().room_uuid
	}

	/// Changes whenever the local message list does, carrying its new length.
	pub fn updates(&self) -> watch::Receiver<usize> {
		self.shared.updates.subscribe()
	}
}

impl Drop for ChatRoom {
	fn drop(&mut self) {
		let Some(active) = self.active.take() else {
			return;
		};

		if let Some(drain_task) = active.drain_task {
			drain_task.abort();
		}
		self.shared.local.lock().subscription_state = SubscriptionState::Closed;

		// Best effort, there is no way to wait for the acknowledgement here.
		if let Ok(runtime) = tokio::runtime::Handle::try_current() {
			let gateway = Arc::clone(&self.gateway);
			runtime.spawn(async move {
				if let Err(error) = gateway.realtime().unsubscribe(active.subscription_id).await {
					warn!(subscription = %active.subscription_id, %error, "Failed to release subscription of dropped room.");
				}
			});
		}
	}
}

impl Shared {
	fn transition(&self, to: SubscriptionState) -> Result<(), ChatError> {
		let mut local = self.local.lock();
		local.subscription_state = local.subscription_state.transition(to)?;
		Ok(())
	}

	/// Ends up Closed with an empty list, from wherever the room is.
	fn close(&self) -> Result<(), ChatError> {
		{
			let mut local = self.local.lock();
			if local.subscription_state != SubscriptionState::Closed {
				local.subscription_state = local.subscription_state.transition(SubscriptionState::Closed)?;
			}
			local.room_uuid = None;
			local.entries.clear();
		}
		self.updates.send_replace(0);
		Ok(())
	}

	/// The transport ended the subscription on its own, the room stays visible but is Closed.
	fn disconnect(&self, generation: u64) {
		let length = {
			let mut local = self.local.lock();
			if local.generation != generation || !local.subscription_state.accepts_events() {
				return;
			}
			let closed = local
				.subscription_state
				.transition(SubscriptionState::Closing)
				.and_then(|closing| closing.transition(SubscriptionState::Closed));
			match closed {
				Ok(closed) => local.subscription_state = closed,
				Err(error) => {
					warn!(%error, "Failed to close disconnected room.");
					return;
				}
			}
			local.entries.len()
		};
		warn!(generation, "Subscription ended by the transport, room is disconnected.");
		self.updates.send_replace(length);
	}

	fn accepts_events(&self, generation: u64) -> bool {
		let local = self.local.lock();
		local.generation == generation && local.subscription_state.accepts_events()
	}
}

async fn drain_events(
	shared: Arc<Shared>,
	gateway: Arc<dyn Gateway>,
	generation: u64,
	mut events: mpsc::Receiver<ChatMessage>,
) {
	while let Some(message) = events.recv().await {
		if !shared.accepts_events(generation) {
			debug!(message = %message.uuid, "Dropping event of closed subscription.");
			continue;
		}

		let author = shared
			.profile_cache
			.author(gateway.profile(), message.author_uuid)
			.await;

		let length = {
			let mut local = shared.local.lock();
			// the room may have been left while the profile was loading
			if local.generation != generation || !local.subscription_state.accepts_events() {
				debug!(message = %message.uuid, "Discarding event that resolved after teardown.");
				continue;
			}

			if local.entries.iter().any(|entry| entry.message.uuid == message.uuid) {
				debug!(message = %message.uuid, "Event is already part of the history.");
				continue;
			}

			local.entries.push(ChatEntry { message, author });
			local.entries.len()
		};
		shared.updates.send_replace(length);
	}

	debug!(generation, "Event queue ended.");
	shared.disconnect(generation);
}
