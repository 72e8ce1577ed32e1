//! In-memory [`Gateway`] that records its calls and can be held, failed or fed events on demand.

use crate::chat::gateway::ChatGateway;
use crate::chat::model::{ChatEntry, ChatMessage, NewChatMessage};
use crate::feed::gateway::PostGateway;
use crate::feed::model::{FeedPost, NewPost, Post};
use crate::forum::gateway::RoomGateway;
use crate::forum::model::{NewRoom, Room};
use crate::gateway::auth::{AuthGateway, AuthStateChange, AuthTokens, AuthUser, SessionSlot};
use crate::gateway::error::GatewayError;
use crate::gateway::impl_gateway;
use crate::gateway::realtime::{RealtimeGateway, SubscriberRegistry, Subscription, SubscriptionId};
use crate::gateway::storage::ObjectStorage;
use crate::gateway::test::TestFactory;
use crate::gateway::Gateway;
use crate::profile::gateway::ProfileGateway;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, Semaphore, broadcast};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
	Subscribe(Uuid),
	Unsubscribe(SubscriptionId),
	FetchMessages(Uuid),
	InsertMessage(NewChatMessage),
	FetchProfile(Uuid),
	UpsertProfile(Uuid),
	Upload { bucket: String, name: String },
	InsertPost(NewPost),
}

/// Scripted failures, every flagged operation fails with [`GatewayError::Unavailable`].
#[derive(Default)]
pub struct Failures {
	pub subscribe: bool,
	pub unsubscribe: bool,
	pub history: bool,
	pub profile: bool,
	pub upload: bool,
	/// Fails inserts with [`GatewayError::Rejected`] carrying this message.
	pub insert: Option<String>,
}

/// Holds calls passing it until released.
pub struct Gate {
	held: AtomicBool,
	entered: Notify,
	permits: Semaphore,
}

impl Default for Gate {
	fn default() -> Self {
		Self {
			held: AtomicBool::new(false),
			entered: Notify::new(),
			permits: Semaphore::new(0),
		}
	}
}

impl Gate {
	pub fn hold(&self) {
		self.held.store(true, Ordering::SeqCst);
	}

	/// Lets the held call (or the next one to arrive) through and stops holding.
	pub fn release(&self) {
		self.held.store(false, Ordering::SeqCst);
		self.permits.add_permits(1);
	}

	/// Waits until a call is held at the gate.
	pub async fn entered(&self) {
		self.entered.notified().await;
	}

	async fn pass(&self) {
		if !self.held.load(Ordering::SeqCst) {
			return;
		}

		self.entered.notify_one();
		if let Ok(permit) = self.permits.acquire().await {
			permit.forget();
		}
	}
}

#[derive(Default)]
struct FakeState {
	messages: Vec<ChatMessage>,
	profiles: HashMap<Uuid, Profile>,
	rooms: Vec<Room>,
	posts: Vec<Post>,
	objects: HashMap<(String, String), (String, Vec<u8>)>,
	sessions: HashMap<String, AuthUser>,
}

#[derive(Default)]
pub struct FakeGateway {
	state: Mutex<FakeState>,
	calls: Mutex<Vec<Call>>,
	failures: Mutex<Failures>,
	session: SessionSlot,
	subscribers: SubscriberRegistry,
	pub history_gate: Gate,
	pub profile_gate: Gate,
}

impl_gateway!(FakeGateway);

impl FakeGateway {
	pub fn new() -> Arc<Self> {
		Arc::default()
	}

	pub fn fail(&self, configure: impl FnOnce(&mut Failures)) {
		configure(&mut self.failures.lock());
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn count_calls(&self, matches: impl Fn(&Call) -> bool) -> usize {
		self.calls.lock().iter().filter(|call| matches(call)).count()
	}

	pub fn add_profile(&self, username: &str) -> Profile {
		let profile = Profile {
			uuid: Uuid::new_v4(),
			username: username.to_owned(),
			full_name: None,
			bio: None,
			avatar_url: None,
		};
		self.state.lock().profiles.insert(profile.uuid, profile.clone());
		profile
	}

	/// Stores a message without announcing it, as if it was written before anyone subscribed.
	pub fn store_message(&self, room_uuid: Uuid, author_uuid: Uuid, body: &str) -> ChatMessage {
		let message = message(room_uuid, author_uuid, body);
		self.state.lock().messages.push(message.clone());
		message
	}

	/// Announces an insert event to the room's subscribers without storing the message.
	pub fn deliver(&self, message: &ChatMessage) {
		self.subscribers.publish(message);
	}

	pub fn add_session(&self, tokens: &AuthTokens, user: AuthUser) {
		self.state.lock().sessions.insert(tokens.access_token.clone(), user);
	}

	pub fn object(&self, bucket: &str, name: &str) -> Option<(String, Vec<u8>)> {
		self.state
			.lock()
			.objects
			.get(&(bucket.to_owned(), name.to_owned()))
			.cloned()
	}

	/// Ends the event queues of the room's subscriptions without being asked to.
	pub fn end_subscriptions(&self, room_uuid: Uuid) -> usize {
		self.subscribers.remove_room(room_uuid)
	}

	pub fn active_subscriptions(&self) -> usize {
		self.subscribers.active_count()
	}

	fn record(&self, call: Call) {
		self.calls.lock().push(call);
	}

	fn scripted_failure(&self, failing: impl FnOnce(&Failures) -> bool) -> Result<(), GatewayError> {
		if failing(&self.failures.lock()) {
			Err(GatewayError::Unavailable(anyhow!("Scripted failure")))
		} else {
			Ok(())
		}
	}

	fn entry(&self, message: ChatMessage) -> ChatEntry {
		let author = self.state.lock().profiles.get(&message.author_uuid).cloned();
		ChatEntry { message, author }
	}
}

pub fn message(room_uuid: Uuid, author_uuid: Uuid, body: &str) -> ChatMessage {
	ChatMessage {
		uuid: Uuid::new_v4(),
		room_uuid,
		author_uuid,
		body: body.to_owned(),
		created_at: Utc::now(),
	}
}

#[async_trait]
impl AuthGateway for FakeGateway {
	async fn set_session(&self, tokens: AuthTokens) -> Result<AuthUser, GatewayError> {
		let user = self.state.lock().sessions.get(&tokens.access_token).cloned();
		let user = user.ok_or_else(|| GatewayError::Unauthorized("Unknown token".to_owned()))?;
		self.session.install(tokens, user.clone());
		Ok(user)
	}

	fn current_user(&self) -> Option<AuthUser> {
		self.session.user()
	}

	async fn sign_out(&self) -> Result<(), GatewayError> {
		self.session.clear();
		Ok(())
	}

	fn auth_events(&self) -> broadcast::Receiver<AuthStateChange> {
		self.session.subscribe()
	}
}

#[async_trait]
impl ChatGateway for FakeGateway {
	async fn fetch_messages(&self, room_uuid: Uuid) -> Result<Vec<ChatEntry>, GatewayError> {
		self.record(Call::FetchMessages(room_uuid));
		self.history_gate.pass().await;
		self.scripted_failure(|failures| failures.history)?;

		let messages: Vec<_> = self
			.state
			.lock()
			.messages
			.iter()
			.filter(|message| message.room_uuid == room_uuid)
			.cloned()
			.collect();
		Ok(messages.into_iter().map(|message| self.entry(message)).collect())
	}

	async fn insert_message(&self, new_message: NewChatMessage) -> Result<ChatMessage, GatewayError> {
		self.record(Call::InsertMessage(new_message.clone()));
		if let Some(rejection) = self.failures.lock().insert.clone() {
			return Err(GatewayError::Rejected(rejection));
		}

		let message = self.store_message(new_message.room_uuid, new_message.author_uuid, &new_message.body);
		self.subscribers.publish(&message);
		Ok(message)
	}
}

#[async_trait]
impl ProfileGateway for FakeGateway {
	async fn fetch_profile(&self, user_uuid: Uuid) -> Result<Option<Profile>, GatewayError> {
		self.record(Call::FetchProfile(user_uuid));
		self.profile_gate.pass().await;
		self.scripted_failure(|failures| failures.profile)?;

		Ok(self.state.lock().profiles.get(&user_uuid).cloned())
	}

	async fn upsert_profile(&self, profile: Profile) -> Result<Profile, GatewayError> {
		self.record(Call::UpsertProfile(profile.uuid));
		let mut state = self.state.lock();
		let username_taken = state
			.profiles
			.values()
			.any(|existing| existing.username == profile.username && existing.uuid != profile.uuid);
		if username_taken {
			return Err(GatewayError::Rejected(
				"duplicate key value violates unique constraint \"profiles_username_key\"".to_owned(),
			));
		}

		state.profiles.insert(profile.uuid, profile.clone());
		Ok(profile)
	}
}

#[async_trait]
impl RoomGateway for FakeGateway {
	async fn list_rooms(&self) -> Result<Vec<Room>, GatewayError> {
		Ok(self.state.lock().rooms.iter().rev().cloned().collect())
	}

	async fn create_room(&self, room: NewRoom) -> Result<Room, GatewayError> {
		let mut state = self.state.lock();
		if state.rooms.iter().any(|existing| existing.invite_code == room.invite_code) {
			return Err(GatewayError::Rejected("Invite code is taken".to_owned()));
		}

		let room = Room {
			uuid: Uuid::new_v4(),
			name: room.name,
			invite_code: room.invite_code,
			created_by: room.created_by,
			created_at: Utc::now(),
		};
		state.rooms.push(room.clone());
		Ok(room)
	}

	async fn find_room_by_invite_code(&self, invite_code: &str) -> Result<Option<Room>, GatewayError> {
		Ok(self
			.state
			.lock()
			.rooms
			.iter()
			.find(|room| room.invite_code == invite_code)
			.cloned())
	}
}

#[async_trait]
impl PostGateway for FakeGateway {
	async fn list_posts(&self) -> Result<Vec<FeedPost>, GatewayError> {
		let state = self.state.lock();
		Ok(state
			.posts
			.iter()
			.rev()
			.map(|post| FeedPost {
				post: post.clone(),
				author: state.profiles.get(&post.author_uuid).cloned(),
			})
			.collect())
	}

	async fn list_posts_by_author(&self, author_uuid: Uuid) -> Result<Vec<Post>, GatewayError> {
		Ok(self
			.state
			.lock()
			.posts
			.iter()
			.rev()
			.filter(|post| post.author_uuid == author_uuid)
			.cloned()
			.collect())
	}

	async fn insert_post(&self, post: NewPost) -> Result<Post, GatewayError> {
		self.record(Call::InsertPost(post.clone()));
		let mut state = self.state.lock();
		let post = Post {
			id: i64::try_from(state.posts.len()).unwrap_or(i64::MAX) + 1,
			author_uuid: post.author_uuid,
			caption: post.caption,
			image_url: post.image_url,
			created_at: Utc::now(),
		};
		state.posts.push(post.clone());
		Ok(post)
	}
}

#[async_trait]
impl ObjectStorage for FakeGateway {
	async fn upload(&self, bucket: &str, name: &str, content_type: &str, data: Vec<u8>) -> Result<(), GatewayError> {
		self.record(Call::Upload {
			bucket: bucket.to_owned(),
			name: name.to_owned(),
		});
		self.scripted_failure(|failures| failures.upload)?;

		self.state
			.lock()
			.objects
			.insert((bucket.to_owned(), name.to_owned()), (content_type.to_owned(), data));
		Ok(())
	}

	fn public_url(&self, bucket: &str, name: &str) -> String {
		format!("fake://{bucket}/{name}")
	}
}

#[async_trait]
impl RealtimeGateway for FakeGateway {
	async fn subscribe(&self, room_uuid: Uuid, buffer: usize) -> Result<Subscription, GatewayError> {
		self.record(Call::Subscribe(room_uuid));
		self.scripted_failure(|failures| failures.subscribe)?;
		Ok(self.subscribers.register(room_uuid, buffer))
	}

	async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<(), GatewayError> {
		self.record(Call::Unsubscribe(subscription_id));
		self.subscribers.remove(subscription_id);
		self.scripted_failure(|failures| failures.unsubscribe)
	}
}

pub struct FakeGatewayFactory;

impl TestFactory for FakeGatewayFactory {
	async fn gateway() -> Arc<dyn Gateway> {
		FakeGateway::new()
	}
}
