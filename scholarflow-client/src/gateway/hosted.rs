//! Client of the managed platform: PostgREST table API, object storage, auth and the realtime
//! websocket.

use crate::chat::gateway::ChatGateway;
use crate::chat::model::{ChatEntry, ChatMessage, NewChatMessage};
use crate::feed::gateway::PostGateway;
use crate::feed::model::{FeedPost, NewPost, Post};
use crate::forum::gateway::RoomGateway;
use crate::forum::model::{NewRoom, Room};
use crate::gateway::auth::{AuthGateway, AuthStateChange, AuthTokens, AuthUser, SessionSlot};
use crate::gateway::error::GatewayError;
use crate::gateway::hosted::realtime::RealtimeClient;
use crate::gateway::hosted::rest::{RestClient, first_row};
use crate::gateway::impl_gateway;
use crate::gateway::realtime::{RealtimeGateway, Subscription, SubscriptionId};
use crate::gateway::storage::ObjectStorage;
use crate::profile::gateway::ProfileGateway;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

mod realtime;
mod rest;

const MESSAGES_TABLE: &str = "forum_messages";
const PROFILES_TABLE: &str = "profiles";
const ROOMS_TABLE: &str = "forums";
const POSTS_TABLE: &str = "posts";

pub struct HostedGateway {
	rest: RestClient,
	session: Arc<SessionSlot>,
	realtime: RealtimeClient,
}

impl HostedGateway {
	pub fn new(
		url: &str,
		anon_key: &str,
		request_timeout: Duration,
		heartbeat_interval: Duration,
	) -> Result<Self, GatewayError> {
		let session = Arc::new(SessionSlot::default());
		let rest = RestClient::new(url, anon_key, request_timeout, Arc::clone(&session))?;
		let realtime = RealtimeClient::new(
			rest.realtime_endpoint()?,
			request_timeout,
			heartbeat_interval,
			Arc::clone(&session),
		);

		Ok(Self {
			rest,
			session,
			realtime,
		})
	}
}

impl_gateway!(HostedGateway);

#[async_trait]
impl AuthGateway for HostedGateway {
	async fn set_session(&self, tokens: AuthTokens) -> Result<AuthUser, GatewayError> {
		let user: AuthUser = self
			.rest
			.auth_request(Method::GET, "user", &tokens.access_token)
			.send_json()
			.await?;
		self.session.install(tokens, user.clone());
		debug!(user = %user.uuid, "Session installed.");
		Ok(user)
	}

	fn current_user(&self) -> Option<AuthUser> {
		self.session.user()
	}

	async fn sign_out(&self) -> Result<(), GatewayError> {
		let Some(tokens) = self.session.clear() else {
			return Ok(());
		};

		if let Err(error) = self
			.rest
			.auth_request(Method::POST, "logout", &tokens.access_token)
			.send_empty()
			.await
		{
			warn!(%error, "Failed to revoke session.");
		}
		Ok(())
	}

	fn auth_events(&self) -> broadcast::Receiver<AuthStateChange> {
		self.session.subscribe()
	}
}

#[async_trait]
impl ChatGateway for HostedGateway {
	async fn fetch_messages(&self, room_uuid: Uuid) -> Result<Vec<ChatEntry>, GatewayError> {
		self.rest
			.table(Method::GET, MESSAGES_TABLE)
			.query(&[
				("select", "*,profiles(id,username,avatar_url)".to_owned()),
				("forum_id", format!("eq.{room_uuid}")),
				("order", "created_at.asc".to_owned()),
			])
			.send_json()
			.await
	}

	async fn insert_message(&self, message: NewChatMessage) -> Result<ChatMessage, GatewayError> {
		let rows = self
			.rest
			.table(Method::POST, MESSAGES_TABLE)
			.returning_representation()
			.json(&message)
			.send_json()
			.await?;
		first_row(rows, MESSAGES_TABLE)
	}
}

#[async_trait]
impl ProfileGateway for HostedGateway {
	async fn fetch_profile(&self, user_uuid: Uuid) -> Result<Option<Profile>, GatewayError> {
		let profiles: Vec<Profile> = self
			.rest
			.table(Method::GET, PROFILES_TABLE)
			.query(&[("select", "*".to_owned()), ("id", format!("eq.{user_uuid}"))])
			.send_json()
			.await?;
		Ok(profiles.into_iter().next())
	}

	async fn upsert_profile(&self, profile: Profile) -> Result<Profile, GatewayError> {
		let rows = self
			.rest
			.table(Method::POST, PROFILES_TABLE)
			.merging_duplicates()
			.json(&profile)
			.send_json()
			.await?;
		first_row(rows, PROFILES_TABLE)
	}
}

#[async_trait]
impl RoomGateway for HostedGateway {
	async fn list_rooms(&self) -> Result<Vec<Room>, GatewayError> {
		self.rest
			.table(Method::GET, ROOMS_TABLE)
			.query(&[("select", "*"), ("order", "created_at.desc")])
			.send_json()
			.await
	}

	async fn create_room(&self, room: NewRoom) -> Result<Room, GatewayError> {
		let rows = self
			.rest
			.table(Method::POST, ROOMS_TABLE)
			.returning_representation()
			.json(&room)
			.send_json()
			.await?;
		first_row(rows, ROOMS_TABLE)
	}

	async fn find_room_by_invite_code(&self, invite_code: &str) -> Result<Option<Room>, GatewayError> {
		let rooms: Vec<Room> = self
			.rest
			.table(Method::GET, ROOMS_TABLE)
			.query(&[("select", "*".to_owned()), ("invite_code", format!("eq.{invite_code}"))])
			.send_json()
			.await?;
		Ok(rooms.into_iter().next())
	}
}

#[async_trait]
impl PostGateway for HostedGateway {
	async fn list_posts(&self) -> Result<Vec<FeedPost>, GatewayError> {
		self.rest
			.table(Method::GET, POSTS_TABLE)
			.query(&[("select", "*,profiles(*)"), ("order", "created_at.desc")])
			.send_json()
			.await
	}

	async fn list_posts_by_author(&self, author_uuid: Uuid) -> Result<Vec<Post>, GatewayError> {
		self.rest
			.table(Method::GET, POSTS_TABLE)
			.query(&[
				("select", "*".to_owned()),
				("user_id", format!("eq.{author_uuid}")),
				("order", "created_at.desc".to_owned()),
			])
			.send_json()
			.await
	}

	async fn insert_post(&self, post: NewPost) -> Result<Post, GatewayError> {
		let rows = self
			.rest
			.table(Method::POST, POSTS_TABLE)
			.returning_representation()
			.json(&post)
			.send_json()
			.await?;
		first_row(rows, POSTS_TABLE)
	}
}

#[async_trait]
impl ObjectStorage for HostedGateway {
	async fn upload(&self, bucket: &str, name: &str, content_type: &str, data: Vec<u8>) -> Result<(), GatewayError> {
		self.rest
			.storage(Method::POST, bucket, name)
			.content_type(content_type)
			.body(data)
			.send_empty()
			.await
			.map_err(|error| match error {
				GatewayError::Unavailable(error) => GatewayError::Storage(error),
				other => other,
			})
	}

	fn public_url(&self, bucket: &str, name: &str) -> String {
		self.rest.public_object_url(bucket, name)
	}
}

#[async_trait]
impl RealtimeGateway for HostedGateway {
	async fn subscribe(&self, room_uuid: Uuid, buffer: usize) -> Result<Subscription, GatewayError> {
		self.realtime.subscribe(room_uuid, buffer).await
	}

	async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<(), GatewayError> {
		self.realtime.unsubscribe(subscription_id).await
	}
}
