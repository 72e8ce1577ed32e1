use crate::gateway::error::GatewayError;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use static_assertions::assert_obj_safe;
use tokio::sync::broadcast;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthTokens {
	pub access_token: String,
	pub refresh_token: String,
}

/// The signed in account as known to the auth service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
	#[serde(rename = "id")]
	pub uuid: Uuid,
	#[serde(default)]
	pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStateChange {
	SignedIn(AuthUser),
	SignedOut,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
	/// Installs a session from tokens issued by the auth proxy and returns the user they belong to.
	async fn set_session(&self, tokens: AuthTokens) -> Result<AuthUser, GatewayError>;

	fn current_user(&self) -> Option<AuthUser>;

	async fn sign_out(&self) -> Result<(), GatewayError>;

	/// Every change of the session is announced here, in order.
	fn auth_events(&self) -> broadcast::Receiver<AuthStateChange>;
}

assert_obj_safe!(AuthGateway);

/// Session bookkeeping shared by the gateway implementations.
pub(crate) struct SessionSlot {
	session: parking_lot::RwLock<Option<(AuthTokens, AuthUser)>>,
	events: broadcast::Sender<AuthStateChange>,
}

impl Default for SessionSlot {
	fn default() -> Self {
		Self {
			session: Default::default(),
			events: broadcast::channel(16).0,
		}
	}
}

impl SessionSlot {
	pub fn install(&self, tokens: AuthTokens, user: AuthUser) {
		*self.session.write() = Some((tokens, user.clone()));
		// nobody listening is fine
		let _ = self.events.send(AuthStateChange::SignedIn(user));
	}

	pub fn clear(&self) -> Option<AuthTokens> {
		let previous = self.session.write().take();
		if previous.is_some() {
			let _ = self.events.send(AuthStateChange::SignedOut);
		}
		previous.map(|(tokens, _)| tokens)
	}

	pub fn user(&self) -> Option<AuthUser> {
		self.session.read().as_ref().map(|(_, user)| user.clone())
	}

	pub fn access_token(&self) -> Option<String> {
		self.session.read().as_ref().map(|(tokens, _)| tokens.access_token.clone())
	}

	pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
		self.events.subscribe()
	}
}
