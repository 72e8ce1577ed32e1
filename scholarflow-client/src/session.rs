//! The signed in user and their profile, shared explicitly with every screen that needs them.
//!
//! All changes go through [`reduce`]. Besides the operations here, a listener task follows the
//! gateway's auth events, so sessions ending elsewhere (expiry, another screen) are noticed too.

use crate::gateway::Gateway;
use crate::gateway::auth::{AuthStateChange, AuthTokens, AuthUser};
use crate::gateway::error::GatewayError;
use crate::profile::model::Profile;
use crate::proxy::ProxyError;
use crate::session::state::{SessionEvent, SessionState, reduce};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

pub mod state;

#[derive(Error, Debug)]
pub enum SessionError {
	#[error("Not signed in")]
	SignedOut,
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	#[error(transparent)]
	Proxy(#[from] ProxyError),
}

pub struct SessionContext {
	gateway: Arc<dyn Gateway>,
	state: Arc<watch::Sender<SessionState>>,
	listener: JoinHandle<()>,
}

impl SessionContext {
	/// Starts following the gateway's session. Has to be called within a tokio runtime.
	pub fn start(gateway: Arc<dyn Gateway>) -> Self {
		let events = gateway.auth().auth_events();
		let state = Arc::new(watch::channel(SessionState::Loading).0);
		let listener = tokio::spawn(listen(Arc::clone(&gateway), Arc::clone(&state), events));

		Self {
			gateway,
			state,
			listener,
		}
	}

	/// Installs the session issued for `tokens` and loads the user's profile.
	pub async fn sign_in(&self, tokens: AuthTokens) -> Result<SessionState, SessionError> {
		let user = self.gateway.auth().set_session(tokens).await?;
		info!(user = %user.uuid, "Signed in.");
		dispatch(&self.state, SessionEvent::SignedIn(user.clone()));
		load_profile(&*self.gateway, &self.state, &user).await?;
		Ok(self.current())
	}

	pub async fn sign_out(&self) -> Result<(), SessionError> {
		self.gateway.auth().sign_out().await?;
		dispatch(&self.state, SessionEvent::SignedOut);
		info!("Signed out.");
		Ok(())
	}

	/// Reloads the profile of the signed in user, e.g. after it was set up.
	pub async fn refresh_profile(&self) -> Result<Option<Profile>, SessionError> {
		let user = self.require_user()?;
		Ok(load_profile(&*self.gateway, &self.state, &user).await?)
	}

	pub fn current(&self) -> SessionState {
		self.state.borrow().clone()
	}

	pub fn require_user(&self) -> Result<AuthUser, SessionError> {
		self.state.borrow().user().cloned().ok_or(SessionError::SignedOut)
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state.subscribe()
	}
}

impl Drop for SessionContext {
	fn drop(&mut self) {
		self.listener.abort();
	}
}

fn dispatch(state: &watch::Sender<SessionState>, event: SessionEvent) {
	state.send_if_modified(|current| {
		let next = reduce(current.clone(), event);
		if next == *current {
			return false;
		}

		debug!(from = ?current, to = ?next, "Session changed.");
		*current = next;
		true
	});
}

async fn load_profile(
	gateway: &dyn Gateway,
	state: &watch::Sender<SessionState>,
	user: &AuthUser,
) -> Result<Option<Profile>, GatewayError> {
	let profile = gateway.profile().fetch_profile(user.uuid).await?;
	if profile.is_none() {
		debug!(user = %user.uuid, "User has no profile yet.");
	}
	dispatch(state, SessionEvent::ProfileLoaded(profile.clone()));
	Ok(profile)
}

async fn listen(
	gateway: Arc<dyn Gateway>,
	state: Arc<watch::Sender<SessionState>>,
	events: broadcast::Receiver<AuthStateChange>,
) {
	// subscribed before looking at the current user, so no change falls in between
	let mut events = BroadcastStream::new(events);
	follow(&*gateway, &state).await;

	// events only announce that something changed, the gateway's current user is what counts
	while let Some(event) = events.next().await {
		if let Err(BroadcastStreamRecvError::Lagged(skipped)) = event {
			warn!(skipped, "Missed auth events, resynchronizing.");
		}
		follow(&*gateway, &state).await;
	}

	debug!("Auth events ended.");
}

async fn follow(gateway: &dyn Gateway, state: &watch::Sender<SessionState>) {
	let Some(user) = gateway.auth().current_user() else {
		dispatch(state, SessionEvent::SignedOut);
		return;
	};

	let known = state.borrow().user().is_some_and(|current| current.uuid == user.uuid);
	if known {
		return;
	}

	dispatch(state, SessionEvent::SignedIn(user.clone()));
	if let Err(error) = load_profile(gateway, state, &user).await {
		warn!(user = %user.uuid, %error, "Failed to load profile.");
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::types::uuid::Uuid;
	use crate::utils::fake_gateway::FakeGateway;
	use std::time::Duration;

	fn tokens() -> AuthTokens {
		AuthTokens {
			access_token: "access".to_owned(),
			refresh_token: "refresh".to_owned(),
		}
	}

	fn registered_user(fake: &FakeGateway) -> AuthUser {
		let user = AuthUser {
			uuid: Uuid::new_v4(),
			email: Some("ferris@example.org".to_owned()),
		};
		fake.add_session(&tokens(), user.clone());
		user
	}

	async fn wait_for(context: &SessionContext, condition: impl Fn(&SessionState) -> bool) {
		let mut states = context.subscribe();
		tokio::time::timeout(Duration::from_secs(5), states.wait_for(|state| condition(state)))
			.await
			.expect("Timed out waiting for session state")
			.map(|_| ())
			.expect("Session context went away");
	}

	#[tokio::test]
	async fn should_start_signed_out_without_session() {
		let context = SessionContext::start(FakeGateway::new());

		wait_for(&context, |state| *state == SessionState::SignedOut).await;
	}

	#[tokio::test]
	async fn should_need_profile_after_first_sign_in() {
		let fake = FakeGateway::new();
		let user = registered_user(&fake);
		let context = SessionContext::start(fake.clone());

		let state = context.sign_in(tokens()).await.expect("Failed to sign in");

		assert_eq!(SessionState::NeedsProfile { user }, state);
	}

	#[tokio::test]
	async fn should_be_ready_when_profile_exists() {
		let fake = FakeGateway::new();
		let profile = fake.add_profile("ferris");
		let user = AuthUser {
			uuid: profile.uuid,
			email: None,
		};
		fake.add_session(&tokens(), user.clone());
		let context = SessionContext::start(fake.clone());

		let state = context.sign_in(tokens()).await.expect("Failed to sign in");

		assert_eq!(SessionState::Ready { user, profile }, state);
	}

	#[tokio::test]
	async fn should_become_ready_after_refreshing_new_profile() {
		let fake = FakeGateway::new();
		let user = registered_user(&fake);
		let context = SessionContext::start(fake.clone());
		context.sign_in(tokens()).await.expect("Failed to sign in");
		let profile = Profile {
			uuid: user.uuid,
			username: "ferris".to_owned(),
			full_name: Some("Ferris Crab".to_owned()),
			bio: None,
			avatar_url: None,
		};
		fake.profile()
			.upsert_profile(profile.clone())
			.await
			.expect("Failed to create profile");

		let refreshed = context.refresh_profile().await.expect("Failed to refresh profile");

		assert_eq!(Some(profile.clone()), refreshed);
		assert_eq!(SessionState::Ready { user, profile }, context.current());
	}

	#[tokio::test]
	async fn should_reject_unknown_tokens() {
		let context = SessionContext::start(FakeGateway::new());

		let result = context.sign_in(tokens()).await;

		assert!(matches!(result, Err(SessionError::Gateway(GatewayError::Unauthorized(_)))));
		assert!(matches!(context.require_user(), Err(SessionError::SignedOut)));
	}

	#[tokio::test]
	async fn should_sign_out() {
		let fake = FakeGateway::new();
		registered_user(&fake);
		let context = SessionContext::start(fake.clone());
		context.sign_in(tokens()).await.expect("Failed to sign in");

		context.sign_out().await.expect("Failed to sign out");

		assert_eq!(SessionState::SignedOut, context.current());
		assert!(fake.auth().current_user().is_none());
	}

	#[tokio::test]
	async fn should_follow_sign_out_elsewhere() {
		let fake = FakeGateway::new();
		registered_user(&fake);
		let context = SessionContext::start(fake.clone());
		context.sign_in(tokens()).await.expect("Failed to sign in");

		fake.auth().sign_out().await.expect("Failed to sign out");

		wait_for(&context, |state| *state == SessionState::SignedOut).await;
	}

	#[tokio::test]
	async fn should_pick_up_existing_session_on_start() {
		let fake = FakeGateway::new();
		let user = registered_user(&fake);
		fake.auth().set_session(tokens()).await.expect("Failed to set session");

		let context = SessionContext::start(fake.clone());

		wait_for(&context, |state| state.user() == Some(&user)).await;
	}
}
