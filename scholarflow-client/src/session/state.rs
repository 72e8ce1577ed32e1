use crate::gateway::auth::AuthUser;
use crate::profile::model::Profile;

/// Where the signed in user stands, which decides the screen they see.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
	/// The stored session hasn't been checked yet.
	#[default]
	Loading,
	SignedOut,
	/// Signed in, but without a profile (or it isn't known yet).
	NeedsProfile { user: AuthUser },
	Ready { user: AuthUser, profile: Profile },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	SignedIn(AuthUser),
	ProfileLoaded(Option<Profile>),
	SignedOut,
}

impl SessionState {
	pub fn user(&self) -> Option<&AuthUser> {
		match self {
			SessionState::NeedsProfile { user } | SessionState::Ready { user, .. } => Some(user),
			SessionState::Loading | SessionState::SignedOut => None,
		}
	}

	pub fn profile(&self) -> Option<&Profile> {
		match self {
			SessionState::Ready { profile, .. } => Some(profile),
			_ => None,
		}
	}
}

pub fn reduce(state: SessionState, event: SessionEvent) -> SessionState {
	match (state, event) {
		(_, SessionEvent::SignedOut) => SessionState::SignedOut,
		// announced again, the profile is still valid
		(state, SessionEvent::SignedIn(user)) if state.user().is_some_and(|current| current.uuid == user.uuid) => state,
		(_, SessionEvent::SignedIn(user)) => SessionState::NeedsProfile { user },
		(
			SessionState::NeedsProfile { user } | SessionState::Ready { user, .. },
			SessionEvent::ProfileLoaded(Some(profile)),
		) if profile.uuid == user.uuid => SessionState::Ready { user, profile },
		(SessionState::NeedsProfile { user } | SessionState::Ready { user, .. }, SessionEvent::ProfileLoaded(None)) => {
			SessionState::NeedsProfile { user }
		}
		(state, SessionEvent::ProfileLoaded(_)) => state,
	}
}
