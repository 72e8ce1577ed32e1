//! Setting up the own profile.

use crate::gateway::Gateway;
use crate::gateway::error::GatewayError;
use crate::gateway::storage::AVATAR_BUCKET;
use crate::image::Image;
use crate::profile::model::Profile;
use crate::session::{SessionContext, SessionError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

pub mod gateway;
pub mod model;

/// Shown for users who didn't pick an avatar or whose upload failed.
pub const DEFAULT_AVATAR_URL: &str = "https://cdn-icons-png.flaticon.com/512/149/149071.png";

#[derive(Error, Debug)]
pub enum ProfileSetupError {
	#[error("Full name is mandatory")]
	MissingFullName,
	#[error("Username is mandatory")]
	MissingUsername,
	#[error(transparent)]
	Session(#[from] SessionError),
	#[error(transparent)]
	Gateway(#[from] GatewayError),
}

/// What the user entered on the profile setup screen.
#[derive(TypedBuilder, Clone, Debug)]
pub struct ProfileDraft {
	#[builder(setter(into))]
	pub full_name: String,
	#[builder(setter(into))]
	pub username: String,
	#[builder(default, setter(strip_option, into))]
	pub bio: Option<String>,
	#[builder(default, setter(strip_option))]
	pub avatar: Option<Image>,
}

pub struct ProfileSetup {
	gateway: Arc<dyn Gateway>,
	session: Arc<SessionContext>,
}

impl ProfileSetup {
	pub fn new(gateway: Arc<dyn Gateway>, session: Arc<SessionContext>) -> Self {
		Self { gateway, session }
	}

	/// Saves the signed in user's profile and lets the session pick it up.
	pub async fn save(&self, draft: ProfileDraft) -> Result<Profile, ProfileSetupError> {
		let full_name = draft.full_name.trim();
		if full_name.is_empty() {
			return Err(ProfileSetupError::MissingFullName);
		}
		let username = draft.username.trim().to_lowercase();
		if username.is_empty() {
			return Err(ProfileSetupError::MissingUsername);
		}
		let user = self.session.require_user()?;

		let avatar_url = match draft.avatar {
			Some(avatar) => {
				let object_name = avatar.object_name(user.uuid, Utc::now());
				let content_type = avatar.content_type.to_string();
				match self
					.gateway
					.storage()
					.upload(AVATAR_BUCKET, &object_name, &content_type, avatar.data)
					.await
				{
					Ok(()) => self.gateway.storage().public_url(AVATAR_BUCKET, &object_name),
					Err(error) => {
						warn!(user = %user.uuid, %error, "Failed to upload avatar, using the default one.");
						DEFAULT_AVATAR_URL.to_owned()
					}
				}
			}
			None => DEFAULT_AVATAR_URL.to_owned(),
		};

		let profile = self
			.gateway
			.profile()
			.upsert_profile(Profile {
				uuid: user.uuid,
				username,
				full_name: Some(full_name.to_owned()),
				bio: draft.bio.map(|bio| bio.trim().to_owned()).filter(|bio| !bio.is_empty()),
				avatar_url: Some(avatar_url),
			})
			.await?;
		info!(user = %user.uuid, username = profile.username, "Profile saved.");

		self.session.refresh_profile().await?;
		Ok(profile)
	}

	/// Profile of the signed in user, if they set one up.
	pub fn own_profile(&self) -> Option<Profile> {
		self.session.current().profile().cloned()
	}
}
