//! Room list, room creation and joining by invite code.

use crate::forum::invite_code::generate_invite_code;
use crate::forum::model::{NewRoom, Room};
use crate::gateway::Gateway;
use crate::gateway::error::GatewayError;
use crate::types::uuid::Uuid;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod gateway;
pub mod invite_code;
pub mod model;

#[derive(Error, Debug)]
pub enum ForumError {
	#[error("Room name must not be empty")]
	EmptyName,
	#[error("Invalid invite code: {0}")]
	InvalidInviteCode(String),
	#[error(transparent)]
	Gateway(#[from] GatewayError),
}

pub struct Forums {
	gateway: Arc<dyn Gateway>,
}

impl Forums {
	pub fn new(gateway: Arc<dyn Gateway>) -> Self {
		Self { gateway }
	}

	/// All rooms, newest first.
	pub async fn list(&self) -> Result<Vec<Room>, ForumError> {
		Ok(self.gateway.room().list_rooms().await?)
	}

	/// Creates a room owned by `created_by` with a fresh invite code.
	pub async fn create(&self, name: &str, created_by: Uuid) -> Result<Room, ForumError> {
		let name = name.trim();
		if name.is_empty() {
			return Err(ForumError::EmptyName);
		}

		let room = self
			.gateway
			.room()
			.create_room(NewRoom {
				name: name.to_owned(),
				created_by,
				invite_code: generate_invite_code(),
			})
			.await?;
		info!(room = %room.uuid, invite_code = room.invite_code, "Room created.");

		Ok(room)
	}

	/// Finds the room an invite code belongs to. Codes are matched case insensitively.
	pub async fn join_by_code(&self, invite_code: &str) -> Result<Room, ForumError> {
		let invite_code = invite_code.trim().to_uppercase();
		if invite_code.is_empty() {
			return Err(ForumError::InvalidInviteCode(invite_code));
		}

		self.gateway
			.room()
			.find_room_by_invite_code(&invite_code)
			.await?
			.ok_or(ForumError::InvalidInviteCode(invite_code))
	}
}
