use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the `forum_messages` table.
#[derive(FromRow, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
	#[serde(rename = "id")]
	pub uuid: Uuid,
	#[serde(rename = "forum_id")]
	pub room_uuid: Uuid,
	#[serde(rename = "user_id")]
	pub author_uuid: Uuid,
	#[serde(rename = "content")]
	pub body: String,
	pub created_at: DateTime<Utc>,
}

/// A message with its author's profile joined in, as displayed in a chat room.
///
/// `author` is `None` when the profile doesn't exist (partially seeded data) or couldn't be loaded.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatEntry {
	#[serde(flatten)]
	pub message: ChatMessage,
	#[serde(rename = "profiles", default)]
	pub author: Option<Profile>,
}

impl ChatEntry {
	pub fn author_name(&self) -> &str {
		self.author.as_ref().map_or("unknown", |profile| profile.username.as_str())
	}
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewChatMessage {
	#[serde(rename = "forum_id")]
	pub room_uuid: Uuid,
	#[serde(rename = "user_id")]
	pub author_uuid: Uuid,
	#[serde(rename = "content")]
	pub body: String,
}
