use crate::types::uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chat room, called a forum in the `forums` table.
#[derive(FromRow, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Room {
	#[serde(rename = "id")]
	pub uuid: Uuid,
	pub name: String,
	pub invite_code: String,
	pub created_by: Uuid,
	pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewRoom {
	pub name: String,
	pub created_by: Uuid,
	pub invite_code: String,
}
