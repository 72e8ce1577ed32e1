use crate::types::uuid::Uuid;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public profile of a user, one row of the `profiles` table.
#[derive(FromRow, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Profile {
	#[serde(rename = "id")]
	pub uuid: Uuid,
	pub username: String,
	#[serde(default)]
	pub full_name: Option<String>,
	#[serde(default)]
	pub bio: Option<String>,
	#[serde(default)]
	pub avatar_url: Option<String>,
}

impl Profile {
	/// Stand-in for users whose profile row is missing.
	pub fn placeholder(uuid: Uuid) -> Self {
		Self {
			uuid,
			username: "unknown".to_owned(),
			full_name: None,
			bio: None,
			avatar_url: None,
		}
	}
}
