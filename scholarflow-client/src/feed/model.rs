use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(FromRow, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Post {
	pub id: i64,
	#[serde(rename = "user_id")]
	pub author_uuid: Uuid,
	pub caption: String,
	pub image_url: String,
	pub created_at: DateTime<Utc>,
}

/// A post on the home feed together with its author.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FeedPost {
	#[serde(flatten)]
	pub post: Post,
	#[serde(rename = "profiles", default)]
	pub author: Option<Profile>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewPost {
	#[serde(rename = "user_id")]
	pub author_uuid: Uuid,
	pub caption: String,
	pub image_url: String,
}
