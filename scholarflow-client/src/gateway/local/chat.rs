use super::LocalGateway;
use crate::chat::gateway::ChatGateway;
use crate::chat::model::{ChatEntry, ChatMessage, NewChatMessage};
use crate::gateway::error::GatewayError;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query_as};

#[derive(FromRow)]
struct ChatEntryRow {
	uuid: Uuid,
	room_uuid: Uuid,
	author_uuid: Uuid,
	body: String,
	created_at: DateTime<Utc>,
	profile_uuid: Option<Uuid>,
	username: Option<String>,
	avatar_url: Option<String>,
}

impl From<ChatEntryRow> for ChatEntry {
	fn from(row: ChatEntryRow) -> Self {
		let author = match (row.profile_uuid, row.username) {
			(Some(uuid), Some(username)) => Some(Profile {
				uuid,
				username,
				full_name: None,
				bio: None,
				avatar_url: row.avatar_url,
			}),
			_ => None,
		};

		Self {
			message: ChatMessage {
				uuid: row.uuid,
				room_uuid: row.room_uuid,
				author_uuid: row.author_uuid,
				body: row.body,
				created_at: row.created_at,
			},
			author,
		}
	}
}

#[async_trait]
impl ChatGateway for LocalGateway {
	async fn fetch_messages(&self, room_uuid: Uuid) -> Result<Vec<ChatEntry>, GatewayError> {
		let rows: Vec<ChatEntryRow> = query_as(
			r"SELECT
				message.uuid,
				message.room_uuid,
				message.author_uuid,
				message.body,
				message.created_at,
				profile.uuid AS profile_uuid,
				profile.username,
				profile.avatar_url
			FROM chat_message AS message
			LEFT JOIN profile ON profile.uuid = message.author_uuid
			WHERE message.room_uuid = ?1
			ORDER BY message.created_at ASC, message.rowid ASC",
		)
		.bind(room_uuid)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(ChatEntry::from).collect())
	}

	async fn insert_message(&self, message: NewChatMessage) -> Result<ChatMessage, GatewayError> {
		let message: ChatMessage = query_as(
			r"INSERT INTO chat_message(uuid, room_uuid, author_uuid, body, created_at)
			VALUES (?1, ?2, ?3, ?4, ?5)
			RETURNING
				uuid,
				room_uuid,
				author_uuid,
				body,
				created_at",
		)
		.bind(Uuid::new_v4())
		.bind(message.room_uuid)
		.bind(message.author_uuid)
		.bind(message.body)
		.bind(self.timestamp())
		.fetch_one(&self.pool)
		.await?;

		self.subscribers.publish(&message);
		Ok(message)
	}
}
