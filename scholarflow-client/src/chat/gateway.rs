use crate::chat::model::{ChatEntry, ChatMessage, NewChatMessage};
use crate::gateway::error::GatewayError;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use static_assertions::assert_obj_safe;

#[async_trait]
pub trait ChatGateway: Send + Sync {
	/// All messages of a room with their authors joined in, oldest first.
	async fn fetch_messages(&self, room_uuid: Uuid) -> Result<Vec<ChatEntry>, GatewayError>;

	async fn insert_message(&self, message: NewChatMessage) -> Result<ChatMessage, GatewayError>;
}

assert_obj_safe!(ChatGateway);
