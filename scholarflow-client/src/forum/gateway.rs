use crate::forum::model::{NewRoom, Room};
use crate::gateway::error::GatewayError;
use async_trait::async_trait;
use static_assertions::assert_obj_safe;

#[async_trait]
pub trait RoomGateway: Send + Sync {
	/// All rooms, newest first.
	async fn list_rooms(&self) -> Result<Vec<Room>, GatewayError>;

	async fn create_room(&self, room: NewRoom) -> Result<Room, GatewayError>;

	async fn find_room_by_invite_code(&self, invite_code: &str) -> Result<Option<Room>, GatewayError>;
}

assert_obj_safe!(RoomGateway);
