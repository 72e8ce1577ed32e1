use super::LocalGateway;
use crate::forum::gateway::RoomGateway;
use crate::forum::model::{NewRoom, Room};
use crate::gateway::error::GatewayError;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use sqlx::query_as;

#[async_trait]
impl RoomGateway for LocalGateway {
	async fn list_rooms(&self) -> Result<Vec<Room>, GatewayError> {
		query_as(
			r"SELECT uuid, name, invite_code, created_by, created_at
			FROM room
			ORDER BY created_at DESC, rowid DESC",
		)
		.fetch_all(&self.pool)
		.await
		.map_err(Into::into)
	}

	async fn create_room(&self, room: NewRoom) -> Result<Room, GatewayError> {
		query_as(
			r"INSERT INTO room(uuid, name, invite_code, created_by, created_at)
			VALUES (?1, ?2, ?3, ?4, ?5)
			RETURNING uuid, name, invite_code, created_by, created_at",
		)
		.bind(Uuid::new_v4())
		.bind(room.name)
		.bind(room.invite_code)
		.bind(room.created_by)
		.bind(self.timestamp())
		.fetch_one(&self.pool)
		.await
		.map_err(Into::into)
	}

	async fn find_room_by_invite_code(&self, invite_code: &str) -> Result<Option<Room>, GatewayError> {
		query_as(
			r"SELECT uuid, name, invite_code, created_by, created_at
			FROM room
			WHERE invite_code = ?1",
		)
		.bind(invite_code)
		.fetch_optional(&self.pool)
		.await
		.map_err(Into::into)
	}
}

#[cfg(test)]
mod test {
	use crate::forum::model::NewRoom;
	use crate::gateway::Gateway;
	use crate::gateway::error::GatewayError;
	use crate::gateway::local::test_utils::{gateway, room};
	use crate::types::uuid::Uuid;

	#[tokio::test]
	async fn should_list_newest_room_first() {
		let gateway = gateway().await;
		let creator = Uuid::new_v4();
		room(&gateway, "Older", creator).await;
		room(&gateway, "Newer", creator).await;

		let rooms = gateway.room().list_rooms().await.expect("Failed to list rooms");

		let names: Vec<_> = rooms.iter().map(|room| room.name.as_str()).collect();
		assert_eq!(vec!["Newer", "Older"], names);
	}

	#[tokio::test]
	async fn should_find_room_by_invite_code() {
		let gateway = gateway().await;
		let physics = room(&gateway, "Physics", Uuid::new_v4()).await;

		let found = gateway
			.room()
			.find_room_by_invite_code(&physics.invite_code)
			.await
			.expect("Failed to look up room");
		let missing = gateway
			.room()
			.find_room_by_invite_code("NOPE00")
			.await
			.expect("Failed to look up room");

		assert_eq!(Some(physics), found);
		assert_eq!(None, missing);
	}

	#[tokio::test]
	async fn should_reject_duplicate_invite_code() {
		let gateway = gateway().await;
		let physics = room(&gateway, "Physics", Uuid::new_v4()).await;

		let result = gateway
			.room()
			.create_room(NewRoom {
				name: "Chemistry".to_owned(),
				created_by: Uuid::new_v4(),
				invite_code: physics.invite_code,
			})
			.await;

		assert!(matches!(result, Err(GatewayError::Rejected(_))), "{result:?}");
	}
}
