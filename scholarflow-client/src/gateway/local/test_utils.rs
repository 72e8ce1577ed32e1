use super::LocalGateway;
use crate::forum::model::{NewRoom, Room};
use crate::gateway::Gateway;
use crate::gateway::test::TestFactory;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub async fn gateway() -> LocalGateway {
	LocalGateway::connect("sqlite::memory:")
		.await
		.expect("Failed to create in-memory gateway")
}

pub async fn profile(gateway: &LocalGateway, username: &str) -> Profile {
	gateway
		.profile()
		.upsert_profile(Profile {
			uuid: Uuid::new_v4(),
			username: username.to_owned(),
			full_name: None,
			bio: None,
			avatar_url: None,
		})
		.await
		.expect("Failed to create profile")
}

pub async fn room(gateway: &LocalGateway, name: &str, created_by: Uuid) -> Room {
	static INVITE_CODES: AtomicUsize = AtomicUsize::new(0);
	let invite_code = format!("TEST{:02}", INVITE_CODES.fetch_add(1, Ordering::SeqCst) % 100);

	gateway
		.room()
		.create_room(NewRoom {
			name: name.to_owned(),
			created_by,
			invite_code,
		})
		.await
		.expect("Failed to create room")
}

pub struct LocalGatewayFactory;

impl TestFactory for LocalGatewayFactory {
	async fn gateway() -> Arc<dyn Gateway> {
		Arc::new(gateway().await)
	}
}
