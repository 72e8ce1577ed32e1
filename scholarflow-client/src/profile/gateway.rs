use crate::gateway::error::GatewayError;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use static_assertions::assert_obj_safe;

#[async_trait]
pub trait ProfileGateway: Send + Sync {
	async fn fetch_profile(&self, user_uuid: Uuid) -> Result<Option<Profile>, GatewayError>;

	/// Creates the profile or replaces the existing one with the same uuid.
	async fn upsert_profile(&self, profile: Profile) -> Result<Profile, GatewayError>;
}

assert_obj_safe!(ProfileGateway);
