use super::LocalGateway;
use crate::gateway::error::GatewayError;
use crate::profile::gateway::ProfileGateway;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use sqlx::query_as;

#[async_trait]
impl ProfileGateway for LocalGateway {
	async fn fetch_profile(&self, user_uuid: Uuid) -> Result<Option<Profile>, GatewayError> {
		query_as(
			r"SELECT uuid, username, full_name, bio, avatar_url
			FROM profile
			WHERE uuid = ?1",
		)
		.bind(user_uuid)
		.fetch_optional(&self.pool)
		.await
		.map_err(Into::into)
	}

	async fn upsert_profile(&self, profile: Profile) -> Result<Profile, GatewayError> {
		query_as(
			r"INSERT INTO profile(uuid, username, full_name, bio, avatar_url)
			VALUES (?1, ?2, ?3, ?4, ?5)
			ON CONFLICT(uuid) DO UPDATE SET
				username = excluded.username,
				full_name = excluded.full_name,
				bio = excluded.bio,
				avatar_url = excluded.avatar_url
			RETURNING uuid, username, full_name, bio, avatar_url",
		)
		.bind(profile.uuid)
		.bind(profile.username)
		.bind(profile.full_name)
		.bind(profile.bio)
		.bind(profile.avatar_url)
		.fetch_one(&self.pool)
		.await
		.map_err(Into::into)
	}
}
