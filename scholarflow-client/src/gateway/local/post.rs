use super::LocalGateway;
use crate::feed::gateway::PostGateway;
use crate::feed::model::{FeedPost, NewPost, Post};
use crate::gateway::error::GatewayError;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query_as};

#[derive(FromRow)]
struct FeedPostRow {
	id: i64,
	author_uuid: Uuid,
	caption: String,
	image_url: String,
	created_at: DateTime<Utc>,
	profile_uuid: Option<Uuid>,
	username: Option<String>,
	full_name: Option<String>,
	avatar_url: Option<String>,
}

impl From<FeedPostRow> for FeedPost {
	fn from(row: FeedPostRow) -> Self {
		let author = match (row.profile_uuid, row.username) {
			(Some(uuid), Some(username)) => Some(Profile {
				uuid,
				username,
				full_name: row.full_name,
				bio: None,
				avatar_url: row.avatar_url,
			}),
			_ => None,
		};

		Self {
			post: Post {
				id: row.id,
				author_uuid: row.author_uuid,
				caption: row.caption,
				image_url: row.image_url,
				created_at: row.created_at,
			},
			author,
		}
	}
}

#[async_trait]
impl PostGateway for LocalGateway {
	async fn list_posts(&self) -> Result<Vec<FeedPost>, GatewayError> {
		let rows: Vec<FeedPostRow> = query_as(
			r"SELECT
				post.id,
				post.author_uuid,
				post.caption,
				post.image_url,
				post.created_at,
				profile.uuid AS profile_uuid,
				profile.username,
				profile.full_name,
				profile.avatar_url
			FROM post
			LEFT JOIN profile ON profile.uuid = post.author_uuid
			ORDER BY post.created_at DESC, post.id DESC",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(FeedPost::from).collect())
	}

	async fn list_posts_by_author(&self, author_uuid: Uuid) -> Result<Vec<Post>, GatewayError> {
		query_as(
			r"SELECT id, author_uuid, caption, image_url, created_at
			FROM post
			WHERE author_uuid = ?1
			ORDER BY created_at DESC, id DESC",
		)
		.bind(author_uuid)
		.fetch_all(&self.pool)
		.await
		.map_err(Into::into)
	}

	async fn insert_post(&self, post: NewPost) -> Result<Post, GatewayError> {
		query_as(
			r"INSERT INTO post(author_uuid, caption, image_url, created_at)
			VALUES (?1, ?2, ?3, ?4)
			RETURNING id, author_uuid, caption, image_url, created_at",
		)
		.bind(post.author_uuid)
		.bind(post.caption)
		.bind(post.image_url)
		.bind(self.timestamp())
		.fetch_one(&self.pool)
		.await
		.map_err(Into::into)
	}
}
