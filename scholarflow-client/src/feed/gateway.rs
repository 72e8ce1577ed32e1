use crate::feed::model::{FeedPost, NewPost, Post};
use crate::gateway::error::GatewayError;
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use static_assertions::assert_obj_safe;

#[async_trait]
pub trait PostGateway: Send + Sync {
	/// All posts with their authors, newest first.
	async fn list_posts(&self) -> Result<Vec<FeedPost>, GatewayError>;

	/// Posts of one author, newest first.
	async fn list_posts_by_author(&self, author_uuid: Uuid) -> Result<Vec<Post>, GatewayError>;

	async fn insert_post(&self, post: NewPost) -> Result<Post, GatewayError>;
}

assert_obj_safe!(PostGateway);
