//! Home feed, publishing posts and user pages.

use crate::feed::model::{FeedPost, NewPost, Post};
use crate::gateway::Gateway;
use crate::gateway::error::GatewayError;
use crate::gateway::storage::POST_IMAGE_BUCKET;
use crate::image::Image;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod gateway;
pub mod model;

#[derive(Error, Debug)]
pub enum FeedError {
	#[error("A post needs an image")]
	MissingImage,
	#[error("A post needs a caption")]
	MissingCaption,
	#[error(transparent)]
	Gateway(#[from] GatewayError),
}

/// Someone's profile page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPage {
	pub profile: Profile,
	pub posts: Vec<Post>,
}

pub struct Feed {
	gateway: Arc<dyn Gateway>,
}

impl Feed {
	pub fn new(gateway: Arc<dyn Gateway>) -> Self {
		Self { gateway }
	}

	/// Every post, newest first, with its author.
	pub async fn home(&self) -> Result<Vec<FeedPost>, FeedError> {
		Ok(self.gateway.post().list_posts().await?)
	}

	/// Uploads the image and publishes it with its caption.
	pub async fn publish(&self, author_uuid: Uuid, image: Option<Image>, caption: &str) -> Result<Post, FeedError> {
		let image = image.ok_or(FeedError::MissingImage)?;
		let caption = caption.trim();
		if caption.is_empty() {
			return Err(FeedError::MissingCaption);
		}

		let object_name = image.object_name(author_uuid, Utc::now());
		let content_type = image.content_type.to_string();
		self.gateway
			.storage()
			.upload(POST_IMAGE_BUCKET, &object_name, &content_type, image.data)
			.await?;
		let image_url = self.gateway.storage().public_url(POST_IMAGE_BUCKET, &object_name);

		let post = self
			.gateway
			.post()
			.insert_post(NewPost {
				author_uuid,
				caption: caption.to_owned(),
				image_url,
			})
			.await?;
		info!(post = post.id, author = %author_uuid, "Post published.");

		Ok(post)
	}

	/// The user's profile (a placeholder if they have none) and their posts, newest first.
	pub async fn user_page(&self, user_uuid: Uuid) -> Result<UserPage, FeedError> {
		let profile = self
			.gateway
			.profile()
			.fetch_profile(user_uuid)
			.await?
			.unwrap_or_else(|| Profile::placeholder(user_uuid));
		let posts = self.gateway.post().list_posts_by_author(user_uuid).await?;

		Ok(UserPage { profile, posts })
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::utils::fake_gateway::{Call, FakeGateway};

	fn image() -> Image {
		Image::from_bytes("notes.jpg", vec![0xFF, 0xD8, 0xFF])
	}

	#[tokio::test]
	async fn should_upload_image_and_insert_post() {
		let fake = FakeGateway::new();
		let feed = Feed::new(fake.clone());
		let author = Uuid::new_v4();

		let post = feed
			.publish(author, Some(image()), " My notes ")
			.await
			.expect("Failed to publish");

		let calls = fake.calls();
		let Some(Call::Upload { bucket, name }) = calls.first() else {
			panic!("Image wasn't uploaded first: {calls:?}");
		};
		assert_eq!(POST_IMAGE_BUCKET, bucket.as_str());
		assert!(name.starts_with(&format!("{author}_")), "{name}");
		assert!(name.ends_with(".jpg"), "{name}");
		assert_eq!(
			Some(("image/jpeg".to_owned(), vec![0xFF, 0xD8, 0xFF])),
			fake.object(POST_IMAGE_BUCKET, name)
		);
		assert_eq!(format!("fake://{POST_IMAGE_BUCKET}/{name}"), post.image_url);
		assert_eq!("My notes", post.caption);
	}

	#[tokio::test]
	async fn should_require_image_and_caption() {
		let fake = FakeGateway::new();
		let feed = Feed::new(fake.clone());

		let without_image = feed.publish(Uuid::new_v4(), None, "caption").await;
		let without_caption = feed.publish(Uuid::new_v4(), Some(image()), "  ").await;

		assert!(matches!(without_image, Err(FeedError::MissingImage)));
		assert!(matches!(without_caption, Err(FeedError::MissingCaption)));
		assert!(fake.calls().is_empty());
	}

	#[tokio::test]
	async fn should_not_insert_post_when_upload_fails() {
		let fake = FakeGateway::new();
		fake.fail(|failures| failures.upload = true);
		let feed = Feed::new(fake.clone());

		let result = feed.publish(Uuid::new_v4(), Some(image()), "caption").await;

		assert!(matches!(result, Err(FeedError::Gateway(_))));
		assert_eq!(0, fake.count_calls(|call| matches!(call, Call::InsertPost(_))));
	}

	#[tokio::test]
	async fn should_show_newest_post_first() {
		let fake = FakeGateway::new();
		let feed = Feed::new(fake.clone());
		let alice = fake.add_profile("alice");
		feed.publish(alice.uuid, Some(image()), "old").await.expect("Failed to publish");
		feed.publish(alice.uuid, Some(image()), "new").await.expect("Failed to publish");

		let posts = feed.home().await.expect("Failed to load feed");

		let captions: Vec<_> = posts.iter().map(|post| post.post.caption.as_str()).collect();
		assert_eq!(vec!["new", "old"], captions);
		assert_eq!(Some(alice), posts[0].author.clone());
	}

	#[tokio::test]
	async fn should_show_placeholder_page_for_user_without_profile() {
		let fake = FakeGateway::new();
		let feed = Feed::new(fake.clone());
		let stranger = Uuid::new_v4();
		feed.publish(stranger, Some(image()), "hello").await.expect("Failed to publish");
		feed.publish(Uuid::new_v4(), Some(image()), "someone else").await.expect("Failed to publish");

		let page = feed.user_page(stranger).await.expect("Failed to load page");

		assert_eq!(Profile::placeholder(stranger), page.profile);
		assert_eq!(1, page.posts.len());
		assert_eq!("hello", page.posts[0].caption);
	}
}
