use crate::gateway::error::GatewayError;
use async_trait::async_trait;
use static_assertions::assert_obj_safe;

pub const AVATAR_BUCKET: &str = "avatars";
pub const POST_IMAGE_BUCKET: &str = "post-images";

#[async_trait]
pub trait ObjectStorage: Send + Sync {
	async fn upload(&self, bucket: &str, name: &str, content_type: &str, data: Vec<u8>) -> Result<(), GatewayError>;

	/// URL under which an uploaded object can be fetched without credentials.
	fn public_url(&self, bucket: &str, name: &str) -> String;
}

assert_obj_safe!(ObjectStorage);
