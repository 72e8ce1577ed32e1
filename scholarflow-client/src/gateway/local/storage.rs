use super::LocalGateway;
use crate::gateway::error::GatewayError;
use crate::gateway::storage::ObjectStorage;
use async_trait::async_trait;
use sqlx::{query, query_as};

#[async_trait]
impl ObjectStorage for LocalGateway {
	async fn upload(&self, bucket: &str, name: &str, content_type: &str, data: Vec<u8>) -> Result<(), GatewayError> {
		query(
			r"INSERT INTO object(bucket, name, content_type, data)
			VALUES (?1, ?2, ?3, ?4)",
		)
		.bind(bucket)
		.bind(name)
		.bind(content_type)
		.bind(data)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	fn public_url(&self, bucket: &str, name: &str) -> String {
		format!("local://{bucket}/{name}")
	}
}

impl LocalGateway {
	/// Content type and bytes of an uploaded object.
	pub async fn download(&self, bucket: &str, name: &str) -> Result<Option<(String, Vec<u8>)>, GatewayError> {
		query_as(
			r"SELECT content_type, data
			FROM object
			WHERE bucket = ?1 AND name = ?2",
		)
		.bind(bucket)
		.bind(name)
		.fetch_optional(&self.pool)
		.await
		.map_err(Into::into)
	}
}

#[cfg(test)]
mod test {
	use crate::gateway::Gateway;
	use crate::gateway::error::GatewayError;
	use crate::gateway::local::test_utils::gateway;
	use crate::gateway::storage::AVATAR_BUCKET;

	#[tokio::test]
	async fn should_store_uploaded_object() {
		let gateway = gateway().await;

		gateway
			.storage()
			.upload(AVATAR_BUCKET, "ferris.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47])
			.await
			.expect("Failed to upload");

		let object = gateway.download(AVATAR_BUCKET, "ferris.png").await.expect("Failed to download");
		assert_eq!(Some(("image/png".to_owned(), vec![0x89, 0x50, 0x4E, 0x47])), object);
		assert_eq!("local://avatars/ferris.png", gateway.storage().public_url(AVATAR_BUCKET, "ferris.png"));
	}

	#[tokio::test]
	async fn should_not_overwrite_existing_object() {
		let gateway = gateway().await;
		gateway
			.storage()
			.upload(AVATAR_BUCKET, "ferris.png", "image/png", vec![1])
			.await
			.expect("Failed to upload");

		let result = gateway
			.storage()
			.upload(AVATAR_BUCKET, "ferris.png", "image/png", vec![2])
			.await;

		assert!(matches!(result, Err(GatewayError::Rejected(_))), "{result:?}");
	}
}
