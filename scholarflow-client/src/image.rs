use crate::types::uuid::Uuid;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use mime::Mime;
use std::path::Path;

const DEFAULT_EXTENSION: &str = "png";

/// An image picked for upload or for the AI tutor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
	pub content_type: Mime,
	pub extension: String,
	pub data: Vec<u8>,
}

impl Image {
	pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = path.as_ref();
		let data = tokio::fs::read(path).await?;
		let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
		Ok(Self::from_bytes(file_name, data))
	}

	/// Content type and extension are derived from the file name, PNG when it has none.
	pub fn from_bytes(file_name: &str, data: Vec<u8>) -> Self {
		let extension = Path::new(file_name)
			.extension()
			.and_then(|extension| extension.to_str())
			.map_or_else(|| DEFAULT_EXTENSION.to_owned(), str::to_lowercase);
		let content_type = mime_guess::from_ext(&extension).first_or(mime::IMAGE_PNG);

		Self {
			content_type,
			extension,
			data,
		}
	}

	/// Object name `{owner}_{milliseconds}.{extension}` under which the image is stored.
	pub fn object_name(&self, owner: Uuid, at: DateTime<Utc>) -> String {
		format!("{owner}_{}.{}", at.timestamp_millis(), self.extension)
	}

	pub fn to_base64(&self) -> String {
		STANDARD.encode(&self.data)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn should_guess_content_type_from_extension() {
		let image = Image::from_bytes("Holiday.JPG", vec![1, 2, 3]);

		assert_eq!(mime::IMAGE_JPEG, image.content_type);
		assert_eq!("jpg", image.extension);
	}

	#[test]
	fn should_default_to_png() {
		let image = Image::from_bytes("camera-roll-item", Vec::new());

		assert_eq!(mime::IMAGE_PNG, image.content_type);
		assert_eq!("png", image.extension);
	}

	#[test]
	fn should_name_object_after_owner_and_time() {
		let owner: Uuid = "9f1c4a52-7c1b-4c1e-8a3d-2d4b1c1f9e01".parse().expect("Invalid uuid");
		let at = Utc.timestamp_millis_opt(1_709_287_200_123).single().expect("Invalid timestamp");
		let image = Image::from_bytes("photo.png", Vec::new());

		assert_eq!(
			"9f1c4a52-7c1b-4c1e-8a3d-2d4b1c1f9e01_1709287200123.png",
			image.object_name(owner, at)
		);
	}

	#[test]
	fn should_encode_base64() {
		let image = Image::from_bytes("photo.png", b"ferris".to_vec());

		assert_eq!("ZmVycmlz", image.to_base64());
	}

	#[tokio::test]
	async fn should_read_image_from_file() {
		let path = std::env::temp_dir().join(format!("{}.gif", Uuid::new_v4()));
		tokio::fs::write(&path, b"GIF89a").await.expect("Failed to write image");

		let image = Image::read(&path).await.expect("Failed to read image");
		let _ = tokio::fs::remove_file(&path).await;

		assert_eq!(mime::IMAGE_GIF, image.content_type);
		assert_eq!(b"GIF89a".to_vec(), image.data);
	}
}
