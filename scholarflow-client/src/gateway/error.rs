use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use sqlx::error::ErrorKind;
use sqlx::migrate::MigrateError;

/// Type erased error that works for every gateway implementation
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	#[error("Remote unavailable: {0}")]
	Unavailable(anyhow::Error),
	#[error("{0}")]
	Rejected(String),
	#[error("Not authorized: {0}")]
	Unauthorized(String),
	#[error("Entity not found")]
	NotFound(anyhow::Error),
	#[error("Decoding values: {0}")]
	Decode(anyhow::Error),
	#[error("Storage error: {0}")]
	Storage(anyhow::Error),
	#[error("Database error: {0}")]
	Database(anyhow::Error),
	#[error("Migration error: {0}")]
	Migration(anyhow::Error),
}

impl GatewayError {
	/// Whether retrying after the user reopens the screen can help.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Unavailable(_))
	}
}

impl From<sqlx::Error> for GatewayError {
	fn from(error: sqlx::Error) -> Self {
		use sqlx::Error::*;
		match error {
			Database(error) => error.into(),
			RowNotFound => Self::NotFound(error.into()),
			Decode(_) | ColumnDecode { .. } => Self::Decode(error.into()),
			PoolTimedOut | PoolClosed | Io(_) => Self::Unavailable(error.into()),
			Migrate(error) => Self::Migration((*error).into()),
			other => Self::Database(other.into()),
		}
	}
}

impl From<Box<dyn sqlx::error::DatabaseError>> for GatewayError {
	fn from(error: Box<dyn sqlx::error::DatabaseError>) -> Self {
		match error.kind() {
			ErrorKind::UniqueViolation
			| ErrorKind::ForeignKeyViolation
			| ErrorKind::NotNullViolation
			| ErrorKind::CheckViolation => Self::Rejected(error.message().to_owned()),
			_ => Self::Database(error.into()),
		}
	}
}

impl From<MigrateError> for GatewayError {
	fn from(error: MigrateError) -> Self {
		Self::Migration(error.into())
	}
}

impl From<reqwest::Error> for GatewayError {
	fn from(error: reqwest::Error) -> Self {
		if error.is_decode() {
			Self::Decode(error.into())
		} else {
			Self::Unavailable(error.into())
		}
	}
}

/// Error body returned by the table, storage and auth APIs.
/// The services don't agree on the field name, so all known ones are accepted.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct RemoteErrorBody {
	message: Option<String>,
	msg: Option<String>,
	error: Option<String>,
	error_description: Option<String>,
}

impl RemoteErrorBody {
	fn into_message(self) -> Option<String> {
		self.message.or(self.msg).or(self.error_description).or(self.error)
	}
}

/// Maps a non-success HTTP response onto the error taxonomy.
pub(crate) fn remote_error(status: StatusCode, body: &str) -> GatewayError {
	let message = serde_json::from_str::<RemoteErrorBody>(body)
		.ok()
		.and_then(RemoteErrorBody::into_message);

	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
			GatewayError::Unauthorized(message.unwrap_or_else(|| status.to_string()))
		}
		StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => GatewayError::NotFound(anyhow::anyhow!(
			message.unwrap_or_else(|| status.to_string())
		)),
		status if status.is_client_error() => match message {
			Some(message) => GatewayError::Rejected(message),
			None => GatewayError::Rejected(status.to_string()),
		},
		status => GatewayError::Unavailable(anyhow::anyhow!("{status}: {}", message.unwrap_or_default())),
	}
}

pub trait IntoGatewayResult<Ok>: Sized {
	fn unavailable(self, context: &'static str) -> Result<Ok, GatewayError>;
	fn decode_error(self, context: &'static str) -> Result<Ok, GatewayError>;
}

impl<Ok, Error> IntoGatewayResult<Ok> for Result<Ok, Error>
where
	Error: std::error::Error + Send + Sync + 'static,
{
	fn unavailable(self, context: &'static str) -> Result<Ok, GatewayError> {
		self.context(context).map_err(GatewayError::Unavailable)
	}

	fn decode_error(self, context: &'static str) -> Result<Ok, GatewayError> {
		self.context(context).map_err(GatewayError::Decode)
	}
}
