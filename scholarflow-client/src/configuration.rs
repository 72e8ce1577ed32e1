use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Configuration {
	pub log_filters: String,
	/// Base URL of the serverless proxy serving `api/auth` and `api/ai`.
	pub proxy_url: String,
	#[serde(with = "humantime_serde")]
	pub request_timeout: Duration,
	/// Capacity of a chat room's event queue.
	pub event_buffer: usize,
	pub profile_cache_capacity: usize,
	pub backend: Backend,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backend {
	/// The managed platform: PostgREST, storage and the realtime websocket.
	Hosted {
		url: String,
		anon_key: String,
		#[serde(with = "humantime_serde")]
		heartbeat_interval: Duration,
	},
	/// A SQLite database, accounts are handled locally as well.
	Local { database_url: String },
}

impl Configuration {
	pub fn from_file(path: impl AsRef<Path>) -> Result<Configuration, ConfigurationError> {
		let text = read_to_string(path)?;

		Ok(Configuration::try_from(text.as_str())?)
	}
}

impl TryFrom<&str> for Configuration {
	type Error = toml::de::Error;

	fn try_from(text: &str) -> Result<Self, Self::Error> {
		toml::from_str(text)
	}
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
	#[error("Failed to deserialize with error: {0}")]
	DeserializationError(#[from] toml::de::Error),
	#[error("IO operation failed: {0}")]
	IoError(#[from] std::io::Error),
}
