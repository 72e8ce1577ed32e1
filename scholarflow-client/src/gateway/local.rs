//! SQLite stand-in for the managed platform, for local development and integration tests.
//!
//! Inserted chat messages are published to the in-process change feed right after the insert,
//! which gives the same delivery behaviour as the hosted realtime channel.
//! Row level security is not emulated, any caller may write any row.

use crate::gateway::auth::SessionSlot;
use crate::gateway::error::{GatewayError, IntoGatewayResult};
use crate::gateway::impl_gateway;
use crate::gateway::realtime::SubscriberRegistry;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqlitePool, migrate};
use std::str::FromStr;
use tracing::info;

mod auth;
mod chat;
mod post;
mod profile;
mod realtime;
mod room;
mod storage;
#[cfg(test)]
pub mod test_utils;

pub struct LocalGateway {
	pool: SqlitePool,
	session: SessionSlot,
	subscribers: SubscriberRegistry,
	last_timestamp: parking_lot::Mutex<DateTime<Utc>>,
}

impl LocalGateway {
	/// Opens (or creates) the database and brings its schema up to date.
	pub async fn connect(database_url: &str) -> Result<Self, GatewayError> {
		let options = SqliteConnectOptions::from_str(database_url)
			.unavailable("Invalid SQLite database URL")?
			.create_if_missing(true)
			.foreign_keys(true);

		// every connection to an in-memory database would get a database of its own
		let maximum_connections = if database_url.contains(":memory:") { 1 } else { 8 };
		let pool = SqlitePoolOptions::new()
			.max_connections(maximum_connections)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await
			.unavailable("Failed to connect to database")?;

		migrate!().run(&pool).await?;
		info!(database_url, "Local backend is ready.");

		Ok(Self {
			pool,
			session: SessionSlot::default(),
			subscribers: SubscriberRegistry::default(),
			last_timestamp: parking_lot::Mutex::new(DateTime::<Utc>::MIN_UTC),
		})
	}

	/// Server assigned creation time, never earlier than the previous one.
	fn timestamp(&self) -> DateTime<Utc> {
		let mut last_timestamp = self.last_timestamp.lock();
		let now = Utc::now().max(*last_timestamp);
		*last_timestamp = now;
		now
	}
}

impl_gateway!(LocalGateway);
