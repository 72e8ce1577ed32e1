//! Access to the managed backend: auth session, tables, object storage and the realtime change feed.
//!
//! Every concern is an object safe trait so screens can be driven by either the hosted platform
//! ([`hosted::HostedGateway`]) or the SQLite stand-in ([`local::LocalGateway`]).

use crate::chat::gateway::ChatGateway;
use crate::feed::gateway::PostGateway;
use crate::forum::gateway::RoomGateway;
use crate::gateway::auth::AuthGateway;
use crate::gateway::realtime::RealtimeGateway;
use crate::gateway::storage::ObjectStorage;
use crate::profile::gateway::ProfileGateway;
use static_assertions::assert_obj_safe;

pub mod auth;
pub mod error;
pub mod hosted;
pub mod local;
pub mod realtime;
pub mod storage;

pub trait Gateway:
	AuthGateway + ChatGateway + ProfileGateway + RoomGateway + PostGateway + ObjectStorage + RealtimeGateway + Send + Sync + 'static
{
	fn auth(&self) -> &dyn AuthGateway;
	fn chat(&self) -> &dyn ChatGateway;
	fn profile(&self) -> &dyn ProfileGateway;
	fn room(&self) -> &dyn RoomGateway;
	fn post(&self) -> &dyn PostGateway;
	fn storage(&self) -> &dyn ObjectStorage;
	fn realtime(&self) -> &dyn RealtimeGateway;
}

assert_obj_safe!(Gateway);

/// Implements the accessor methods of [`Gateway`] for a type implementing all of its parts.
macro_rules! impl_gateway {
	($gateway:ty) => {
		impl $crate::gateway::Gateway for $gateway {
			fn auth(&self) -> &dyn $crate::gateway::auth::AuthGateway {
				self
			}

			fn chat(&self) -> &dyn $crate::chat::gateway::ChatGateway {
				self
			}

			fn profile(&self) -> &dyn $crate::profile::gateway::ProfileGateway {
				self
			}

			fn room(&self) -> &dyn $crate::forum::gateway::RoomGateway {
				self
			}

			fn post(&self) -> &dyn $crate::feed::gateway::PostGateway {
				self
			}

			fn storage(&self) -> &dyn $crate::gateway::storage::ObjectStorage {
				self
			}

			fn realtime(&self) -> &dyn $crate::gateway::realtime::RealtimeGateway {
				self
			}
		}
	};
}

pub(crate) use impl_gateway;
