use crate::profile::gateway::ProfileGateway;
use crate::profile::model::Profile;
use crate::types::uuid::Uuid;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Profiles of message authors seen during one chat session.
///
/// Holds at most `capacity` profiles and forgets the oldest one first. Profiles are assumed
/// not to change while the session lasts, so entries are never invalidated.
pub struct ProfileCache {
	capacity: usize,
	inner: parking_lot::Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
	profiles: HashMap<Uuid, Profile>,
	insertion_order: VecDeque<Uuid>,
}

impl ProfileCache {
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			capacity,
			inner: Default::default(),
		}
	}

	pub fn get(&self, user_uuid: Uuid) -> Option<Profile> {
		self.inner.lock().profiles.get(&user_uuid).cloned()
	}

	pub fn insert(&self, profile: Profile) {
		if self.capacity == 0 {
			return;
		}

		let mut inner = self.inner.lock();
		let uuid = profile.uuid;
		if inner.profiles.insert(uuid, profile).is_some() {
			return;
		}

		inner.insertion_order.push_back(uuid);
		while inner.insertion_order.len() > self.capacity {
			if let Some(oldest) = inner.insertion_order.pop_front() {
				inner.profiles.remove(&oldest);
			}
		}
	}

	pub fn len(&self) -> usize {
		self.inner.lock().profiles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Looks the author up in the cache, falling back to the gateway.
	///
	/// Missing profiles and failed lookups both yield `None`, the caller shows a placeholder.
	pub async fn author(&self, gateway: &dyn ProfileGateway, user_uuid: Uuid) -> Option<Profile> {
		if let Some(profile) = self.get(user_uuid) {
			return Some(profile);
		}

		match gateway.fetch_profile(user_uuid).await {
			Ok(Some(profile)) => {
				self.insert(profile.clone());
				Some(profile)
			}
			Ok(None) => {
				debug!(user = %user_uuid, "Author has no profile.");
				None
			}
			Err(error) => {
				warn!(user = %user_uuid, %error, "Failed to fetch author profile.");
				None
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn profile(name: &str) -> Profile {
		Profile {
			uuid: Uuid::new_v4(),
			username: name.to_owned(),
			full_name: None,
			bio: None,
			avatar_url: None,
		}
	}

	#[test]
	fn should_evict_oldest_profile_when_full() {
		let cache = ProfileCache::with_capacity(2);
		let alice = profile("alice");
		let bob = profile("bob");
		let carol = profile("carol");

		cache.insert(alice.clone());
		cache.insert(bob.clone());
		cache.insert(carol.clone());

		assert_eq!(None, cache.get(alice.uuid));
		assert_eq!(Some(bob.clone()), cache.get(bob.uuid));
		assert_eq!(Some(carol.clone()), cache.get(carol.uuid));
		assert_eq!(2, cache.len());
	}

	#[test]
	fn should_not_count_reinserted_profile_twice() {
		let cache = ProfileCache::with_capacity(2);
		let alice = profile("alice");
		let bob = profile("bob");

		cache.insert(alice.clone());
		cache.insert(alice.clone());
		cache.insert(bob.clone());

		assert_eq!(Some(alice.clone()), cache.get(alice.uuid));
		assert_eq!(2, cache.len());
	}

	#[test]
	fn should_not_cache_anything_without_capacity() {
		let cache = ProfileCache::with_capacity(0);

		cache.insert(profile("alice"));

		assert!(cache.is_empty());
	}
}
