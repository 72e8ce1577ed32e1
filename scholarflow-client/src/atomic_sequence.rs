use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// Hands out increasing numbers, used for subscription ids and realtime frame references.
#[derive(Default)]
pub struct AtomicSequence {
	next_number: AtomicU64,
}

impl AtomicSequence {
	pub fn starting_at(first: u64) -> Self {
		Self {
			next_number: AtomicU64::new(first),
		}
	}

	pub fn next(&self) -> u64 {
		// Relaxed is enough, only the value itself has to be unique.
		self.next_number.fetch_add(1, Relaxed)
	}
}
