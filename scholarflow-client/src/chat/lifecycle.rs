use crate::chat::error::ChatError;

/// Lifecycle of the realtime subscription backing a chat room.
///
/// `Closed -> Opening -> Open -> Closing -> Closed`, plus `Opening -> Closed` when the
/// transport refuses the subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
pub enum SubscriptionState {
	#[default]
	Closed,
	Opening,
	Open,
	Closing,
}

impl SubscriptionState {
	pub fn transition(self, to: SubscriptionState) -> Result<SubscriptionState, ChatError> {
		use SubscriptionState::*;
		match (self, to) {
			(Closed, Opening) | (Opening, Open | Closed) | (Open, Closing) | (Closing, Closed) => Ok(to),
			(from, to) => Err(ChatError::InvalidTransition { from, to }),
		}
	}

	/// Only an open subscription may change the local message list.
	pub fn accepts_events(self) -> bool {
		self == SubscriptionState::Open
	}
}
