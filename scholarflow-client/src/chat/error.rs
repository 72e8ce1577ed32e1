use crate::chat::lifecycle::SubscriptionState;
use crate::gateway::error::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	#[error("Subscription can't go from {from} to {to}.")]
	InvalidTransition {
		from: SubscriptionState,
		to: SubscriptionState,
	},
}
