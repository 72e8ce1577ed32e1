use super::LocalGateway;
use crate::gateway::error::GatewayError;
use crate::gateway::realtime::{RealtimeGateway, Subscription, SubscriptionId};
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
impl RealtimeGateway for LocalGateway {
	async fn subscribe(&self, room_uuid: Uuid, buffer: usize) -> Result<Subscription, GatewayError> {
		let subscription = self.subscribers.register(room_uuid, buffer);
		debug!(room = %room_uuid, subscription = %subscription.id(), "Subscribed to local change feed.");
		Ok(subscription)
	}

	async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<(), GatewayError> {
		if !self.subscribers.remove(subscription_id) {
			debug!(subscription = %subscription_id, "Subscription was already released.");
		}
		Ok(())
	}
}

impl LocalGateway {
	pub fn active_subscriptions(&self) -> usize {
		self.subscribers.active_count()
	}
}
