//! How a node that went down is brought back.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tracing::info;

use crate::services::{
	gateway::ChainGateway, health::HealthCheckError, subscription::SubscriptionRegistry,
};

#[async_trait]
pub trait ReconnectionStrategy: Send + Sync {
	/// Re-establishes the connection to the node
	async fn reconnect(&self) -> Result<(), HealthCheckError>;

	/// Re-opens the node's subscriptions once it answers again
	async fn resubscribe(&self) -> Result<(), HealthCheckError>;
}

/// Reconnects the gateway (which restarts the block stream), then re-opens every filter
pub struct ResubscribingReconnectionStrategy {
	gateway: Arc<dyn ChainGateway>,
	registry: Arc<dyn SubscriptionRegistry>,
}

impl ResubscribingReconnectionStrategy {
	pub fn new(gateway: Arc<dyn ChainGateway>, registry: Arc<dyn SubscriptionRegistry>) -> Self {
		Self { gateway, registry }
	}
}

#[async_trait]
impl ReconnectionStrategy for ResubscribingReconnectionStrategy {
	async fn reconnect(&self) -> Result<(), HealthCheckError> {
		info!(node = %self.gateway.node_name(), "reconnecting");
		self.gateway.reconnect().await.map_err(|e| {
			HealthCheckError::reconnection_error(
				"Failed to reconnect",
				Some(Box::new(e)),
				Some(HashMap::from([(
					"node".to_string(),
					self.gateway.node_name().to_string(),
				)])),
			)
		})
	}

	async fn resubscribe(&self) -> Result<(), HealthCheckError> {
		let node = self.gateway.node_name();
		if !self.gateway.is_connected() {
			self.reconnect().await?;
		}
		self.registry.resubscribe_all(node).await;
		Ok(())
	}
}
