//! Gateway pool keyed by node name.
//!
//! The engine inserts one gateway per configured node at startup; the services look
//! them up by the node name carried on blocks, events and criteria.

use std::sync::Arc;

use crate::{
	services::gateway::{ChainGateway, GatewayError},
	utils::client_storage::ClientStorage,
};

#[derive(Clone, Default)]
pub struct GatewayPool {
	storage: ClientStorage<dyn ChainGateway>,
}

impl GatewayPool {
	pub fn new() -> Self {
		Self {
			storage: ClientStorage::new(),
		}
	}

	pub async fn insert(&self, gateway: Arc<dyn ChainGateway>) {
		self.storage
			.insert(gateway.node_name().to_string(), gateway)
			.await;
	}

	pub async fn get(&self, node: &str) -> Option<Arc<dyn ChainGateway>> {
		self.storage.get(node).await
	}

	/// Like [`GatewayPool::get`] but failing for unknown nodes
	pub async fn require(&self, node: &str) -> Result<Arc<dyn ChainGateway>, GatewayError> {
		self.get(node).await.ok_or_else(|| {
			GatewayError::Other(anyhow::anyhow!("No gateway configured for node {}", node))
		})
	}

	/// Sorted node names
	pub async fn nodes(&self) -> Vec<String> {
		self.storage.nodes().await
	}

	/// Gateways in node name order
	pub async fn gateways(&self) -> Vec<Arc<dyn ChainGateway>> {
		let clients = self.storage.clients.read().await;
		let mut gateways: Vec<_> = clients.iter().collect();
		gateways.sort_by(|a, b| a.0.cmp(b.0));
		gateways.into_iter().map(|(_, g)| g.clone()).collect()
	}

	pub async fn len(&self) -> usize {
		self.storage.clients.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}
