//! First sighting of contract events.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, instrument, warn};

use crate::{
	models::{ContractEventDetails, ContractEventStatus, Node},
	services::{
		broadcast::BlockchainEventBroadcaster,
		confirmation::{ConfirmationError, EventConfirmationBlockListener},
		gateway::{ContractEventListener, GatewayPool},
	},
};

/// Decides how a freshly matched contract event enters the confirmation state machine.
///
/// - zero confirmation depth: `CONFIRMED` right away
/// - already deep enough and still at the recorded block: `CONFIRMED` right away
/// - otherwise `UNCONFIRMED` plus an [`EventConfirmationBlockListener`] on the node
pub struct ConfirmationCheckInitialiser {
	gateways: GatewayPool,
	nodes: HashMap<String, Node>,
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
}

impl ConfirmationCheckInitialiser {
	/// # Arguments
	/// * `gateways` - Gateways the confirmation listeners are attached to
	/// * `nodes` - Node configurations by name
	/// * `broadcaster` - Sink for event details
	pub fn new(
		gateways: GatewayPool,
		nodes: HashMap<String, Node>,
		broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	) -> Self {
		Self {
			gateways,
			nodes,
			broadcaster,
		}
	}

	async fn broadcast(&self, details: &ContractEventDetails) {
		if let Err(e) = self.broadcaster.broadcast_contract_event(details).await {
			warn!(event = %details.id(), error = %e, "failed to broadcast contract event");
		}
	}
}

#[async_trait]
impl ContractEventListener for ConfirmationCheckInitialiser {
	#[instrument(skip_all, fields(node = %details.node_name, event = %details.id()))]
	async fn on_event(&self, mut details: ContractEventDetails) -> Result<(), anyhow::Error> {
		if details.status != ContractEventStatus::Unconfirmed {
			debug!(status = ?details.status, "event already settled");
			return Ok(());
		}

		let node = self.nodes.get(&details.node_name).ok_or_else(|| {
			ConfirmationError::unknown_node(
				format!("No configuration for node {}", details.node_name),
				None,
				None,
			)
		})?;
		let gateway = self.gateways.require(&details.node_name).await?;

		let depth = node.blocks_to_wait_for_confirmation;
		if depth == 0 {
			details.status = ContractEventStatus::Confirmed;
			self.broadcast(&details).await;
			return Ok(());
		}

		let current = gateway.current_block_number().await?;
		if current >= details.block_number + depth {
			let receipt = gateway.transaction_receipt(details.transaction_hash).await?;
			if receipt.is_some_and(|r| r.block_hash == details.block_hash) {
				info!(current, "event already deep enough, confirming");
				details.status = ContractEventStatus::Confirmed;
				self.broadcast(&details).await;
				return Ok(());
			}
		}

		self.broadcast(&details).await;
		let listener = EventConfirmationBlockListener::new(
			details,
			node,
			gateway.clone(),
			self.broadcaster.clone(),
		);
		gateway.add_block_listener(listener).await;
		Ok(())
	}
}
