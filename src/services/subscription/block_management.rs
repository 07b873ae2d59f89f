//! Start block selection for contract-event filters.

use alloy::primitives::Address;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{
	models::{ContractEventFilter, Node},
	services::{
		gateway::GatewayPool,
		subscription::{EventStore, RegistryError},
	},
};

/// Picks the first block a filter's log subscription should cover.
///
/// - highest block seen for the event in this process: that block + 1
/// - otherwise the latest stored event's block + 1, never older than
///   `current - max_unsynced_blocks_for_filter`
/// - otherwise the current block
pub fn select_start_block(
	seen: Option<u64>,
	stored: Option<u64>,
	current: u64,
	max_unsynced_blocks_for_filter: u64,
) -> u64 {
	if let Some(seen) = seen {
		return seen + 1;
	}
	match stored {
		Some(stored) => (stored + 1).max(current.saturating_sub(max_unsynced_blocks_for_filter)),
		None => current,
	}
}

/// Remembers the highest block per (event signature hash, contract address)
pub struct EventBlockManagementService {
	latest: RwLock<HashMap<(String, Address), u64>>,
	store: Arc<dyn EventStore>,
	gateways: GatewayPool,
	nodes: HashMap<String, Node>,
}

impl EventBlockManagementService {
	pub fn new(
		store: Arc<dyn EventStore>,
		gateways: GatewayPool,
		nodes: HashMap<String, Node>,
	) -> Self {
		Self {
			latest: RwLock::new(HashMap::new()),
			store,
			gateways,
			nodes,
		}
	}

	/// Records `block` for the event unless a higher block is already known
	pub async fn update_latest_block(&self, signature_hash: &str, address: Address, block: u64) {
		let mut latest = self.latest.write().await;
		let entry = latest
			.entry((signature_hash.to_lowercase(), address))
			.or_insert(block);
		*entry = (*entry).max(block);
	}

	#[instrument(skip_all, fields(node = %filter.node, filter = %filter.id()))]
	pub async fn latest_block_for_event(
		&self,
		filter: &ContractEventFilter,
	) -> Result<u64, RegistryError> {
		let signature_hash = filter.event_specification.signature_hash();
		let seen = self
			.latest
			.read()
			.await
			.get(&(signature_hash.clone(), filter.contract_address))
			.copied();
		if let Some(seen) = seen {
			debug!(seen, "resuming after last seen event");
			return Ok(select_start_block(Some(seen), None, 0, 0));
		}

		let metadata = || {
			Some(HashMap::from([
				("node".to_string(), filter.node.clone()),
				("filter_id".to_string(), filter.id().to_string()),
			]))
		};
		let node = self.nodes.get(&filter.node).ok_or_else(|| {
			RegistryError::registration_error("Filter refers to an unknown node", None, metadata())
		})?;
		let gateway = self.gateways.require(&filter.node).await.map_err(|e| {
			RegistryError::registration_error("No gateway for node", Some(Box::new(e)), metadata())
		})?;

		let stored = self
			.store
			.get_latest_contract_event(&signature_hash, filter.contract_address)
			.await?
			.map(|event| event.block_number);
		let current = gateway.current_block_number().await.map_err(|e| {
			RegistryError::registration_error(
				"Failed to read current block",
				Some(Box::new(e)),
				metadata(),
			)
		})?;

		let start = select_start_block(None, stored, current, node.max_unsynced_blocks_for_filter);
		debug!(?stored, current, start, "selected start block");
		Ok(start)
	}
}
