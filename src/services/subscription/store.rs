//! Contract events seen by the engine, queried when choosing a filter's start block.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{models::ContractEventDetails, services::subscription::RegistryError};

#[async_trait]
pub trait EventStore: Send + Sync {
	async fn save_contract_event(&self, details: &ContractEventDetails)
		-> Result<(), RegistryError>;

	/// Highest-block event recorded for `(signature hash, contract address)`
	async fn get_latest_contract_event(
		&self,
		signature: &str,
		address: Address,
	) -> Result<Option<ContractEventDetails>, RegistryError>;
}

/// Keeps the latest event per signature hash and contract address
#[derive(Default)]
pub struct InMemoryEventStore {
	latest: RwLock<HashMap<(String, Address), ContractEventDetails>>,
}

impl InMemoryEventStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl EventStore for InMemoryEventStore {
	async fn save_contract_event(
		&self,
		details: &ContractEventDetails,
	) -> Result<(), RegistryError> {
		let key = (
			details.event_specification_signature.to_lowercase(),
			details.address,
		);
		let mut latest = self.latest.write().await;
		let replace = latest
			.get(&key)
			.map_or(true, |existing| details.block_number >= existing.block_number);
		if replace {
			latest.insert(key, details.clone());
		}
		Ok(())
	}

	async fn get_latest_contract_event(
		&self,
		signature: &str,
		address: Address,
	) -> Result<Option<ContractEventDetails>, RegistryError> {
		Ok(self
			.latest
			.read()
			.await
			.get(&(signature.to_lowercase(), address))
			.cloned())
	}
}
