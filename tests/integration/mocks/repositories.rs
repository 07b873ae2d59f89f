//! Storage mocks: checkpoints, filters and contract events.

use std::{
	collections::HashMap,
	sync::Mutex,
};

use alloy::primitives::Address;
use async_trait::async_trait;
use block_confirmation_monitor::{
	models::{ContractEventDetails, ContractEventFilter},
	repositories::{FilterRepository, RepositoryError},
	services::{
		blockwatcher::BlockStorage,
		subscription::{EventStore, RegistryError},
	},
};
use mockall::mock;

mock! {
	pub BlockStorage {}

	#[async_trait]
	impl BlockStorage for BlockStorage {
		async fn get_last_processed_block(&self, node: &str) -> Result<Option<u64>, anyhow::Error>;
		async fn save_last_processed_block(&self, node: &str, block: u64) -> Result<(), anyhow::Error>;
		async fn save_missed_block(&self, node: &str, block: u64) -> Result<(), anyhow::Error>;
	}
}

mock! {
	pub FilterRepository {}

	#[async_trait]
	impl FilterRepository for FilterRepository {
		async fn save(&self, filter: &ContractEventFilter) -> Result<(), RepositoryError>;
		async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError>;
		async fn find_all(&self) -> Result<Vec<ContractEventFilter>, RepositoryError>;
	}
}

mock! {
	pub EventStore {}

	#[async_trait]
	impl EventStore for EventStore {
		async fn save_contract_event(&self, details: &ContractEventDetails) -> Result<(), RegistryError>;
		async fn get_latest_contract_event(
			&self,
			signature: &str,
			address: Address,
		) -> Result<Option<ContractEventDetails>, RegistryError>;
	}
}

/// Checkpoints and missed blocks kept in memory
#[derive(Default)]
pub struct InMemoryBlockStorage {
	checkpoints: Mutex<HashMap<String, u64>>,
	missed: Mutex<Vec<(String, u64)>>,
}

#[allow(dead_code)]
impl InMemoryBlockStorage {
	pub fn with_checkpoint(node: &str, block: u64) -> Self {
		let storage = Self::default();
		storage
			.checkpoints
			.lock()
			.unwrap()
			.insert(node.to_string(), block);
		storage
	}

	pub fn checkpoint(&self, node: &str) -> Option<u64> {
		self.checkpoints.lock().unwrap().get(node).copied()
	}

	pub fn missed(&self) -> Vec<(String, u64)> {
		self.missed.lock().unwrap().clone()
	}
}

#[async_trait]
impl BlockStorage for InMemoryBlockStorage {
	async fn get_last_processed_block(&self, node: &str) -> Result<Option<u64>, anyhow::Error> {
		Ok(self.checkpoint(node))
	}

	async fn save_last_processed_block(&self, node: &str, block: u64) -> Result<(), anyhow::Error> {
		self.checkpoints
			.lock()
			.unwrap()
			.insert(node.to_string(), block);
		Ok(())
	}

	async fn save_missed_block(&self, node: &str, block: u64) -> Result<(), anyhow::Error> {
		self.missed.lock().unwrap().push((node.to_string(), block));
		Ok(())
	}
}
