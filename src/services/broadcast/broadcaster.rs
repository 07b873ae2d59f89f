use async_trait::async_trait;
use tracing::info;

use crate::{
	models::{BlockDetails, ContractEventDetails, ContractEventFilter, TransactionDetails},
	services::broadcast::{BroadcastError, BroadcastMessage},
};

/// Downstream sink of the engine's observations.
///
/// Calls are bounded in time; callers log failures and move on.
#[async_trait]
pub trait BlockchainEventBroadcaster: Send + Sync {
	async fn broadcast_block(&self, details: &BlockDetails) -> Result<(), BroadcastError>;

	async fn broadcast_contract_event(
		&self,
		details: &ContractEventDetails,
	) -> Result<(), BroadcastError>;

	async fn broadcast_transaction(
		&self,
		details: &TransactionDetails,
	) -> Result<(), BroadcastError>;

	async fn broadcast_filter_added(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError>;

	async fn broadcast_filter_removed(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError>;
}

/// Writes every message to the log, used when no webhook is configured
#[derive(Debug, Default, Clone)]
pub struct LoggingBroadcaster;

impl LoggingBroadcaster {
	fn log<T: serde::Serialize>(&self, message: &BroadcastMessage<T>) -> Result<(), BroadcastError> {
		let payload = serde_json::to_string(message).map_err(|e| {
			BroadcastError::internal_error("Failed to serialize message", Some(e.into()), None)
		})?;
		info!(id = %message.id, "broadcast {}", payload);
		Ok(())
	}
}

#[async_trait]
impl BlockchainEventBroadcaster for LoggingBroadcaster {
	async fn broadcast_block(&self, details: &BlockDetails) -> Result<(), BroadcastError> {
		self.log(&BroadcastMessage::block(details))
	}

	async fn broadcast_contract_event(
		&self,
		details: &ContractEventDetails,
	) -> Result<(), BroadcastError> {
		self.log(&BroadcastMessage::contract_event(details))
	}

	async fn broadcast_transaction(
		&self,
		details: &TransactionDetails,
	) -> Result<(), BroadcastError> {
		self.log(&BroadcastMessage::transaction(details))
	}

	async fn broadcast_filter_added(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError> {
		self.log(&BroadcastMessage::filter_added(filter))
	}

	async fn broadcast_filter_removed(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError> {
		self.log(&BroadcastMessage::filter_removed(filter))
	}
}
