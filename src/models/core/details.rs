//! Observations handed to broadcasters.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::models::{Block, ContractLog, Transaction};

/// Lifecycle of a contract event observation
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractEventStatus {
	#[default]
	Unconfirmed,
	Confirmed,
	Invalidated,
}

impl ContractEventStatus {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Unconfirmed)
	}
}

/// Lifecycle of a transaction observation
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
	#[default]
	Unconfirmed,
	Confirmed,
	Failed,
}

impl TransactionStatus {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Unconfirmed)
	}
}

/// A matched contract log together with its position in the chain
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractEventDetails {
	pub name: String,
	pub filter_id: String,
	pub node_name: String,
	pub topics: Vec<B256>,
	pub data: Bytes,
	pub transaction_hash: B256,
	pub log_index: u64,
	pub block_number: u64,
	pub block_hash: B256,
	pub address: Address,
	pub status: ContractEventStatus,
	pub event_specification_signature: String,
	pub timestamp: u64,
}

impl ContractEventDetails {
	/// Builds the observation of `log` as included in `block`
	pub fn from_log(
		filter_id: &str,
		event_name: &str,
		signature_hash: &str,
		log: &ContractLog,
		block: &Block,
	) -> Self {
		Self {
			name: event_name.to_string(),
			filter_id: filter_id.to_string(),
			node_name: block.node_name.clone(),
			topics: log.topics.clone(),
			data: log.data.clone(),
			transaction_hash: log.transaction_hash.unwrap_or_default(),
			log_index: log.log_index.map(|i| i.to()).unwrap_or_default(),
			block_number: block.number,
			block_hash: block.hash,
			address: log.address,
			status: ContractEventStatus::Unconfirmed,
			event_specification_signature: signature_hash.to_string(),
			timestamp: block.timestamp,
		}
	}

	/// Identity of the observation: the same log seen in another block is another observation
	pub fn id(&self) -> String {
		format!(
			"{:#x}-{:#x}-{}",
			self.transaction_hash, self.block_hash, self.log_index
		)
	}
}

/// A transaction matched by a criterion
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
	pub hash: B256,
	pub nonce: U256,
	pub block_hash: B256,
	pub block_number: u64,
	pub block_timestamp: u64,
	pub transaction_index: u64,
	pub from: Address,
	pub to: Option<Address>,
	pub value: U256,
	pub input: Bytes,
	pub node_name: String,
	pub contract_address: Option<Address>,
	pub revert_reason: Option<String>,
	pub status: TransactionStatus,
}

impl TransactionDetails {
	pub fn from_transaction(transaction: &Transaction, block: &Block) -> Self {
		Self {
			hash: transaction.hash,
			nonce: transaction.nonce,
			block_hash: block.hash,
			block_number: block.number,
			block_timestamp: block.timestamp,
			transaction_index: transaction.index(),
			from: transaction.from,
			to: transaction.to,
			value: transaction.value,
			input: transaction.input.clone(),
			node_name: block.node_name.clone(),
			contract_address: None,
			revert_reason: None,
			status: TransactionStatus::Unconfirmed,
		}
	}
}

/// Block summary broadcast for every block of the stream
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockDetails {
	pub number: u64,
	pub hash: B256,
	pub timestamp: u64,
	pub node_name: String,
}

impl From<&Block> for BlockDetails {
	fn from(block: &Block) -> Self {
		Self {
			number: block.number,
			hash: block.hash,
			timestamp: block.timestamp,
			node_name: block.node_name.clone(),
		}
	}
}
