//! Transaction receipt and log data structures.

use alloy::primitives::{Address, Bytes, B256, U64};
use serde::{Deserialize, Serialize};

/// Receipt of a mined transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: B256,
	#[serde(default)]
	pub transaction_index: U64,
	pub block_hash: B256,
	pub block_number: U64,
	#[serde(default)]
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	#[serde(default)]
	pub contract_address: Option<Address>,
	#[serde(default)]
	pub logs: Vec<ContractLog>,
	/// `0x1` success, `0x0` failure; absent on pre-Byzantium chains
	#[serde(default)]
	pub status: Option<U64>,
}

impl TransactionReceipt {
	/// A receipt without a status field counts as successful.
	pub fn is_successful(&self) -> bool {
		!matches!(self.status, Some(status) if status == U64::ZERO)
	}

	pub fn block_number(&self) -> u64 {
		self.block_number.to()
	}
}

/// Contract log as returned by `eth_getLogs` and inside receipts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLog {
	pub address: Address,
	pub topics: Vec<B256>,
	#[serde(default)]
	pub data: Bytes,
	#[serde(default)]
	pub block_hash: Option<B256>,
	#[serde(default)]
	pub block_number: Option<U64>,
	#[serde(default)]
	pub transaction_hash: Option<B256>,
	#[serde(default)]
	pub transaction_index: Option<U64>,
	#[serde(default)]
	pub log_index: Option<U64>,
	#[serde(default)]
	pub removed: bool,
}
