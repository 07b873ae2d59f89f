//! Transaction data structures.

use alloy::primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};

/// Transaction object as returned by `eth_getBlockByHash(.., true)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	pub hash: B256,
	#[serde(default)]
	pub nonce: U256,
	#[serde(default)]
	pub block_hash: Option<B256>,
	#[serde(default)]
	pub block_number: Option<U64>,
	#[serde(default)]
	pub transaction_index: Option<U64>,
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	#[serde(default)]
	pub value: U256,
	#[serde(default)]
	pub input: Bytes,
}

impl Transaction {
	pub fn index(&self) -> u64 {
		self.transaction_index.map(|i| i.to()).unwrap_or_default()
	}
}
