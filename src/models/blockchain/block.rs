//! Block data structures.

use alloy::primitives::{B256, U64};
use serde::{Deserialize, Serialize};

use super::Transaction;

/// A block as delivered to block listeners.
///
/// Unlike the raw JSON-RPC object the block carries the name of the node it was read from,
/// numbers are plain integers and the transaction list is always the full objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
	pub hash: B256,
	pub parent_hash: B256,
	pub number: u64,
	pub timestamp: u64,
	pub node_name: String,
	pub transactions: Vec<Transaction>,
}

/// Head notification: enough to identify a block, not its content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHead {
	pub hash: B256,
	pub number: u64,
	pub timestamp: u64,
}

impl From<&Block> for BlockHead {
	fn from(block: &Block) -> Self {
		Self {
			hash: block.hash,
			number: block.number,
			timestamp: block.timestamp,
		}
	}
}

/// `eth_getBlockBy*` result object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
	pub hash: Option<B256>,
	#[serde(default)]
	pub parent_hash: B256,
	pub number: Option<U64>,
	pub timestamp: U64,
	#[serde(default)]
	pub transactions: Vec<Transaction>,
}

/// `eth_getBlockBy*` result object without transaction bodies
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlockHeader {
	pub hash: Option<B256>,
	pub number: Option<U64>,
	pub timestamp: U64,
}

impl RpcBlock {
	/// Converts the RPC object into a [`Block`] owned by `node_name`.
	///
	/// Returns `None` for pending blocks, which have neither a hash nor a number yet.
	pub fn into_block(self, node_name: &str) -> Option<Block> {
		Some(Block {
			hash: self.hash?,
			parent_hash: self.parent_hash,
			number: self.number?.to(),
			timestamp: self.timestamp.to(),
			node_name: node_name.to_string(),
			transactions: self.transactions,
		})
	}
}

impl RpcBlockHeader {
	pub fn into_head(self) -> Option<BlockHead> {
		Some(BlockHead {
			hash: self.hash?,
			number: self.number?.to(),
			timestamp: self.timestamp.to(),
		})
	}
}
