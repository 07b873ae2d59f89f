use serde::{Deserialize, Serialize};

use crate::utils::FixedRetryConfig;

fn default_polling_interval_ms() -> u64 {
	1_000
}

fn default_blocks_to_wait_for_confirmation() -> u64 {
	12
}

fn default_blocks_to_wait_for_missing_tx() -> u64 {
	200
}

fn default_blocks_to_wait_before_invalidation() -> u64 {
	2
}

fn default_max_unsynced_blocks() -> u64 {
	100_000
}

fn default_max_unsynced_blocks_for_filter() -> u64 {
	7_200
}

fn default_syncing_threshold() -> u64 {
	60
}

fn default_health_check_interval_ms() -> u64 {
	2_000
}

fn default_receipt_poll() -> FixedRetryConfig {
	FixedRetryConfig::new(30, 1_000)
}

fn default_receipt_poll_timeout_ms() -> u64 {
	60_000
}

fn default_block_cache_size() -> usize {
	50
}

/// How a node's block stream is produced
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockStrategy {
	/// Replay from the checkpoint, then follow head notifications
	#[default]
	LiveHead,
	/// Periodically read the head number and fetch every new block by number
	Polling,
}

/// Configuration of a monitored node.
///
/// Loaded once at start-up and never changed afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Node {
	/// Unique name of the node, used as key everywhere
	pub name: String,

	/// JSON-RPC endpoints with their weights
	pub rpc_urls: Vec<RpcUrl>,

	#[serde(default)]
	pub block_strategy: BlockStrategy,

	/// Interval between two head reads
	#[serde(default = "default_polling_interval_ms")]
	pub polling_interval_ms: u64,

	/// Depth after which an observation is confirmed
	#[serde(default = "default_blocks_to_wait_for_confirmation")]
	pub blocks_to_wait_for_confirmation: u64,

	/// Number of blocks a receipt may stay missing before the observation is dropped
	#[serde(default = "default_blocks_to_wait_for_missing_tx")]
	pub blocks_to_wait_for_missing_tx: u64,

	/// Number of blocks a receipt may point at another block before the observation is dropped
	#[serde(default = "default_blocks_to_wait_before_invalidation")]
	pub blocks_to_wait_before_invalidation: u64,

	#[serde(default)]
	pub add_transaction_revert_reason: bool,

	/// Largest number of blocks replayed from a checkpoint
	#[serde(default = "default_max_unsynced_blocks")]
	pub max_unsynced_blocks: u64,

	/// Largest distance between a filter's stored events and its start block
	#[serde(default = "default_max_unsynced_blocks_for_filter")]
	pub max_unsynced_blocks_for_filter: u64,

	/// Head distance from the checkpoint above which the node is reported as syncing
	#[serde(default = "default_syncing_threshold")]
	pub syncing_threshold: u64,

	#[serde(default = "default_health_check_interval_ms")]
	pub health_check_interval_ms: u64,

	/// Retry used to resolve a head into a full block
	#[serde(default)]
	pub block_fetch_retry: FixedRetryConfig,

	/// Retry used while waiting for the receipt of a matched log
	#[serde(default = "default_receipt_poll")]
	pub receipt_poll: FixedRetryConfig,

	/// Overall bound of a receipt poll
	#[serde(default = "default_receipt_poll_timeout_ms")]
	pub receipt_poll_timeout_ms: u64,

	/// Retry used when a filter is registered while the node is recovering
	#[serde(default)]
	pub filter_registration_retry: FixedRetryConfig,

	/// Number of recent blocks kept for re-evaluating new transaction criteria
	#[serde(default = "default_block_cache_size")]
	pub block_cache_size: usize,
}

/// RPC endpoint configuration with load balancing weight
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RpcUrl {
	/// Type of RPC endpoint (e.g. "rpc")
	pub type_: String,

	pub url: String,

	/// Weight for load balancing (0-100)
	pub weight: u32,
}
