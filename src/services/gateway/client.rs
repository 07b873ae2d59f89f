//! JSON-RPC client of an EVM node.
//!
//! Every call returns `anyhow` errors with context; the gateway turns them into
//! [`GatewayError::TransportError`](crate::services::gateway::GatewayError).

use alloy::primitives::{Address, Bytes, B256};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
	models::{
		Block, BlockHead, ContractLog, Node, RpcBlock, RpcBlockHeader, TransactionReceipt,
	},
	services::gateway::{
		revert::decode_revert_reason,
		transports::{BlockchainTransport, HttpTransportClient, TransportError},
	},
	utils::{http::RetryConfig, parse_hex_quantity},
};

/// Read access to a node
#[async_trait]
pub trait BlockChainClient: Send + Sync {
	async fn get_latest_block_number(&self) -> Result<u64, anyhow::Error>;

	/// Hash, number and timestamp of the current head
	async fn get_latest_head(&self) -> Result<BlockHead, anyhow::Error>;

	/// `None` when the node does not know the block
	async fn get_block_by_hash(&self, hash: B256) -> Result<Option<Block>, anyhow::Error>;

	async fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, anyhow::Error>;

	/// `None` while the transaction is not mined
	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, anyhow::Error>;

	/// Logs of `address` whose first topic is `topic` in `[from_block, to_block]`
	async fn get_logs(
		&self,
		from_block: u64,
		to_block: u64,
		address: Address,
		topic: B256,
	) -> Result<Vec<ContractLog>, anyhow::Error>;

	/// Replays a call at `block_number` and returns its revert reason, if any
	async fn get_revert_reason(
		&self,
		from: Address,
		to: Option<Address>,
		block_number: u64,
		input: Bytes,
	) -> Result<Option<String>, anyhow::Error>;
}

/// [`BlockChainClient`] over any JSON-RPC transport
#[derive(Clone)]
pub struct EvmClient<T: BlockchainTransport + Clone> {
	node_name: String,
	transport: T,
}

impl<T: BlockchainTransport + Clone> EvmClient<T> {
	pub fn new_with_transport(node_name: impl Into<String>, transport: T) -> Self {
		Self {
			node_name: node_name.into(),
			transport,
		}
	}

	/// Sends the request and returns its `result` member.
	///
	/// A JSON-RPC `error` member becomes [`TransportError::Rpc`].
	async fn request(&self, method: &str, params: Value) -> Result<Value, anyhow::Error> {
		let mut response = self
			.transport
			.send_raw_request(method, Some(params))
			.await
			.with_context(|| format!("{} failed on node {}", method, self.node_name))?;

		if let Some(error) = response.get("error") {
			let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
			let message = error
				.get("message")
				.and_then(Value::as_str)
				.unwrap_or("unknown error");
			return Err(TransportError::rpc(code, message, None).into());
		}

		response
			.get_mut("result")
			.map(Value::take)
			.with_context(|| format!("Missing 'result' field in {} response", method))
	}

	async fn get_block(&self, method: &str, id: Value) -> Result<Option<Block>, anyhow::Error> {
		let result = self.request(method, json!([id, true])).await?;
		if result.is_null() {
			return Ok(None);
		}
		let block: RpcBlock =
			serde_json::from_value(result).with_context(|| "Failed to parse block")?;
		Ok(block.into_block(&self.node_name))
	}
}

impl EvmClient<HttpTransportClient> {
	/// Connects to `node` over HTTP
	pub async fn new(node: &Node, retry_config: &RetryConfig) -> Result<Self, anyhow::Error> {
		let transport = HttpTransportClient::new(node, retry_config).await?;
		Ok(Self::new_with_transport(node.name.clone(), transport))
	}
}

#[async_trait]
impl<T: BlockchainTransport + Clone + 'static> BlockChainClient for EvmClient<T> {
	#[instrument(skip(self), fields(node = %self.node_name))]
	async fn get_latest_block_number(&self) -> Result<u64, anyhow::Error> {
		let result = self.request("eth_blockNumber", json!([])).await?;
		let hex = result
			.as_str()
			.with_context(|| "eth_blockNumber result is not a string")?;
		parse_hex_quantity(hex).map_err(|e| anyhow::anyhow!("Failed to parse block number: {}", e))
	}

	#[instrument(skip(self), fields(node = %self.node_name))]
	async fn get_latest_head(&self) -> Result<BlockHead, anyhow::Error> {
		let result = self
			.request("eth_getBlockByNumber", json!(["latest", false]))
			.await?;
		let header: RpcBlockHeader =
			serde_json::from_value(result).with_context(|| "Failed to parse latest block")?;
		header
			.into_head()
			.with_context(|| "Latest block has no hash or number")
	}

	#[instrument(skip(self), fields(node = %self.node_name))]
	async fn get_block_by_hash(&self, hash: B256) -> Result<Option<Block>, anyhow::Error> {
		self.get_block("eth_getBlockByHash", json!(format!("{:#x}", hash)))
			.await
	}

	#[instrument(skip(self), fields(node = %self.node_name))]
	async fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, anyhow::Error> {
		self.get_block("eth_getBlockByNumber", json!(format!("0x{:x}", number)))
			.await
	}

	#[instrument(skip(self), fields(node = %self.node_name))]
	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, anyhow::Error> {
		let result = self
			.request("eth_getTransactionReceipt", json!([format!("{:#x}", hash)]))
			.await?;
		if result.is_null() {
			return Ok(None);
		}
		Ok(Some(
			serde_json::from_value(result).with_context(|| "Failed to parse transaction receipt")?,
		))
	}

	#[instrument(skip(self), fields(node = %self.node_name))]
	async fn get_logs(
		&self,
		from_block: u64,
		to_block: u64,
		address: Address,
		topic: B256,
	) -> Result<Vec<ContractLog>, anyhow::Error> {
		let params = json!([{
			"fromBlock": format!("0x{:x}", from_block),
			"toBlock": format!("0x{:x}", to_block),
			"address": format!("{:#x}", address),
			"topics": [format!("{:#x}", topic)]
		}]);
		let result = self.request("eth_getLogs", params).await?;
		serde_json::from_value(result).with_context(|| "Failed to parse logs")
	}

	#[instrument(skip(self, input), fields(node = %self.node_name))]
	async fn get_revert_reason(
		&self,
		from: Address,
		to: Option<Address>,
		block_number: u64,
		input: Bytes,
	) -> Result<Option<String>, anyhow::Error> {
		let params = json!([
			{
				"from": format!("{:#x}", from),
				"to": to.map(|to| format!("{:#x}", to)),
				"data": input.to_string()
			},
			format!("0x{:x}", block_number)
		]);
		let response = self
			.transport
			.send_raw_request("eth_call", Some(params))
			.await
			.with_context(|| format!("eth_call failed on node {}", self.node_name))?;

		// Nodes report reverts either as an error object carrying the revert data or as raw output
		if let Some(error) = response.get("error") {
			let data = error.get("data").and_then(Value::as_str);
			let message = error.get("message").and_then(Value::as_str);
			return Ok(data
				.and_then(decode_revert_reason)
				.or_else(|| message.map(str::to_string)));
		}

		Ok(response
			.get("result")
			.and_then(Value::as_str)
			.and_then(decode_revert_reason))
	}
}
