//! Per-node facade over the JSON-RPC client.
//!
//! The gateway owns the node's block listener set, the attached block subscription
//! strategy, the log subscriptions and the EVENT lane that turns matched logs into
//! [`ContractEventDetails`].

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use backon::Retryable;
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, OnceLock,
	},
	time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::{
	models::{Block, ContractEventDetails, ContractEventFilter, ContractLog, Node, TransactionReceipt},
	services::{
		blockwatcher::BlockSubscriptionStrategy,
		gateway::{
			BlockChainClient, BlockListener, BlockListeners, ContractEventListener,
			GatewayError, SubscriptionHandle, TaskHandle,
		},
	},
	utils::FixedRetryConfig,
};

/// Node facade used by the pipeline, the confirmation engine, the registry and the health checks
#[async_trait]
pub trait ChainGateway: Send + Sync {
	fn node_name(&self) -> &str;

	/// Probes the node and opens the block subscription. Idempotent.
	async fn connect(&self) -> Result<(), GatewayError>;

	/// Closes the block subscription. Idempotent.
	async fn disconnect(&self) -> Result<(), GatewayError>;

	async fn reconnect(&self) -> Result<(), GatewayError> {
		self.disconnect().await?;
		self.connect().await
	}

	fn is_connected(&self) -> bool;

	async fn current_block_number(&self) -> Result<u64, GatewayError>;

	async fn block_by_hash(&self, hash: B256) -> Result<Option<Block>, GatewayError>;

	/// `None` while the transaction is not mined
	async fn transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, GatewayError>;

	/// Best effort lookup of why a transaction reverted
	async fn revert_reason(
		&self,
		from: Address,
		to: Option<Address>,
		block_number: u64,
		input: Bytes,
	) -> Result<Option<String>, GatewayError>;

	/// Follows the logs of `filter` from `start_block` on and hands matches to `listener`.
	///
	/// Fails with [`GatewayError::SubscriptionError`] when the node rejects the first query.
	async fn register_log_subscription(
		&self,
		filter: &ContractEventFilter,
		start_block: u64,
		listener: Arc<dyn ContractEventListener>,
	) -> Result<SubscriptionHandle, GatewayError>;

	async fn add_block_listener(&self, listener: Arc<dyn BlockListener>);

	async fn remove_block_listener(&self, listener: &Arc<dyn BlockListener>);
}

/// What a log subscription needs to build event details
struct LogSubscription {
	filter_id: String,
	event_name: String,
	signature_hash: String,
	listener: Arc<dyn ContractEventListener>,
}

struct EventTask {
	log: ContractLog,
	subscription: Arc<LogSubscription>,
}

/// [`ChainGateway`] of an EVM node
pub struct EvmGateway {
	node: Node,
	client: Arc<dyn BlockChainClient>,
	listeners: BlockListeners,
	block_strategy: OnceLock<Arc<dyn BlockSubscriptionStrategy>>,
	connected: AtomicBool,
	event_lane: mpsc::UnboundedSender<EventTask>,
	_event_worker: TaskHandle,
}

impl EvmGateway {
	/// Creates the gateway and starts its EVENT lane. Must run inside a tokio runtime.
	pub fn new(node: Node, client: Arc<dyn BlockChainClient>) -> Self {
		let (event_lane, receiver) = mpsc::unbounded_channel();
		let worker = tokio::spawn(run_event_lane(client.clone(), node.clone(), receiver));

		Self {
			node,
			client,
			listeners: BlockListeners::new(),
			block_strategy: OnceLock::new(),
			connected: AtomicBool::new(false),
			event_lane,
			_event_worker: TaskHandle::new(worker),
		}
	}

	/// Listener set shared with the block dispatcher
	pub fn listeners(&self) -> BlockListeners {
		self.listeners.clone()
	}

	/// RPC client of the node.
	///
	/// Block subscription strategies are built on the same client, so the gateway and its
	/// block stream share one endpoint rotation.
	///
	/// # Returns
	/// * `Arc<dyn BlockChainClient>` - The shared client
	pub fn client(&self) -> Arc<dyn BlockChainClient> {
		self.client.clone()
	}

	/// Attaches the strategy opened by `connect` and closed by `disconnect`.
	///
	/// Only the first strategy is kept.
	pub fn attach_block_strategy(&self, strategy: Arc<dyn BlockSubscriptionStrategy>) {
		if self.block_strategy.set(strategy).is_err() {
			warn!(node = %self.node.name, "block strategy already attached, ignoring");
		}
	}

	fn metadata(&self) -> Option<HashMap<String, String>> {
		Some(HashMap::from([("node".to_string(), self.node.name.clone())]))
	}

	fn transport_error(&self, msg: impl Into<String>, e: anyhow::Error) -> GatewayError {
		GatewayError::transport_error(msg, Some(e.into()), self.metadata())
	}
}

#[async_trait]
impl ChainGateway for EvmGateway {
	fn node_name(&self) -> &str {
		&self.node.name
	}

	#[instrument(skip_all, fields(node = %self.node.name))]
	async fn connect(&self) -> Result<(), GatewayError> {
		if self.is_connected() {
			return Ok(());
		}

		self.client
			.get_latest_block_number()
			.await
			.map_err(|e| self.transport_error("Node did not answer connection probe", e))?;
		self.connected.store(true, Ordering::SeqCst);

		if let Some(strategy) = self.block_strategy.get() {
			if !strategy.is_subscribed() {
				info!("Subscribing to block events");
				strategy.subscribe().await.map_err(|e| {
					GatewayError::subscription_error(
						"Failed to open block subscription",
						Some(Box::new(e)),
						self.metadata(),
					)
				})?;
			}
		}
		Ok(())
	}

	#[instrument(skip_all, fields(node = %self.node.name))]
	async fn disconnect(&self) -> Result<(), GatewayError> {
		self.connected.store(false, Ordering::SeqCst);
		if let Some(strategy) = self.block_strategy.get() {
			info!("Unsubscribing from block events");
			if let Err(e) = strategy.unsubscribe().await {
				warn!(error = %e, "Unable to close block subscription");
			}
		}
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
			&& self
				.block_strategy
				.get()
				.map(|strategy| strategy.is_subscribed())
				.unwrap_or(true)
	}

	async fn current_block_number(&self) -> Result<u64, GatewayError> {
		self.client
			.get_latest_block_number()
			.await
			.map_err(|e| self.transport_error("Failed to read current block number", e))
	}

	async fn block_by_hash(&self, hash: B256) -> Result<Option<Block>, GatewayError> {
		self.client
			.get_block_by_hash(hash)
			.await
			.map_err(|e| self.transport_error(format!("Failed to read block {:#x}", hash), e))
	}

	async fn transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, GatewayError> {
		self.client
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| self.transport_error(format!("Failed to read receipt {:#x}", hash), e))
	}

	async fn revert_reason(
		&self,
		from: Address,
		to: Option<Address>,
		block_number: u64,
		input: Bytes,
	) -> Result<Option<String>, GatewayError> {
		self.client
			.get_revert_reason(from, to, block_number, input)
			.await
			.map_err(|e| self.transport_error("Failed to replay transaction", e))
	}

	#[instrument(skip_all, fields(node = %self.node.name, filter = %filter.id()))]
	async fn register_log_subscription(
		&self,
		filter: &ContractEventFilter,
		start_block: u64,
		listener: Arc<dyn ContractEventListener>,
	) -> Result<SubscriptionHandle, GatewayError> {
		let spec = &filter.event_specification;
		let subscription = Arc::new(LogSubscription {
			filter_id: filter.id().to_string(),
			event_name: spec.event_name.clone(),
			signature_hash: spec.signature_hash(),
			listener,
		});
		let address = filter.contract_address;
		let topic = spec.topic();
		let subscription_error = |msg: &str, e: anyhow::Error| {
			let mut metadata = self.metadata().unwrap_or_default();
			metadata.insert("filter_id".to_string(), filter.id().to_string());
			GatewayError::subscription_error(msg, Some(e.into()), Some(metadata))
		};

		let head = self
			.client
			.get_latest_block_number()
			.await
			.map_err(|e| subscription_error("Failed to read head for log subscription", e))?;

		let mut next_block = start_block;
		if start_block <= head {
			let logs = self
				.client
				.get_logs(start_block, head, address, topic)
				.await
				.map_err(|e| subscription_error("Node rejected log query", e))?;
			enqueue_logs(&self.event_lane, &subscription, logs);
			next_block = head + 1;
		}

		debug!(start_block, head, "log subscription opened");
		let client = self.client.clone();
		let lane = self.event_lane.clone();
		let interval = Duration::from_millis(self.node.polling_interval_ms);
		let task = tokio::spawn(async move {
			loop {
				tokio::time::sleep(interval).await;
				let head = match client.get_latest_block_number().await {
					Ok(head) => head,
					Err(e) => {
						warn!(error = %e, "log poll could not read head");
						continue;
					}
				};
				if head < next_block {
					continue;
				}
				match client.get_logs(next_block, head, address, topic).await {
					Ok(logs) => {
						enqueue_logs(&lane, &subscription, logs);
						next_block = head + 1;
					}
					Err(e) => warn!(error = %e, from = next_block, to = head, "log poll failed"),
				}
			}
		});

		Ok(Arc::new(TaskHandle::new(task)))
	}

	async fn add_block_listener(&self, listener: Arc<dyn BlockListener>) {
		self.listeners.add(listener).await;
	}

	async fn remove_block_listener(&self, listener: &Arc<dyn BlockListener>) {
		self.listeners.remove(listener).await;
	}
}

fn enqueue_logs(
	lane: &mpsc::UnboundedSender<EventTask>,
	subscription: &Arc<LogSubscription>,
	logs: Vec<ContractLog>,
) {
	for log in logs {
		if lane
			.send(EventTask {
				log,
				subscription: subscription.clone(),
			})
			.is_err()
		{
			warn!(filter = %subscription.filter_id, "event lane closed, dropping logs");
			return;
		}
	}
}

/// Serialized processing of the matched logs of one node
async fn run_event_lane(
	client: Arc<dyn BlockChainClient>,
	node: Node,
	mut receiver: mpsc::UnboundedReceiver<EventTask>,
) {
	while let Some(task) = receiver.recv().await {
		let filter_id = task.subscription.filter_id.clone();
		if let Err(e) = process_log(client.as_ref(), &node, task).await {
			error!(node = %node.name, filter = %filter_id, error = %e, "dropping matched log");
		}
	}
}

async fn process_log(
	client: &dyn BlockChainClient,
	node: &Node,
	task: EventTask,
) -> Result<(), GatewayError> {
	let EventTask { log, subscription } = task;
	if log.removed {
		debug!(filter = %subscription.filter_id, "skipping removed log");
		return Ok(());
	}
	let (Some(block_hash), Some(tx_hash)) = (log.block_hash, log.transaction_hash) else {
		debug!(filter = %subscription.filter_id, "skipping pending log");
		return Ok(());
	};

	let block = fetch_block(client, block_hash, &node.block_fetch_retry)
		.await
		.map_err(|e| {
			GatewayError::transport_error(
				format!("Block {:#x} of matched log unavailable", block_hash),
				Some(e.into()),
				None,
			)
		})?;
	poll_receipt(
		client,
		tx_hash,
		&node.receipt_poll,
		Duration::from_millis(node.receipt_poll_timeout_ms),
	)
	.await?;

	let details = ContractEventDetails::from_log(
		&subscription.filter_id,
		&subscription.event_name,
		&subscription.signature_hash,
		&log,
		&block,
	);
	debug!(event = %details.id(), "dispatching contract event");
	if let Err(e) = subscription.listener.on_event(details).await {
		error!(filter = %subscription.filter_id, error = %e, "contract event listener failed");
	}
	Ok(())
}

/// Fetches a block by hash, retrying while the node does not know it yet
pub async fn fetch_block(
	client: &dyn BlockChainClient,
	hash: B256,
	retry: &FixedRetryConfig,
) -> Result<Block, anyhow::Error> {
	let fetch = move || async move {
		client
			.get_block_by_hash(hash)
			.await?
			.ok_or_else(|| anyhow::anyhow!("block {:#x} not yet available", hash))
	};
	fetch.retry(retry.builder()).await
}

/// Waits for the receipt of `hash`, bounded by both `retry` and `timeout`
pub async fn poll_receipt(
	client: &dyn BlockChainClient,
	hash: B256,
	retry: &FixedRetryConfig,
	timeout: Duration,
) -> Result<TransactionReceipt, GatewayError> {
	let fetch = move || async move {
		client
			.get_transaction_receipt(hash)
			.await?
			.ok_or_else(|| anyhow::anyhow!("receipt {:#x} not yet available", hash))
	};

	match tokio::time::timeout(timeout, fetch.retry(retry.builder())).await {
		Ok(Ok(receipt)) => Ok(receipt),
		Ok(Err(e)) => Err(GatewayError::receipt_timeout(
			format!(
				"No receipt for {:#x} after {} attempts",
				hash, retry.max_attempts
			),
			Some(e.into()),
			None,
		)),
		Err(_) => Err(GatewayError::receipt_timeout(
			format!("No receipt for {:#x} within {:?}", hash, timeout),
			None,
			None,
		)),
	}
}

