//! Transaction monitoring against matching criteria.
//!
//! Every block of every node passes through [`TransactionMonitoringBlockListener`]. A
//! transaction matching one of the node's criteria is observed once per (transaction,
//! block) pair: the first matching criterion wins.
//!
//! State is kept per node behind its own lock, so nodes never wait for each other. The
//! lock is only held to claim an observation (criteria lookup plus the processed set) and
//! is released while the receipt is fetched. Adding a criterion claims matches in the
//! node's recently cached blocks through the same lock, so a transaction mined just
//! before the criterion arrived is neither missed nor observed twice.

use alloy::primitives::B256;
use async_trait::async_trait;
use backon::Retryable;
use std::{
	collections::{HashMap, HashSet},
	sync::{Arc, Weak},
	time::Duration,
};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::{
	models::{
		Block, Node, Transaction, TransactionDetails, TransactionMatchingCriterion,
		TransactionReceipt, TransactionStatus,
	},
	services::{
		broadcast::BlockchainEventBroadcaster,
		confirmation::{ConfirmationError, TransactionConfirmationBlockListener},
		gateway::{BlockListener, ChainGateway, GatewayPool},
	},
	utils::{metrics::TRANSACTION_CRITERIA, RingBuffer},
};

/// Criteria, recent blocks and observations of one node
struct NodeState {
	criteria: Vec<TransactionMatchingCriterion>,
	block_cache: RingBuffer<Block>,
	/// Transactions already claimed, keyed by block hash
	processed: HashMap<B256, HashSet<B256>>,
}

impl NodeState {
	fn new(block_cache_size: usize) -> Self {
		Self {
			criteria: Vec::new(),
			block_cache: RingBuffer::new(block_cache_size),
			processed: HashMap::new(),
		}
	}

	/// Claims `transaction` in `block` for the first matching criterion.
	///
	/// With `only` set, just that criterion is considered. Returns `None` when the
	/// observation was claimed before or nothing matches.
	fn claim(
		&mut self,
		block: &Block,
		transaction: &Transaction,
		only: Option<&str>,
	) -> Option<TransactionMatchingCriterion> {
		let already = self
			.processed
			.get(&block.hash)
			.is_some_and(|txs| txs.contains(&transaction.hash));
		if already {
			return None;
		}

		let criterion = self
			.criteria
			.iter()
			.filter(|criterion| only.is_none_or(|id| criterion.id == id))
			.find(|criterion| criterion.is_a_match(transaction))
			.cloned()?;
		self.processed
			.entry(block.hash)
			.or_default()
			.insert(transaction.hash);
		Some(criterion)
	}

	/// Gives a claim back so a later criterion can pick the observation up again
	fn release(&mut self, block_hash: &B256, tx_hash: &B256) {
		if let Some(txs) = self.processed.get_mut(block_hash) {
			txs.remove(tx_hash);
		}
	}

	fn remove(&mut self, node: &str, id: &str) -> bool {
		let before = self.criteria.len();
		self.criteria.retain(|criterion| criterion.id != id);
		let removed = self.criteria.len() != before;
		if removed {
			TRANSACTION_CRITERIA
				.with_label_values(&[node])
				.set(self.criteria.len() as f64);
		}
		removed
	}

	/// Forgets observations whose block left the cache
	fn prune(&mut self) {
		let cached: HashSet<B256> = self.block_cache.iter().map(|block| block.hash).collect();
		self.processed.retain(|hash, _| cached.contains(hash));
	}
}

/// Matches the transactions of every node's blocks against the node's criteria.
///
/// Matched transactions are broadcast as `CONFIRMED` or `FAILED` straight away when the
/// node needs no confirmations or the transaction failed. Otherwise they are broadcast as
/// `UNCONFIRMED` and handed to a [`TransactionConfirmationBlockListener`] on the node's
/// gateway. One-time criteria are removed once their transaction reached a terminal
/// status.
pub struct TransactionMonitoringBlockListener {
	gateways: GatewayPool,
	nodes: HashMap<String, Node>,
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	states: HashMap<String, Mutex<NodeState>>,
	me: Weak<Self>,
}

impl TransactionMonitoringBlockListener {
	/// Creates the monitor with empty state for every node in `nodes`.
	///
	/// # Arguments
	/// * `gateways` - Gateways used for receipts, revert reasons and confirmation listeners
	/// * `nodes` - Node configurations by name; blocks of other nodes are ignored
	/// * `broadcaster` - Sink for transaction details
	///
	/// # Returns
	/// * `Arc<Self>` - The monitor, ready to be added as block listener to each gateway
	pub fn new(
		gateways: GatewayPool,
		nodes: HashMap<String, Node>,
		broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	) -> Arc<Self> {
		let states = nodes
			.iter()
			.map(|(name, node)| (name.clone(), Mutex::new(NodeState::new(node.block_cache_size))))
			.collect();
		Arc::new_cyclic(|me| Self {
			gateways,
			nodes,
			broadcaster,
			states,
			me: me.clone(),
		})
	}

	/// Adds a criterion and checks it against the node's cached blocks.
	///
	/// # Arguments
	/// * `criterion` - Criterion to add; its node must be configured
	///
	/// # Returns
	/// * `Result<(), ConfirmationError>` - `UnknownNode` when the node is not configured
	#[instrument(skip_all, fields(node = %criterion.node_name, criterion = %criterion.id))]
	pub async fn add_matching_criterion(
		&self,
		criterion: TransactionMatchingCriterion,
	) -> Result<(), ConfirmationError> {
		let (Some(node), Some(state)) = (
			self.nodes.get(&criterion.node_name),
			self.states.get(&criterion.node_name),
		) else {
			return Err(ConfirmationError::unknown_node(
				format!("No configuration for node {}", criterion.node_name),
				None,
				None,
			));
		};

		let cached: Vec<Block> = {
			let mut state = state.lock().await;
			state.criteria.push(criterion.clone());
			TRANSACTION_CRITERIA
				.with_label_values(&[node.name.as_str()])
				.set(state.criteria.len() as f64);
			state.block_cache.iter().cloned().collect()
		};

		for block in &cached {
			for transaction in &block.transactions {
				// a one-time criterion may be gone after an earlier match
				let claimed = state
					.lock()
					.await
					.claim(block, transaction, Some(criterion.id.as_str()));
				if let Some(criterion) = claimed {
					self.on_transaction_matched(node, state, block, transaction, &criterion)
						.await;
				}
			}
		}
		Ok(())
	}

	/// Removes a criterion.
	///
	/// # Returns
	/// * `bool` - Whether the criterion existed
	pub async fn remove_matching_criterion(&self, node: &str, id: &str) -> bool {
		match self.states.get(node) {
			Some(state) => state.lock().await.remove(node, id),
			None => false,
		}
	}

	/// Criteria currently registered for `node`, in insertion order
	pub async fn criteria(&self, node: &str) -> Vec<TransactionMatchingCriterion> {
		match self.states.get(node) {
			Some(state) => state.lock().await.criteria.clone(),
			None => Vec::new(),
		}
	}

	/// Waits for the receipt, bounded by the node's receipt poll attempts and timeout
	async fn fetch_receipt(
		&self,
		gateway: &dyn ChainGateway,
		node: &Node,
		hash: B256,
	) -> Result<TransactionReceipt, ConfirmationError> {
		let metadata = || {
			Some(HashMap::from([
				("node".to_string(), node.name.clone()),
				("tx".to_string(), format!("{:#x}", hash)),
			]))
		};
		let fetch = move || async move {
			gateway
				.transaction_receipt(hash)
				.await?
				.ok_or_else(|| anyhow::anyhow!("receipt {:#x} not yet available", hash))
		};
		let timeout = Duration::from_millis(node.receipt_poll_timeout_ms);

		match tokio::time::timeout(timeout, fetch.retry(node.receipt_poll.builder())).await {
			Ok(Ok(receipt)) => Ok(receipt),
			Ok(Err(e)) => Err(ConfirmationError::receipt_error(
				format!(
					"No receipt for matched transaction {:#x} after {} attempts",
					hash, node.receipt_poll.max_attempts
				),
				Some(e.into()),
				metadata(),
			)),
			Err(_) => Err(ConfirmationError::receipt_error(
				format!(
					"No receipt for matched transaction {:#x} within {:?}",
					hash, timeout
				),
				None,
				metadata(),
			)),
		}
	}

	async fn broadcast_if_wanted(&self, details: &TransactionDetails, statuses: &[TransactionStatus]) {
		if !statuses.contains(&details.status) {
			return;
		}
		if let Err(e) = self.broadcaster.broadcast_transaction(details).await {
			warn!(tx = %details.hash, error = %e, "failed to broadcast transaction");
		}
	}

	/// Handles a claimed observation. Must be called without holding `state`.
	async fn on_transaction_matched(
		&self,
		node: &Node,
		state: &Mutex<NodeState>,
		block: &Block,
		transaction: &Transaction,
		criterion: &TransactionMatchingCriterion,
	) {
		let Some(gateway) = self.gateways.get(&node.name).await else {
			warn!(node = %node.name, "matched transaction on a node without gateway");
			state.lock().await.release(&block.hash, &transaction.hash);
			return;
		};

		let receipt = match self.fetch_receipt(gateway.as_ref(), node, transaction.hash).await {
			Ok(receipt) => receipt,
			Err(e) => {
				// blocks are delivered once, only a criterion added while the block is
				// still cached can observe the transaction again
				warn!(
					tx = %transaction.hash,
					block = block.number,
					criterion = %criterion.id,
					error = %e,
					"dropping matched transaction without receipt"
				);
				state.lock().await.release(&block.hash, &transaction.hash);
				return;
			}
		};

		let mut details = TransactionDetails::from_transaction(transaction, block);
		details.contract_address = receipt.contract_address;
		let success = receipt.is_successful();
		info!(tx = %details.hash, criterion = %criterion.id, success, "transaction matched");

		if success && node.blocks_to_wait_for_confirmation > 0 {
			details.status = TransactionStatus::Unconfirmed;
			let (signal, confirmed) = oneshot::channel();
			let listener = TransactionConfirmationBlockListener::new(
				details.clone(),
				node,
				criterion.statuses.clone(),
				gateway.clone(),
				self.broadcaster.clone(),
				signal,
			);
			gateway.add_block_listener(listener).await;
			self.broadcast_if_wanted(&details, &criterion.statuses).await;

			// criteria stay while waiting so a forked transaction is observed again
			if criterion.one_time_match {
				let monitor = self.me.clone();
				let node_name = criterion.node_name.clone();
				let id = criterion.id.clone();
				tokio::spawn(async move {
					if confirmed.await.is_ok() {
						if let Some(monitor) = monitor.upgrade() {
							debug!(criterion = %id, "transaction confirmed, removing one-time criterion");
							monitor.remove_matching_criterion(&node_name, &id).await;
						}
					}
				});
			}
			return;
		}

		if success {
			details.status = TransactionStatus::Confirmed;
		} else {
			details.status = TransactionStatus::Failed;
			if node.add_transaction_revert_reason {
				match gateway
					.revert_reason(
						details.from,
						details.to,
						details.block_number,
						details.input.clone(),
					)
					.await
				{
					Ok(reason) => details.revert_reason = reason,
					Err(e) => warn!(tx = %details.hash, error = %e, "revert reason unavailable"),
				}
			}
		}
		self.broadcast_if_wanted(&details, &criterion.statuses).await;

		if criterion.one_time_match {
			state.lock().await.remove(&node.name, &criterion.id);
		}
	}
}

#[async_trait]
impl BlockListener for TransactionMonitoringBlockListener {
	#[instrument(skip_all, fields(node = %block.node_name, block = block.number))]
	async fn on_block(&self, block: &Block) -> Result<(), anyhow::Error> {
		let (Some(node), Some(state)) = (
			self.nodes.get(&block.node_name),
			self.states.get(&block.node_name),
		) else {
			debug!("block of an unmanaged node");
			return Ok(());
		};

		{
			let mut state = state.lock().await;
			state.block_cache.push(block.clone());
			state.prune();
		}

		for transaction in &block.transactions {
			let claimed = state.lock().await.claim(block, transaction, None);
			if let Some(criterion) = claimed {
				self.on_transaction_matched(node, state, block, transaction, &criterion)
					.await;
			}
		}
		Ok(())
	}
}
