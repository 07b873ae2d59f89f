//! Block subscription strategies.
//!
//! Both strategies replay the blocks missed since the node's checkpoint and then follow
//! the chain, feeding the same [`BlockDispatcher`]:
//!
//! - [`LiveHeadStrategy`] watches the head header and resolves each new head by hash
//! - [`PollingStrategy`] watches the head number and fetches every new block by number
//!
//! Whatever the source, blocks reach the dispatcher in strictly increasing order without
//! gaps or repeats: a head more than one number ahead of the last delivered block first
//! pulls the missing numbers.

use async_trait::async_trait;
use backon::Retryable;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
	models::{Block, BlockHead, BlockStrategy, Node},
	services::{
		blockwatcher::{
			dispatcher::BlockDispatcher, error::BlockWatcherError, storage::BlockStorage,
			tracker::BlockTracker,
		},
		gateway::{fetch_block, BlockChainClient, Disposable, TaskHandle},
	},
};

/// Source of a node's block stream
#[async_trait]
pub trait BlockSubscriptionStrategy: Send + Sync {
	/// Opens the stream. No-op while subscribed.
	async fn subscribe(&self) -> Result<(), BlockWatcherError>;

	/// Closes the stream. No-op while unsubscribed.
	async fn unsubscribe(&self) -> Result<(), BlockWatcherError>;

	/// True while a non-disposed handle is held
	fn is_subscribed(&self) -> bool;
}

/// Builds the strategy selected by `node.block_strategy`.
///
/// # Arguments
/// * `node` - Node configuration: strategy, polling interval, replay cap and fetch retry
/// * `client` - RPC client the blocks are read from
/// * `dispatcher` - Lane delivering blocks to the node's listeners
/// * `storage` - Checkpoint read when the stream opens
/// * `tracker` - Delivery history; keeps ordering across reconnects when shared
///
/// # Returns
/// * `Arc<dyn BlockSubscriptionStrategy>` - An unsubscribed strategy
pub fn create_block_strategy(
	node: &Node,
	client: Arc<dyn BlockChainClient>,
	dispatcher: Arc<BlockDispatcher>,
	storage: Arc<dyn BlockStorage>,
	tracker: BlockTracker,
) -> Arc<dyn BlockSubscriptionStrategy> {
	let feed = Arc::new(BlockFeed {
		node: node.clone(),
		client,
		dispatcher,
		storage,
		tracker,
	});
	match node.block_strategy {
		BlockStrategy::LiveHead => Arc::new(LiveHeadStrategy::new(feed)),
		BlockStrategy::Polling => Arc::new(PollingStrategy::new(feed)),
	}
}

/// Fetching and ordering shared by the strategies
pub struct BlockFeed {
	node: Node,
	client: Arc<dyn BlockChainClient>,
	dispatcher: Arc<BlockDispatcher>,
	storage: Arc<dyn BlockStorage>,
	tracker: BlockTracker,
}

impl BlockFeed {
	fn metadata(&self) -> Option<HashMap<String, String>> {
		Some(HashMap::from([("node".to_string(), self.node.name.clone())]))
	}

	/// Reads the head and positions the tracker where the replay has to start.
	///
	/// Returns the head number the replay runs up to.
	async fn prepare(&self) -> Result<u64, BlockWatcherError> {
		let head = self.client.get_latest_block_number().await.map_err(|e| {
			BlockWatcherError::network_error(
				"Failed to read head block number",
				Some(e.into()),
				self.metadata(),
			)
		})?;

		let last = match self.tracker.get_last_block(&self.node.name).await {
			Some(last) => Some(last),
			None => self
				.storage
				.get_last_processed_block(&self.node.name)
				.await
				.map_err(|e| {
					BlockWatcherError::storage_error(
						"Failed to read checkpoint",
						Some(e.into()),
						self.metadata(),
					)
				})?,
		};

		match last {
			None => info!(head, "no checkpoint, starting from current head"),
			Some(last) => {
				let cap = self.node.max_unsynced_blocks;
				let mut replay_start = last + 1;
				if head.saturating_sub(last) > cap {
					replay_start = head - cap;
					warn!(
						checkpoint = last,
						head,
						replay_start,
						"checkpoint too far behind, clamping replay"
					);
				}
				info!(replay_start, head, "replaying blocks since checkpoint");
				self.tracker
					.seed(&self.node.name, replay_start.saturating_sub(1))
					.await;
			}
		}
		Ok(head)
	}

	async fn fetch_by_number(&self, number: u64) -> Result<Block, BlockWatcherError> {
		let client = self.client.as_ref();
		let fetch = move || async move {
			client
				.get_block_by_number(number)
				.await?
				.ok_or_else(|| anyhow::anyhow!("block {} not yet available", number))
		};
		fetch
			.retry(self.node.block_fetch_retry.builder())
			.await
			.map_err(|e| {
				BlockWatcherError::block_fetch_error(
					format!("Block {} could not be fetched, skipping", number),
					Some(e.into()),
					self.metadata(),
				)
			})
	}

	async fn deliver(&self, block: Block) {
		if let Some(last) = self.tracker.get_last_block(&self.node.name).await {
			if block.number <= last {
				debug!(block = block.number, last, "skipping already delivered block");
				return;
			}
		}
		self.tracker.record_block(&self.node.name, block.number).await;
		self.dispatcher.dispatch(block);
	}

	/// Delivers every block after the last delivered one up to `target`.
	///
	/// With nothing delivered yet only `target` itself is fetched.
	pub async fn advance_to(&self, target: u64) {
		let next = match self.tracker.get_last_block(&self.node.name).await {
			Some(last) => last + 1,
			None => target,
		};
		for number in next..=target {
			// errors are logged when built; the block is skipped
			if let Ok(block) = self.fetch_by_number(number).await {
				self.deliver(block).await;
			}
		}
	}

	/// Delivers a new head, pulling any numbers between the last delivered block and it
	pub async fn on_head(&self, head: BlockHead) {
		match self.tracker.get_last_block(&self.node.name).await {
			Some(last) if head.number <= last => return,
			Some(last) if head.number > last + 1 => self.advance_to(head.number - 1).await,
			_ => {}
		}

		match fetch_block(self.client.as_ref(), head.hash, &self.node.block_fetch_retry).await {
			Ok(block) => self.deliver(block).await,
			Err(e) => {
				BlockWatcherError::block_fetch_error(
					format!("Head {:#x} could not be resolved, skipping", head.hash),
					Some(e.into()),
					self.metadata(),
				);
			}
		}
	}

	fn interval(&self) -> Duration {
		Duration::from_millis(self.node.polling_interval_ms)
	}
}

/// Slot holding the handle of the running stream
#[derive(Default)]
struct StreamSlot {
	handle: std::sync::Mutex<Option<TaskHandle>>,
	subscribe_lock: Mutex<()>,
}

impl StreamSlot {
	fn is_subscribed(&self) -> bool {
		self.handle
			.lock()
			.map(|handle| handle.as_ref().is_some_and(|h| !h.is_disposed()))
			.unwrap_or(false)
	}

	fn store(&self, handle: TaskHandle) -> Result<(), BlockWatcherError> {
		let mut slot = self
			.handle
			.lock()
			.map_err(|e| anyhow::anyhow!("subscription slot poisoned: {}", e))?;
		*slot = Some(handle);
		Ok(())
	}

	fn dispose(&self) -> Result<(), BlockWatcherError> {
		let handle = self
			.handle
			.lock()
			.map_err(|e| anyhow::anyhow!("subscription slot poisoned: {}", e))?
			.take();
		if let Some(handle) = handle {
			handle.dispose().map_err(|e| anyhow::anyhow!(e))?;
		}
		Ok(())
	}
}

/// Catch-up followed by head header notifications
pub struct LiveHeadStrategy {
	feed: Arc<BlockFeed>,
	slot: StreamSlot,
}

impl LiveHeadStrategy {
	pub fn new(feed: Arc<BlockFeed>) -> Self {
		Self {
			feed,
			slot: StreamSlot::default(),
		}
	}
}

#[async_trait]
impl BlockSubscriptionStrategy for LiveHeadStrategy {
	#[instrument(skip_all, fields(node = %self.feed.node.name))]
	async fn subscribe(&self) -> Result<(), BlockWatcherError> {
		let _guard = self.slot.subscribe_lock.lock().await;
		if self.slot.is_subscribed() {
			return Ok(());
		}

		let head = self.feed.prepare().await?;
		let feed = self.feed.clone();
		let task = tokio::spawn(async move {
			feed.advance_to(head).await;
			loop {
				tokio::time::sleep(feed.interval()).await;
				match feed.client.get_latest_head().await {
					Ok(head) => feed.on_head(head).await,
					Err(e) => warn!(node = %feed.node.name, error = %e, "failed to read head"),
				}
			}
		});
		self.slot.store(TaskHandle::new(task))
	}

	async fn unsubscribe(&self) -> Result<(), BlockWatcherError> {
		self.slot.dispose()
	}

	fn is_subscribed(&self) -> bool {
		self.slot.is_subscribed()
	}
}

/// Catch-up followed by head number polling
pub struct PollingStrategy {
	feed: Arc<BlockFeed>,
	slot: StreamSlot,
}

impl PollingStrategy {
	pub fn new(feed: Arc<BlockFeed>) -> Self {
		Self {
			feed,
			slot: StreamSlot::default(),
		}
	}
}

#[async_trait]
impl BlockSubscriptionStrategy for PollingStrategy {
	#[instrument(skip_all, fields(node = %self.feed.node.name))]
	async fn subscribe(&self) -> Result<(), BlockWatcherError> {
		let _guard = self.slot.subscribe_lock.lock().await;
		if self.slot.is_subscribed() {
			return Ok(());
		}

		let head = self.feed.prepare().await?;
		let feed = self.feed.clone();
		let task = tokio::spawn(async move {
			feed.advance_to(head).await;
			loop {
				tokio::time::sleep(feed.interval()).await;
				match feed.client.get_latest_block_number().await {
					Ok(number) => feed.advance_to(number).await,
					Err(e) => warn!(node = %feed.node.name, error = %e, "failed to poll head"),
				}
			}
		});
		self.slot.store(TaskHandle::new(task))
	}

	async fn unsubscribe(&self) -> Result<(), BlockWatcherError> {
		self.slot.dispose()
	}

	fn is_subscribed(&self) -> bool {
		self.slot.is_subscribed()
	}
}
