//! Serialized block delivery for one node.
//!
//! Blocks are queued on an unbounded lane and handed to every listener in turn. A
//! listener that fails or panics is logged and skipped; its siblings and later blocks
//! are unaffected. Once all listeners saw a block its number becomes the node's
//! checkpoint.

use futures::FutureExt;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

use crate::{
	models::Block,
	services::{
		blockwatcher::storage::BlockStorage,
		gateway::{BlockListeners, TaskHandle},
	},
};

/// Ordered delivery of one node's blocks to its listeners.
///
/// Blocks are queued on an unbounded lane and handed to every listener one block at a
/// time. A listener that fails or panics is logged and skipped; the checkpoint is saved
/// after all listeners have seen the block.
pub struct BlockDispatcher {
	node_name: String,
	lane: mpsc::UnboundedSender<Block>,
	_worker: TaskHandle,
}

impl BlockDispatcher {
	/// Starts the lane of `node_name`. Must run inside a tokio runtime.
	pub fn new(
		node_name: impl Into<String>,
		listeners: BlockListeners,
		storage: Arc<dyn BlockStorage>,
	) -> Self {
		let node_name = node_name.into();
		let (lane, receiver) = mpsc::unbounded_channel();
		let worker = tokio::spawn(run_lane(node_name.clone(), listeners, storage, receiver));
		Self {
			node_name,
			lane,
			_worker: TaskHandle::new(worker),
		}
	}

	pub fn node_name(&self) -> &str {
		&self.node_name
	}

	/// Queues `block` behind every block dispatched before it
	pub fn dispatch(&self, block: Block) {
		if self.lane.send(block).is_err() {
			warn!(node = %self.node_name, "block lane closed, dropping block");
		}
	}
}

async fn run_lane(
	node_name: String,
	listeners: BlockListeners,
	storage: Arc<dyn BlockStorage>,
	mut receiver: mpsc::UnboundedReceiver<Block>,
) {
	while let Some(block) = receiver.recv().await {
		deliver(&node_name, &listeners, storage.as_ref(), &block).await;
	}
	debug!(node = %node_name, "block lane stopped");
}

#[instrument(skip_all, fields(node = %node_name, block = block.number))]
async fn deliver(
	node_name: &str,
	listeners: &BlockListeners,
	storage: &dyn BlockStorage,
	block: &Block,
) {
	for listener in listeners.snapshot().await {
		match AssertUnwindSafe(listener.on_block(block))
			.catch_unwind()
			.await
		{
			Ok(Ok(())) => {}
			Ok(Err(e)) => error!(error = %e, "block listener failed"),
			Err(_) => error!("block listener panicked"),
		}
	}

	if let Err(e) = storage
		.save_last_processed_block(node_name, block.number)
		.await
	{
		warn!(error = %e, "failed to save checkpoint");
	}
}
