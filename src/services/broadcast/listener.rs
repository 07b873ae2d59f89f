use async_trait::async_trait;
use std::sync::Arc;

use crate::{
	models::{Block, BlockDetails},
	services::{broadcast::BlockchainEventBroadcaster, gateway::BlockListener},
};

/// Publishes every block of the stream as a `BLOCK` message
pub struct BlockBroadcastListener {
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
}

impl BlockBroadcastListener {
	pub fn new(broadcaster: Arc<dyn BlockchainEventBroadcaster>) -> Self {
		Self { broadcaster }
	}
}

#[async_trait]
impl BlockListener for BlockBroadcastListener {
	async fn on_block(&self, block: &Block) -> Result<(), anyhow::Error> {
		self.broadcaster
			.broadcast_block(&BlockDetails::from(block))
			.await?;
		Ok(())
	}
}
