//! Confirmation of contract events.

use async_trait::async_trait;
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Weak,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
	models::{Block, ContractEventDetails, ContractEventStatus, Node},
	services::{
		broadcast::BlockchainEventBroadcaster,
		confirmation::tracker::{ConfirmationTracker, ConfirmationVerdict},
		gateway::{BlockListener, ChainGateway},
	},
};

/// Block listener scoped to one `UNCONFIRMED` contract event.
///
/// Broadcasts `CONFIRMED` or `INVALIDATED` exactly once and then removes itself from
/// the gateway.
pub struct EventConfirmationBlockListener {
	details: Mutex<ContractEventDetails>,
	tracker: Mutex<ConfirmationTracker>,
	gateway: Arc<dyn ChainGateway>,
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	finished: AtomicBool,
	me: Weak<Self>,
}

impl EventConfirmationBlockListener {
	pub fn new(
		details: ContractEventDetails,
		node: &Node,
		gateway: Arc<dyn ChainGateway>,
		broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	) -> Arc<Self> {
		let tracker = ConfirmationTracker::new(node, details.block_number, details.block_hash);
		Arc::new_cyclic(|me| Self {
			details: Mutex::new(details),
			tracker: Mutex::new(tracker),
			gateway,
			broadcaster,
			finished: AtomicBool::new(false),
			me: me.clone(),
		})
	}

	pub fn is_finished(&self) -> bool {
		self.finished.load(Ordering::SeqCst)
	}

	async fn finish(&self, status: ContractEventStatus) {
		if self.finished.swap(true, Ordering::SeqCst) {
			return;
		}

		let details = {
			let mut details = self.details.lock().await;
			details.status = status;
			details.clone()
		};
		info!(event = %details.id(), status = ?status, "contract event reached terminal status");
		if let Err(e) = self.broadcaster.broadcast_contract_event(&details).await {
			warn!(event = %details.id(), error = %e, "failed to broadcast contract event");
		}

		if let Some(me) = self.me.upgrade() {
			let listener: Arc<dyn BlockListener> = me;
			self.gateway.remove_block_listener(&listener).await;
		}
	}
}

#[async_trait]
impl BlockListener for EventConfirmationBlockListener {
	async fn on_block(&self, block: &Block) -> Result<(), anyhow::Error> {
		if self.is_finished() {
			return Ok(());
		}

		let tx_hash = self.details.lock().await.transaction_hash;
		let receipt = self.gateway.transaction_receipt(tx_hash).await?;
		let verdict = self
			.tracker
			.lock()
			.await
			.evaluate(block.number, receipt.as_ref());

		match verdict {
			ConfirmationVerdict::Pending => {
				debug!(tx = %tx_hash, block = block.number, "contract event still unconfirmed")
			}
			ConfirmationVerdict::Confirmed => self.finish(ContractEventStatus::Confirmed).await,
			ConfirmationVerdict::ReorgedOut => self.finish(ContractEventStatus::Invalidated).await,
		}
		Ok(())
	}
}
