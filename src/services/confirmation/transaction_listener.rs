//! Confirmation of monitored transactions.

use async_trait::async_trait;
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Weak,
};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::{
	models::{Block, Node, TransactionDetails, TransactionStatus},
	services::{
		broadcast::BlockchainEventBroadcaster,
		confirmation::tracker::{ConfirmationTracker, ConfirmationVerdict},
		gateway::{BlockListener, ChainGateway},
	},
};

/// Block listener scoped to one `UNCONFIRMED` transaction.
///
/// On confirmation it broadcasts `CONFIRMED` (when wanted), completes the one-shot signal
/// handed over at registration and removes itself. A reorged-out transaction only
/// removes the listener: it may be observed again in another block.
pub struct TransactionConfirmationBlockListener {
	details: Mutex<TransactionDetails>,
	tracker: Mutex<ConfirmationTracker>,
	statuses: Vec<TransactionStatus>,
	gateway: Arc<dyn ChainGateway>,
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	on_confirmed: Mutex<Option<oneshot::Sender<TransactionDetails>>>,
	finished: AtomicBool,
	me: Weak<Self>,
}

impl TransactionConfirmationBlockListener {
	pub fn new(
		details: TransactionDetails,
		node: &Node,
		statuses: Vec<TransactionStatus>,
		gateway: Arc<dyn ChainGateway>,
		broadcaster: Arc<dyn BlockchainEventBroadcaster>,
		on_confirmed: oneshot::Sender<TransactionDetails>,
	) -> Arc<Self> {
		let tracker = ConfirmationTracker::new(node, details.block_number, details.block_hash);
		Arc::new_cyclic(|me| Self {
			details: Mutex::new(details),
			tracker: Mutex::new(tracker),
			statuses,
			gateway,
			broadcaster,
			on_confirmed: Mutex::new(Some(on_confirmed)),
			finished: AtomicBool::new(false),
			me: me.clone(),
		})
	}

	pub fn is_finished(&self) -> bool {
		self.finished.load(Ordering::SeqCst)
	}

	async fn deregister(&self) {
		if let Some(me) = self.me.upgrade() {
			let listener: Arc<dyn BlockListener> = me;
			self.gateway.remove_block_listener(&listener).await;
		}
	}

	async fn confirm(&self) {
		let details = {
			let mut details = self.details.lock().await;
			details.status = TransactionStatus::Confirmed;
			details.clone()
		};
		info!(tx = %details.hash, "transaction confirmed");
		if self.statuses.contains(&TransactionStatus::Confirmed) {
			if let Err(e) = self.broadcaster.broadcast_transaction(&details).await {
				warn!(tx = %details.hash, error = %e, "failed to broadcast transaction");
			}
		}
		if let Some(signal) = self.on_confirmed.lock().await.take() {
			let _ = signal.send(details);
		}
	}
}

#[async_trait]
impl BlockListener for TransactionConfirmationBlockListener {
	async fn on_block(&self, block: &Block) -> Result<(), anyhow::Error> {
		if self.is_finished() {
			return Ok(());
		}

		let tx_hash = self.details.lock().await.hash;
		let receipt = self.gateway.transaction_receipt(tx_hash).await?;
		let verdict = self
			.tracker
			.lock()
			.await
			.evaluate(block.number, receipt.as_ref());

		match verdict {
			ConfirmationVerdict::Pending => {
				debug!(tx = %tx_hash, block = block.number, "transaction still unconfirmed");
				return Ok(());
			}
			ConfirmationVerdict::Confirmed => {
				if self.finished.swap(true, Ordering::SeqCst) {
					return Ok(());
				}
				self.confirm().await;
			}
			ConfirmationVerdict::ReorgedOut => {
				if self.finished.swap(true, Ordering::SeqCst) {
					return Ok(());
				}
				info!(tx = %tx_hash, "transaction left the canonical chain, waiting for it to reappear");
				// dropping the signal tells the monitor the transaction never confirmed
				self.on_confirmed.lock().await.take();
			}
		}
		self.deregister().await;
		Ok(())
	}
}
