//! Listener traits and the per-node block listener set.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Block, ContractEventDetails};

/// Receives every block of a node's stream, in order
#[async_trait]
pub trait BlockListener: Send + Sync {
	async fn on_block(&self, block: &Block) -> Result<(), anyhow::Error>;
}

/// Receives matched contract events
#[async_trait]
pub trait ContractEventListener: Send + Sync {
	async fn on_event(&self, details: ContractEventDetails) -> Result<(), anyhow::Error>;
}

/// Block listeners of one node, compared by identity
#[derive(Clone, Default)]
pub struct BlockListeners {
	listeners: Arc<RwLock<Vec<Arc<dyn BlockListener>>>>,
}

impl BlockListeners {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `listener` unless that very instance is already registered
	pub async fn add(&self, listener: Arc<dyn BlockListener>) {
		let mut listeners = self.listeners.write().await;
		if !listeners.iter().any(|l| same_listener(l, &listener)) {
			listeners.push(listener);
		}
	}

	pub async fn remove(&self, listener: &Arc<dyn BlockListener>) {
		self.listeners
			.write()
			.await
			.retain(|l| !same_listener(l, listener));
	}

	/// Copy of the current set; listeners may add or remove themselves while it is iterated
	pub async fn snapshot(&self) -> Vec<Arc<dyn BlockListener>> {
		self.listeners.read().await.clone()
	}

	pub async fn len(&self) -> usize {
		self.listeners.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.listeners.read().await.is_empty()
	}
}

/// Identity comparison on the data pointer, ignoring vtables
fn same_listener(a: &Arc<dyn BlockListener>, b: &Arc<dyn BlockListener>) -> bool {
	std::ptr::eq(
		Arc::as_ptr(a) as *const (),
		Arc::as_ptr(b) as *const (),
	)
}
