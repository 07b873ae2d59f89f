use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Per-node storage of shared services (gateways, health checkers, ...)
///
/// Values are kept behind an `Arc` so callers can hold on to a service while the
/// map itself is being updated. `T` may be a trait object.
pub struct ClientStorage<T: ?Sized> {
	pub clients: Arc<RwLock<HashMap<String, Arc<T>>>>,
}

impl<T: ?Sized> Default for ClientStorage<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: ?Sized> Clone for ClientStorage<T> {
	fn clone(&self) -> Self {
		Self {
			clients: self.clients.clone(),
		}
	}
}

impl<T: ?Sized> ClientStorage<T> {
	pub fn new() -> Self {
		Self {
			clients: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	pub async fn get(&self, node: &str) -> Option<Arc<T>> {
		self.clients.read().await.get(node).cloned()
	}

	pub async fn insert(&self, node: impl Into<String>, client: Arc<T>) {
		self.clients.write().await.insert(node.into(), client);
	}

	pub async fn nodes(&self) -> Vec<String> {
		let mut nodes: Vec<String> = self.clients.read().await.keys().cloned().collect();
		nodes.sort();
		nodes
	}
}
