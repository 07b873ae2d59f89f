//! Periodic per-node health check.

use futures::FutureExt;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::{
	models::Node,
	services::{
		blockwatcher::BlockStorage,
		gateway::ChainGateway,
		health::{NodeStatus, ReconnectionStrategy},
		subscription::SubscriptionRegistry,
	},
	utils::metrics::{NODE_CURRENT_BLOCK, NODE_STATUS, NODE_SYNCING},
};

/// Health state machine of one node.
///
/// Ticks are serialized by the status lock, so a slow tick delays the next one instead of
/// overlapping with it.
pub struct NodeHealthCheckService {
	node: Node,
	gateway: Arc<dyn ChainGateway>,
	registry: Arc<dyn SubscriptionRegistry>,
	block_storage: Arc<dyn BlockStorage>,
	reconnection: Arc<dyn ReconnectionStrategy>,
	status: Mutex<NodeStatus>,
}

impl NodeHealthCheckService {
	pub fn new(
		node: Node,
		gateway: Arc<dyn ChainGateway>,
		registry: Arc<dyn SubscriptionRegistry>,
		block_storage: Arc<dyn BlockStorage>,
		reconnection: Arc<dyn ReconnectionStrategy>,
	) -> Self {
		NODE_STATUS
			.with_label_values(&[node.name.as_str()])
			.set(NodeStatus::default().gauge_value());
		Self {
			node,
			gateway,
			registry,
			block_storage,
			reconnection,
			status: Mutex::new(NodeStatus::default()),
		}
	}

	pub fn node(&self) -> &Node {
		&self.node
	}

	pub async fn status(&self) -> NodeStatus {
		*self.status.lock().await
	}

	/// Runs one health check.
	///
	/// A reachable node records its head and syncing state and, when it was `DOWN`, is
	/// resubscribed. An unreachable node goes `DOWN`, has its subscriptions and block
	/// stream closed on the first failure, and is reconnected through the strategy.
	///
	/// A panic inside the check is logged and swallowed so the next scheduled tick runs.
	#[instrument(skip_all, fields(node = %self.node.name))]
	pub async fn tick(&self) {
		if AssertUnwindSafe(self.check()).catch_unwind().await.is_err() {
			error!("health check panicked");
		}
	}

	async fn check(&self) {
		let mut status = self.status.lock().await;
		match self.gateway.current_block_number().await {
			Ok(current) => {
				self.record_progress(current).await;
				if *status == NodeStatus::Down {
					info!(current, "node answers again, resubscribing");
					self.resubscribe(&mut status).await;
				}
			}
			Err(e) => {
				warn!(error = %e, "node health check failed");
				let prior = *status;
				self.set_status(&mut status, NodeStatus::Down);
				if prior != NodeStatus::Down {
					self.registry.unsubscribe_all(&self.node.name).await;
					if let Err(e) = self.gateway.disconnect().await {
						error!(error = %e, "failed to disconnect gateway");
					}
				}

				if let Err(e) = self.reconnection.reconnect().await {
					warn!(error = %e, "reconnection failed, node stays down");
					return;
				}
				match self.gateway.current_block_number().await {
					Ok(current) => {
						self.record_progress(current).await;
						self.resubscribe(&mut status).await;
					}
					Err(e) => debug!(error = %e, "node still unreachable after reconnect"),
				}
			}
		}
	}

	async fn resubscribe(&self, status: &mut NodeStatus) {
		if let Err(e) = self.reconnection.resubscribe().await {
			error!(error = %e, "failed to resubscribe node");
		}
		let recovered = self.gateway.is_connected()
			&& self.registry.is_fully_subscribed(&self.node.name).await;
		let next = if recovered {
			NodeStatus::Connected
		} else {
			NodeStatus::Down
		};
		self.set_status(status, next);
	}

	async fn record_progress(&self, current: u64) {
		let labels = [self.node.name.as_str()];
		NODE_CURRENT_BLOCK
			.with_label_values(&labels)
			.set(current as f64);

		let checkpoint = match self
			.block_storage
			.get_last_processed_block(&self.node.name)
			.await
		{
			Ok(checkpoint) => checkpoint,
			Err(e) => {
				warn!(error = %e, "failed to read checkpoint");
				None
			}
		};
		let syncing = is_syncing(current, checkpoint, self.node.syncing_threshold);
		if syncing {
			debug!(current, ?checkpoint, "node is syncing");
		}
		NODE_SYNCING
			.with_label_values(&labels)
			.set(if syncing { 1.0 } else { 0.0 });
	}

	fn set_status(&self, status: &mut NodeStatus, next: NodeStatus) {
		if *status != next {
			info!(from = %status, to = %next, "node status changed");
		}
		*status = next;
		NODE_STATUS
			.with_label_values(&[self.node.name.as_str()])
			.set(next.gauge_value());
	}
}

/// The pipeline is more than `threshold` blocks behind the node.
///
/// A node without a checkpoint has processed nothing yet and counts as being at block 0.
pub fn is_syncing(current: u64, checkpoint: Option<u64>, threshold: u64) -> bool {
	current > checkpoint.unwrap_or(0).saturating_add(threshold)
}
