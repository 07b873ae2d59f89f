//! Registry of live contract-event filter subscriptions.
//!
//! Subscriptions are grouped per node. Each node's map is replaced as a whole on every
//! change, so readers always see a consistent snapshot and a node can be resubscribed
//! without touching the others.

use async_trait::async_trait;
use backon::Retryable;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
	models::{ContractEventFilter, Node},
	repositories::FilterRepository,
	services::{
		broadcast::BlockchainEventBroadcaster,
		gateway::{ContractEventListener, GatewayPool, SubscriptionHandle, TaskHandle},
		subscription::{EventBlockManagementService, RegistryError},
	},
	utils::{metrics::FILTERS_REGISTERED, FixedRetryConfig},
};

/// A registered filter and its live log subscription
#[derive(Clone)]
pub struct FilterSubscription {
	pub filter: ContractEventFilter,
	pub handle: SubscriptionHandle,
	pub start_block: u64,
}

type NodeSubscriptions = Arc<HashMap<String, FilterSubscription>>;

/// Registry of contract event filters and their live log subscriptions.
///
/// Filters are grouped by node. Each node's set is an immutable snapshot swapped under the
/// write lock, so readers (health checks, metrics, listings) never see a half-rebuilt set
/// while [`resubscribe_all`](Self::resubscribe_all) re-opens subscriptions.
///
/// Mutations are serialized; reads are not.
pub struct FilterSubscriptionRegistry {
	gateways: GatewayPool,
	nodes: HashMap<String, Node>,
	block_management: Arc<EventBlockManagementService>,
	repository: Arc<dyn FilterRepository>,
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	listener: Arc<dyn ContractEventListener>,
	subscriptions: RwLock<HashMap<String, NodeSubscriptions>>,
	/// Serializes register, unregister and resubscribe
	mutation: Mutex<()>,
}

impl FilterSubscriptionRegistry {
	/// Creates an empty registry.
	///
	/// # Arguments
	/// * `gateways` - Gateways used to open log subscriptions
	/// * `nodes` - Node configurations by name; filters for other nodes are ignored
	/// * `block_management` - Source of the start block when a filter is (re)subscribed
	/// * `repository` - Persistence of registered filters
	/// * `broadcaster` - Sink for filter added and removed messages
	/// * `listener` - Receives every matched contract event
	pub fn new(
		gateways: GatewayPool,
		nodes: HashMap<String, Node>,
		block_management: Arc<EventBlockManagementService>,
		repository: Arc<dyn FilterRepository>,
		broadcaster: Arc<dyn BlockchainEventBroadcaster>,
		listener: Arc<dyn ContractEventListener>,
	) -> Self {
		Self {
			gateways,
			nodes,
			block_management,
			repository,
			broadcaster,
			listener,
			subscriptions: RwLock::new(HashMap::new()),
			mutation: Mutex::new(()),
		}
	}

	/// Registers `filter` and opens its log subscription.
	///
	/// A filter without an id gets a fresh UUID. Registering a known id is a no-op that
	/// returns the filter already registered under it.
	///
	/// # Arguments
	/// * `filter` - Filter to register
	/// * `broadcast` - Whether to broadcast a filter added message
	///
	/// # Returns
	/// * `Ok(Some(filter))` - The registered filter, carrying its id
	/// * `Ok(None)` - The filter's node is not configured
	/// * `Err(RegistryError)` - The node rejected the log subscription
	#[instrument(skip_all, fields(node = %filter.node))]
	pub async fn register(
		&self,
		mut filter: ContractEventFilter,
		broadcast: bool,
	) -> Result<Option<ContractEventFilter>, RegistryError> {
		let _guard = self.mutation.lock().await;

		let id = filter
			.id
			.get_or_insert_with(|| Uuid::new_v4().to_string())
			.clone();
		if let Some(existing) = self.find(&id).await {
			info!(filter = %id, "filter already registered");
			return Ok(Some(existing.filter));
		}
		if !self.nodes.contains_key(&filter.node) || self.gateways.get(&filter.node).await.is_none()
		{
			warn!(filter = %id, "filter refers to an unknown node, ignoring");
			return Ok(None);
		}

		let start_block = match filter.start_block {
			Some(start) => start,
			None => self.block_management.latest_block_for_event(&filter).await?,
		};
		let handle = self.open(&filter, start_block).await?;

		let subscription = FilterSubscription {
			filter: filter.clone(),
			handle,
			start_block,
		};
		self.update_node(&filter.node, |subscriptions| {
			subscriptions.insert(id.clone(), subscription);
		})
		.await;
		info!(filter = %id, start_block, "filter registered");

		if let Err(e) = self.repository.save(&filter).await {
			error!(filter = %id, error = %e, "failed to persist filter");
		}
		if broadcast {
			if let Err(e) = self.broadcaster.broadcast_filter_added(&filter).await {
				warn!(filter = %id, error = %e, "failed to broadcast filter added");
			}
		}
		Ok(Some(filter))
	}

	/// [`register`](Self::register) with the node's bounded fixed-backoff retry
	pub async fn register_with_retry(
		&self,
		mut filter: ContractEventFilter,
		broadcast: bool,
	) -> Result<Option<ContractEventFilter>, RegistryError> {
		filter
			.id
			.get_or_insert_with(|| Uuid::new_v4().to_string());
		let retry = self.retry_config(&filter.node);
		let filter = &filter;
		(move || async move { self.register(filter.clone(), broadcast).await })
			.retry(retry.builder())
			.notify(|e, delay| warn!(filter = %filter.id(), error = %e, ?delay, "retrying filter registration"))
			.await
	}

	/// Removes a filter and closes its subscription
	#[instrument(skip(self, broadcast))]
	pub async fn unregister(
		&self,
		id: &str,
		broadcast: bool,
	) -> Result<ContractEventFilter, RegistryError> {
		let _guard = self.mutation.lock().await;

		let subscription = self.find(id).await.ok_or_else(|| {
			RegistryError::not_found(
				format!("No filter registered with id {}", id),
				None,
				Some(HashMap::from([("filter_id".to_string(), id.to_string())])),
			)
		})?;

		if let Err(e) = subscription.handle.dispose() {
			error!(filter = %id, error = %e, "failed to dispose filter subscription");
		}
		self.update_node(&subscription.filter.node, |subscriptions| {
			subscriptions.remove(id);
		})
		.await;
		if let Err(e) = self.repository.delete_by_id(id).await {
			error!(filter = %id, error = %e, "failed to delete persisted filter");
		}
		if broadcast {
			if let Err(e) = self
				.broadcaster
				.broadcast_filter_removed(&subscription.filter)
				.await
			{
				warn!(filter = %id, error = %e, "failed to broadcast filter removed");
			}
		}
		info!(filter = %id, "filter unregistered");
		Ok(subscription.filter)
	}

	/// Registered filters of every node, by id
	pub async fn list(&self) -> Vec<ContractEventFilter> {
		let mut filters: Vec<ContractEventFilter> = self
			.subscriptions
			.read()
			.await
			.values()
			.flat_map(|subscriptions| subscriptions.values().map(|s| s.filter.clone()))
			.collect();
		filters.sort_by(|a, b| a.id().cmp(b.id()));
		filters
	}

	/// Current subscriptions of `node`.
	///
	/// The result is a copy of the node's snapshot, so it stays stable while the registry
	/// re-opens subscriptions.
	///
	/// # Arguments
	/// * `node` - Node name
	///
	/// # Returns
	/// * `Vec<FilterSubscription>` - The filters and handles, empty for unknown nodes
	pub async fn subscriptions(&self, node: &str) -> Vec<FilterSubscription> {
		self.node_snapshot(node)
			.await
			.map(|subscriptions| subscriptions.values().cloned().collect())
			.unwrap_or_default()
	}

	/// Re-opens every subscription of `node` and swaps the new set in at once.
	///
	/// A filter that cannot be re-opened keeps a disposed handle, so the node is not
	/// reported as fully subscribed until the next attempt.
	#[instrument(skip(self))]
	pub async fn resubscribe_all(&self, node: &str) {
		let _guard = self.mutation.lock().await;
		let Some(current) = self.node_snapshot(node).await else {
			return;
		};

		let retry = self.retry_config(node);
		let mut renewed = HashMap::with_capacity(current.len());
		for (id, subscription) in current.iter() {
			if let Err(e) = subscription.handle.dispose() {
				warn!(filter = %id, error = %e, "failed to dispose stale subscription");
			}
			let filter = &subscription.filter;
			let reopened = (move || async move {
				let managed = self.block_management.latest_block_for_event(filter).await?;
				let start_block = filter.start_block.map_or(managed, |start| start.max(managed));
				let handle = self.open(filter, start_block).await?;
				Ok::<_, RegistryError>((handle, start_block))
			})
			.retry(retry.builder())
			.await;

			let subscription = match reopened {
				Ok((handle, start_block)) => FilterSubscription {
					filter: filter.clone(),
					handle,
					start_block,
				},
				Err(e) => {
					error!(filter = %id, error = %e, "failed to resubscribe filter");
					FilterSubscription {
						filter: filter.clone(),
						handle: Arc::new(TaskHandle::disposed()),
						start_block: subscription.start_block,
					}
				}
			};
			renewed.insert(id.clone(), subscription);
		}

		let count = renewed.len();
		self.subscriptions
			.write()
			.await
			.insert(node.to_string(), Arc::new(renewed));
		info!(filters = count, "filters resubscribed");
	}

	/// Closes every subscription of `node`; the filters stay registered
	#[instrument(skip(self))]
	pub async fn unsubscribe_all(&self, node: &str) {
		let Some(subscriptions) = self.node_snapshot(node).await else {
			return;
		};
		for (id, subscription) in subscriptions.iter() {
			if let Err(e) = subscription.handle.dispose() {
				error!(filter = %id, error = %e, "failed to dispose filter subscription");
			}
		}
		info!(filters = subscriptions.len(), "filters unsubscribed");
	}

	/// No subscription of `node` is disposed
	pub async fn is_fully_subscribed(&self, node: &str) -> bool {
		self.node_snapshot(node).await.map_or(true, |subscriptions| {
			subscriptions.values().all(|s| !s.handle.is_disposed())
		})
	}

	/// Registers the persisted filters, then the `configured` ones not already known.
	///
	/// Returns the number of filters that are registered afterwards.
	pub async fn init(&self, configured: Vec<ContractEventFilter>) -> Result<usize, RegistryError> {
		let persisted = self.repository.find_all().await.map_err(|e| {
			RegistryError::store_error("Failed to load persisted filters", Some(Box::new(e)), None)
		})?;

		for filter in persisted.into_iter().chain(configured) {
			let id = filter.id().to_string();
			if let Err(e) = self.register_with_retry(filter, false).await {
				error!(filter = %id, error = %e, "failed to register filter at start-up");
			}
		}
		Ok(self.list().await.len())
	}

	/// Disposes every subscription, carrying on past failures
	pub async fn shutdown(&self) -> Result<(), RegistryError> {
		let snapshot: Vec<NodeSubscriptions> =
			self.subscriptions.read().await.values().cloned().collect();
		let mut failures = Vec::new();
		for subscription in snapshot.iter().flat_map(|s| s.values()) {
			if let Err(e) = subscription.handle.dispose() {
				error!(filter = %subscription.filter.id(), error = %e, "failed to dispose filter subscription");
				failures.push(subscription.filter.id().to_string());
			}
		}
		if failures.is_empty() {
			Ok(())
		} else {
			Err(RegistryError::Other(anyhow::anyhow!(
				"failed to dispose filters: {}",
				failures.join(", ")
			)))
		}
	}

	async fn open(
		&self,
		filter: &ContractEventFilter,
		start_block: u64,
	) -> Result<SubscriptionHandle, RegistryError> {
		let metadata = Some(HashMap::from([
			("node".to_string(), filter.node.clone()),
			("filter_id".to_string(), filter.id().to_string()),
		]));
		let gateway = self.gateways.require(&filter.node).await.map_err(|e| {
			RegistryError::registration_error("No gateway for node", Some(Box::new(e)), metadata.clone())
		})?;
		gateway
			.register_log_subscription(filter, start_block, self.listener.clone())
			.await
			.map_err(|e| {
				RegistryError::registration_error(
					"Failed to open log subscription",
					Some(Box::new(e)),
					metadata,
				)
			})
	}

	async fn find(&self, id: &str) -> Option<FilterSubscription> {
		self.subscriptions
			.read()
			.await
			.values()
			.find_map(|subscriptions| subscriptions.get(id).cloned())
	}

	async fn node_snapshot(&self, node: &str) -> Option<NodeSubscriptions> {
		self.subscriptions.read().await.get(node).cloned()
	}

	/// Copy-on-write update of one node's map
	async fn update_node<F>(&self, node: &str, update: F)
	where
		F: FnOnce(&mut HashMap<String, FilterSubscription>),
	{
		let mut subscriptions = self.subscriptions.write().await;
		let mut next = subscriptions
			.get(node)
			.map(|current| current.as_ref().clone())
			.unwrap_or_default();
		update(&mut next);
		FILTERS_REGISTERED
			.with_label_values(&[node])
			.set(next.len() as f64);
		if next.is_empty() {
			subscriptions.remove(node);
		} else {
			subscriptions.insert(node.to_string(), Arc::new(next));
		}
	}

	fn retry_config(&self, node: &str) -> FixedRetryConfig {
		self.nodes
			.get(node)
			.map(|node| node.filter_registration_retry)
			.unwrap_or_default()
	}
}

/// The registry operations the health controller drives
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
	async fn resubscribe_all(&self, node: &str);

	async fn unsubscribe_all(&self, node: &str);

	async fn is_fully_subscribed(&self, node: &str) -> bool;
}

#[async_trait]
impl SubscriptionRegistry for FilterSubscriptionRegistry {
	async fn resubscribe_all(&self, node: &str) {
		FilterSubscriptionRegistry::resubscribe_all(self, node).await
	}

	async fn unsubscribe_all(&self, node: &str) {
		FilterSubscriptionRegistry::unsubscribe_all(self, node).await
	}

	async fn is_fully_subscribed(&self, node: &str) -> bool {
		FilterSubscriptionRegistry::is_fully_subscribed(self, node).await
	}
}
