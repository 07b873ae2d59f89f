//! Assembles the engine from configuration.
//!
//! - Loads the node configuration and builds one gateway per node
//! - Wires each node's block pipeline (dispatcher, tracker, subscription strategy)
//! - Attaches the block broadcaster and the transaction monitor as block listeners
//! - Registers persisted and configured filters
//! - Starts one health job per node
//!
//! [`Engine::shutdown`] stops everything again, carrying on past individual failures.

use std::{collections::HashMap, error::Error, path::PathBuf, sync::Arc};
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info, warn};

use crate::{
	models::Node,
	repositories::{
		load_configured_filters, FileFilterRepository, FilterRepository, NodeRepositoryTrait,
		NodeService,
	},
	services::{
		blockwatcher::{
			create_block_strategy, BlockDispatcher, BlockStorage, BlockSubscriptionStrategy,
			BlockTracker, FileBlockStorage,
		},
		broadcast::{
			BlockBroadcastListener, BlockchainEventBroadcaster, LoggingBroadcaster,
			WebhookBroadcaster, WebhookConfig,
		},
		confirmation::{ConfirmationCheckInitialiser, TransactionMonitoringBlockListener},
		gateway::{BlockListener, ChainGateway, ContractEventListener, EvmClient, EvmGateway, GatewayPool},
		health::{
			HealthWatcherService, NodeHealthCheckService, ResubscribingReconnectionStrategy,
		},
		subscription::{
			EventBlockManagementService, EventRecordingListener, EventStore,
			FanOutEventListener, FilterSubscriptionRegistry, InMemoryEventStore,
		},
	},
	utils::{create_retryable_http_client, RetryConfig},
};

/// Type alias for handling ServiceResult
pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

const BLOCK_TRACKER_HISTORY: usize = 1000;

/// Where the engine reads its configuration and keeps its state
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
	/// Node configurations, `config/nodes` when unset
	pub nodes_path: Option<PathBuf>,
	/// Static filters, `config/filters` when unset
	pub filters_path: Option<PathBuf>,
	/// Checkpoints and persisted filters, `data` when unset
	pub data_dir: Option<PathBuf>,
}

impl EngineConfig {
	fn data_dir(&self) -> PathBuf {
		self.data_dir.clone().unwrap_or_else(|| PathBuf::from("data"))
	}
}

/// The running engine
pub struct Engine {
	pub nodes: HashMap<String, Node>,
	pub gateways: GatewayPool,
	pub registry: Arc<FilterSubscriptionRegistry>,
	pub transaction_monitor: Arc<TransactionMonitoringBlockListener>,
	pub broadcaster: Arc<dyn BlockchainEventBroadcaster>,
	pub block_storage: Arc<dyn BlockStorage>,
	pub health: HealthWatcherService<JobScheduler>,
	strategies: HashMap<String, Arc<dyn BlockSubscriptionStrategy>>,
}

/// Loads and validates the node configuration
pub async fn initialize_services<N>(
	node_service: Option<NodeService<N>>,
	config: &EngineConfig,
) -> Result<HashMap<String, Node>>
where
	N: NodeRepositoryTrait + Send + Sync + 'static,
{
	let node_service = match node_service {
		Some(service) => service,
		None => {
			let repository = N::new(config.nodes_path.as_deref()).await?;
			NodeService::<N>::new_with_repository(repository)?
		}
	};
	Ok(node_service.get_all())
}

/// Webhook broadcaster when `BROADCAST_WEBHOOK_URL` is set, log output otherwise
pub fn create_broadcaster() -> Result<Arc<dyn BlockchainEventBroadcaster>> {
	match WebhookConfig::from_env()? {
		Some(config) => {
			info!(url = %config.url, "broadcasting to webhook");
			let client = create_retryable_http_client::<reqwest_retry::DefaultRetryableStrategy>(
				&RetryConfig::default(),
				reqwest::Client::new(),
				None,
			);
			Ok(Arc::new(WebhookBroadcaster::new(config, Arc::new(client))))
		}
		None => {
			info!("no webhook configured, broadcasting to the log");
			Ok(Arc::new(LoggingBroadcaster))
		}
	}
}

/// Builds the gateway of `node` and wires its block pipeline
pub async fn create_gateway(
	node: &Node,
	block_storage: Arc<dyn BlockStorage>,
) -> Result<(Arc<EvmGateway>, Arc<dyn BlockSubscriptionStrategy>)> {
	let client = Arc::new(EvmClient::new(node, &RetryConfig::default()).await?);
	let gateway = Arc::new(EvmGateway::new(node.clone(), client.clone()));

	let dispatcher = Arc::new(BlockDispatcher::new(
		node.name.clone(),
		gateway.listeners(),
		block_storage.clone(),
	));
	let tracker = BlockTracker::new(BLOCK_TRACKER_HISTORY, Some(block_storage.clone()));
	let strategy = create_block_strategy(node, client, dispatcher, block_storage, tracker);
	gateway.attach_block_strategy(strategy.clone());
	Ok((gateway, strategy))
}

/// Starts the engine: gateways, pipelines, listeners, filters and health jobs.
///
/// A node whose gateway cannot be built or connected is logged and left to the health
/// controller; it does not prevent the other nodes from starting.
pub async fn start_engine(
	nodes: HashMap<String, Node>,
	config: &EngineConfig,
	broadcaster: Arc<dyn BlockchainEventBroadcaster>,
) -> Result<Engine> {
	let data_dir = config.data_dir();
	let block_storage: Arc<dyn BlockStorage> = Arc::new(FileBlockStorage::new(data_dir.clone()));
	let filter_repository: Arc<dyn FilterRepository> =
		Arc::new(FileFilterRepository::new(data_dir.join("filters")));
	let gateways = GatewayPool::new();

	let mut strategies = HashMap::new();
	for node in nodes.values() {
		match create_gateway(node, block_storage.clone()).await {
			Ok((gateway, strategy)) => {
				gateways.insert(gateway).await;
				strategies.insert(node.name.clone(), strategy);
			}
			Err(e) => error!(node = %node.name, error = %e, "failed to create gateway"),
		}
	}

	let transaction_monitor =
		TransactionMonitoringBlockListener::new(gateways.clone(), nodes.clone(), broadcaster.clone());
	let block_broadcaster: Arc<dyn BlockListener> =
		Arc::new(BlockBroadcastListener::new(broadcaster.clone()));
	for gateway in gateways.gateways().await {
		gateway.add_block_listener(block_broadcaster.clone()).await;
		gateway
			.add_block_listener(transaction_monitor.clone())
			.await;
	}

	let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
	let block_management = Arc::new(EventBlockManagementService::new(
		event_store.clone(),
		gateways.clone(),
		nodes.clone(),
	));
	let event_listener: Arc<dyn ContractEventListener> = Arc::new(FanOutEventListener::new(vec![
		Arc::new(EventRecordingListener::new(
			event_store,
			block_management.clone(),
		)),
		Arc::new(ConfirmationCheckInitialiser::new(
			gateways.clone(),
			nodes.clone(),
			broadcaster.clone(),
		)),
	]));
	let registry = Arc::new(FilterSubscriptionRegistry::new(
		gateways.clone(),
		nodes.clone(),
		block_management,
		filter_repository,
		broadcaster.clone(),
		event_listener,
	));

	for gateway in gateways.gateways().await {
		if let Err(e) = gateway.connect().await {
			warn!(node = %gateway.node_name(), error = %e, "node not reachable at start-up");
		}
	}

	let configured = load_configured_filters(config.filters_path.as_deref()).await?;
	let registered = registry.init(configured).await?;
	info!(filters = registered, "filters registered");

	let health = HealthWatcherService::<JobScheduler>::new();
	for gateway in gateways.gateways().await {
		let Some(node) = nodes.get(gateway.node_name()) else {
			continue;
		};
		let reconnection = Arc::new(ResubscribingReconnectionStrategy::new(
			gateway.clone(),
			registry.clone(),
		));
		let checker = Arc::new(NodeHealthCheckService::new(
			node.clone(),
			gateway,
			registry.clone(),
			block_storage.clone(),
			reconnection,
		));
		if let Err(e) = health.start_node_watcher(checker).await {
			error!(node = %node.name, error = %e, "failed to start health checks");
		}
	}

	Ok(Engine {
		nodes,
		gateways,
		registry,
		transaction_monitor,
		broadcaster,
		block_storage,
		health,
		strategies,
	})
}

impl Engine {
	pub fn strategy(&self, node: &str) -> Option<Arc<dyn BlockSubscriptionStrategy>> {
		self.strategies.get(node).cloned()
	}

	/// Stops health jobs, block pipelines and filter subscriptions
	pub async fn shutdown(&self) {
		for e in self.health.stop_all().await {
			error!(error = %e, "failed to stop health checks");
		}
		for gateway in self.gateways.gateways().await {
			if let Err(e) = gateway.disconnect().await {
				error!(node = %gateway.node_name(), error = %e, "failed to disconnect");
			}
		}
		if let Err(e) = self.registry.shutdown().await {
			error!(error = %e, "failed to dispose some filter subscriptions");
		}
		info!("engine stopped");
	}
}
