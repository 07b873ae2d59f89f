//! Service mocks.
//!
//! - [`MockBlockchainEventBroadcaster`], [`MockReconnectionStrategy`] and
//!   [`MockSubscriptionRegistry`]: mockall mocks
//! - [`RecordingBroadcaster`]: keeps every broadcast message
//! - [`StubGateway`]: gateway whose reachability and subscriptions tests control
//! - [`RecordingBlockListener`] / [`RecordingEventListener`]: collect what they receive

use std::sync::{
	atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
	Arc, Mutex,
};

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use block_confirmation_monitor::{
	models::{
		Block, BlockDetails, ContractEventDetails, ContractEventFilter, ContractEventStatus,
		TransactionDetails, TransactionReceipt, TransactionStatus,
	},
	services::{
		broadcast::{BlockchainEventBroadcaster, BroadcastError},
		gateway::{
			BlockListener, BlockListeners, ChainGateway, ContractEventListener, Disposable,
			GatewayError, SubscriptionHandle,
		},
		health::{HealthCheckError, ReconnectionStrategy},
		subscription::SubscriptionRegistry,
	},
};
use mockall::mock;

mock! {
	pub BlockchainEventBroadcaster {}

	#[async_trait]
	impl BlockchainEventBroadcaster for BlockchainEventBroadcaster {
		async fn broadcast_block(&self, details: &BlockDetails) -> Result<(), BroadcastError>;
		async fn broadcast_contract_event(&self, details: &ContractEventDetails) -> Result<(), BroadcastError>;
		async fn broadcast_transaction(&self, details: &TransactionDetails) -> Result<(), BroadcastError>;
		async fn broadcast_filter_added(&self, filter: &ContractEventFilter) -> Result<(), BroadcastError>;
		async fn broadcast_filter_removed(&self, filter: &ContractEventFilter) -> Result<(), BroadcastError>;
	}
}

mock! {
	pub ReconnectionStrategy {}

	#[async_trait]
	impl ReconnectionStrategy for ReconnectionStrategy {
		async fn reconnect(&self) -> Result<(), HealthCheckError>;
		async fn resubscribe(&self) -> Result<(), HealthCheckError>;
	}
}

mock! {
	pub SubscriptionRegistry {}

	#[async_trait]
	impl SubscriptionRegistry for SubscriptionRegistry {
		async fn resubscribe_all(&self, node: &str);
		async fn unsubscribe_all(&self, node: &str);
		async fn is_fully_subscribed(&self, node: &str) -> bool;
	}
}

/// Broadcaster keeping every message in memory
#[derive(Default)]
pub struct RecordingBroadcaster {
	pub blocks: Mutex<Vec<BlockDetails>>,
	pub events: Mutex<Vec<ContractEventDetails>>,
	pub transactions: Mutex<Vec<TransactionDetails>>,
	pub filters_added: Mutex<Vec<String>>,
	pub filters_removed: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingBroadcaster {
	pub fn event_statuses(&self) -> Vec<ContractEventStatus> {
		self.events.lock().unwrap().iter().map(|e| e.status).collect()
	}

	pub fn transaction_statuses(&self) -> Vec<TransactionStatus> {
		self.transactions
			.lock()
			.unwrap()
			.iter()
			.map(|t| t.status)
			.collect()
	}
}

#[async_trait]
impl BlockchainEventBroadcaster for RecordingBroadcaster {
	async fn broadcast_block(&self, details: &BlockDetails) -> Result<(), BroadcastError> {
		self.blocks.lock().unwrap().push(details.clone());
		Ok(())
	}

	async fn broadcast_contract_event(
		&self,
		details: &ContractEventDetails,
	) -> Result<(), BroadcastError> {
		self.events.lock().unwrap().push(details.clone());
		Ok(())
	}

	async fn broadcast_transaction(
		&self,
		details: &TransactionDetails,
	) -> Result<(), BroadcastError> {
		self.transactions.lock().unwrap().push(details.clone());
		Ok(())
	}

	async fn broadcast_filter_added(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError> {
		self.filters_added
			.lock()
			.unwrap()
			.push(filter.id().to_string());
		Ok(())
	}

	async fn broadcast_filter_removed(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError> {
		self.filters_removed
			.lock()
			.unwrap()
			.push(filter.id().to_string());
		Ok(())
	}
}

/// Subscription handle counting how often it was disposed
#[derive(Default)]
pub struct CountingHandle {
	pub filter_id: String,
	pub start_block: u64,
	pub dispose_calls: AtomicUsize,
	disposed: AtomicBool,
}

impl Disposable for CountingHandle {
	fn dispose(&self) -> Result<(), GatewayError> {
		self.dispose_calls.fetch_add(1, Ordering::SeqCst);
		self.disposed.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}
}

/// Gateway whose reachability, head and subscription outcome are set by the test
pub struct StubGateway {
	name: String,
	pub reachable: AtomicBool,
	pub connected: AtomicBool,
	pub head: AtomicU64,
	pub reject_subscriptions: AtomicBool,
	pub connects: AtomicUsize,
	pub disconnects: AtomicUsize,
	pub handles: Mutex<Vec<Arc<CountingHandle>>>,
	pub listeners: BlockListeners,
}

#[allow(dead_code)]
impl StubGateway {
	pub fn new(name: &str, head: u64) -> Self {
		Self {
			name: name.to_string(),
			reachable: AtomicBool::new(true),
			connected: AtomicBool::new(true),
			head: AtomicU64::new(head),
			reject_subscriptions: AtomicBool::new(false),
			connects: AtomicUsize::new(0),
			disconnects: AtomicUsize::new(0),
			handles: Mutex::new(Vec::new()),
			listeners: BlockListeners::new(),
		}
	}

	pub fn set_reachable(&self, reachable: bool) {
		self.reachable.store(reachable, Ordering::SeqCst);
	}

	pub fn handles(&self) -> Vec<Arc<CountingHandle>> {
		self.handles.lock().unwrap().clone()
	}

	fn unreachable(&self) -> GatewayError {
		GatewayError::transport_error(format!("{} unreachable", self.name), None, None)
	}
}

#[async_trait]
impl ChainGateway for StubGateway {
	fn node_name(&self) -> &str {
		&self.name
	}

	async fn connect(&self) -> Result<(), GatewayError> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		if !self.reachable.load(Ordering::SeqCst) {
			return Err(self.unreachable());
		}
		self.connected.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn disconnect(&self) -> Result<(), GatewayError> {
		self.disconnects.fetch_add(1, Ordering::SeqCst);
		self.connected.store(false, Ordering::SeqCst);
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}

	async fn current_block_number(&self) -> Result<u64, GatewayError> {
		if !self.reachable.load(Ordering::SeqCst) {
			return Err(self.unreachable());
		}
		Ok(self.head.load(Ordering::SeqCst))
	}

	async fn block_by_hash(&self, _hash: B256) -> Result<Option<Block>, GatewayError> {
		Ok(None)
	}

	async fn transaction_receipt(
		&self,
		_hash: B256,
	) -> Result<Option<TransactionReceipt>, GatewayError> {
		Ok(None)
	}

	async fn revert_reason(
		&self,
		_from: Address,
		_to: Option<Address>,
		_block_number: u64,
		_input: Bytes,
	) -> Result<Option<String>, GatewayError> {
		Ok(None)
	}

	async fn register_log_subscription(
		&self,
		filter: &ContractEventFilter,
		start_block: u64,
		_listener: Arc<dyn ContractEventListener>,
	) -> Result<SubscriptionHandle, GatewayError> {
		if self.reject_subscriptions.load(Ordering::SeqCst) {
			return Err(GatewayError::subscription_error(
				format!("{} rejected log subscription", self.name),
				None,
				None,
			));
		}
		let handle = Arc::new(CountingHandle {
			filter_id: filter.id().to_string(),
			start_block,
			..Default::default()
		});
		self.handles.lock().unwrap().push(handle.clone());
		Ok(handle)
	}

	async fn add_block_listener(&self, listener: Arc<dyn BlockListener>) {
		self.listeners.add(listener).await;
	}

	async fn remove_block_listener(&self, listener: &Arc<dyn BlockListener>) {
		self.listeners.remove(listener).await;
	}
}

/// Block listener remembering the numbers it received
#[derive(Default)]
pub struct RecordingBlockListener {
	pub numbers: Mutex<Vec<u64>>,
}

#[allow(dead_code)]
impl RecordingBlockListener {
	pub fn numbers(&self) -> Vec<u64> {
		self.numbers.lock().unwrap().clone()
	}
}

#[async_trait]
impl BlockListener for RecordingBlockListener {
	async fn on_block(&self, block: &Block) -> Result<(), anyhow::Error> {
		self.numbers.lock().unwrap().push(block.number);
		Ok(())
	}
}

/// Contract event listener remembering what it received
#[derive(Default)]
pub struct RecordingEventListener {
	pub events: Mutex<Vec<ContractEventDetails>>,
}

#[allow(dead_code)]
impl RecordingEventListener {
	pub fn events(&self) -> Vec<ContractEventDetails> {
		self.events.lock().unwrap().clone()
	}
}

#[async_trait]
impl ContractEventListener for RecordingEventListener {
	async fn on_event(&self, details: ContractEventDetails) -> Result<(), anyhow::Error> {
		self.events.lock().unwrap().push(details);
		Ok(())
	}
}
