use std::{collections::HashMap, sync::atomic::Ordering, sync::Arc};

use block_confirmation_monitor::{
	models::ContractEventFilter,
	services::{
		gateway::{Disposable, GatewayPool},
		subscription::{
			EventBlockManagementService, FilterSubscriptionRegistry, InMemoryEventStore,
			RegistryError,
		},
	},
	utils::tests::builders::{filter::FilterBuilder, node::NodeBuilder},
};

use crate::integration::mocks::{
	MockFilterRepository, RecordingBroadcaster, RecordingEventListener, StubGateway,
};

const NODE: &str = "test_node";
const HEAD: u64 = 1_000;

struct Setup {
	gateway: Arc<StubGateway>,
	broadcaster: Arc<RecordingBroadcaster>,
	registry: FilterSubscriptionRegistry,
}

async fn setup(repository: MockFilterRepository) -> Setup {
	let gateway = Arc::new(StubGateway::new(NODE, HEAD));
	let pool = GatewayPool::new();
	pool.insert(gateway.clone()).await;
	let nodes = HashMap::from([(NODE.to_string(), NodeBuilder::new().build())]);
	let block_management = Arc::new(EventBlockManagementService::new(
		Arc::new(InMemoryEventStore::new()),
		pool.clone(),
		nodes.clone(),
	));
	let broadcaster = Arc::new(RecordingBroadcaster::default());
	let registry = FilterSubscriptionRegistry::new(
		pool,
		nodes,
		block_management,
		Arc::new(repository),
		broadcaster.clone(),
		Arc::new(RecordingEventListener::default()),
	);
	Setup {
		gateway,
		broadcaster,
		registry,
	}
}

fn saving_repository(times: usize) -> MockFilterRepository {
	let mut repository = MockFilterRepository::new();
	repository.expect_save().times(times).returning(|_| Ok(()));
	repository
}

fn filter(id: &str) -> ContractEventFilter {
	FilterBuilder::new().id(id).start_block(500).build()
}

#[tokio::test]
async fn test_register_assigns_id_and_opens_subscription() {
	let s = setup(saving_repository(1)).await;
	let registered = s
		.registry
		.register(FilterBuilder::new().build(), true)
		.await
		.unwrap()
		.unwrap();

	let id = registered.id.clone().unwrap();
	assert!(!id.is_empty());
	assert_eq!(s.registry.list().await, vec![registered]);

	let handles = s.gateway.handles();
	assert_eq!(handles.len(), 1);
	assert_eq!(handles[0].filter_id, id);
	// nothing seen or stored for the event yet, so the current block
	assert_eq!(handles[0].start_block, HEAD);
	assert_eq!(*s.broadcaster.filters_added.lock().unwrap(), vec![id]);
	assert!(s.registry.is_fully_subscribed(NODE).await);
}

#[tokio::test]
async fn test_register_known_id_returns_existing() {
	let s = setup(saving_repository(1)).await;
	s.registry.register(filter("a"), false).await.unwrap();

	let mut again = filter("a");
	again.start_block = Some(1);
	let existing = s.registry.register(again, false).await.unwrap().unwrap();

	assert_eq!(existing.start_block, Some(500));
	assert_eq!(s.gateway.handles().len(), 1);
	assert!(s.broadcaster.filters_added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_unknown_node_is_ignored() {
	let s = setup(MockFilterRepository::new()).await;
	let result = s
		.registry
		.register(FilterBuilder::new().node("elsewhere").build(), true)
		.await
		.unwrap();

	assert!(result.is_none());
	assert!(s.registry.list().await.is_empty());
	assert!(s.gateway.handles().is_empty());
}

#[tokio::test]
async fn test_unregister_twice() {
	let mut repository = saving_repository(1);
	repository
		.expect_delete_by_id()
		.times(1)
		.returning(|_| Ok(()));
	let s = setup(repository).await;
	s.registry.register(filter("a"), false).await.unwrap();

	let removed = s.registry.unregister("a", true).await.unwrap();
	assert_eq!(removed.id(), "a");
	assert!(matches!(
		s.registry.unregister("a", true).await,
		Err(RegistryError::NotFound(_))
	));

	let handles = s.gateway.handles();
	assert_eq!(handles[0].dispose_calls.load(Ordering::SeqCst), 1);
	assert!(s.registry.list().await.is_empty());
	assert_eq!(
		*s.broadcaster.filters_removed.lock().unwrap(),
		vec!["a".to_string()]
	);
}

#[tokio::test]
async fn test_resubscribe_keeps_filters() {
	let s = setup(saving_repository(2)).await;
	s.registry.register(filter("a"), false).await.unwrap();
	s.registry.register(filter("b"), false).await.unwrap();
	let before = s.registry.list().await;

	s.registry.resubscribe_all(NODE).await;

	assert_eq!(s.registry.list().await, before);
	let handles = s.gateway.handles();
	assert_eq!(handles.len(), 4);
	assert!(handles[..2].iter().all(|h| h.dispose_calls.load(Ordering::SeqCst) == 1));
	assert!(handles[2..].iter().all(|h| h.dispose_calls.load(Ordering::SeqCst) == 0));
	// never earlier than the filter's own start block, never before the managed block
	assert!(handles[2..].iter().all(|h| h.start_block == HEAD));
	assert!(s.registry.is_fully_subscribed(NODE).await);
}

#[tokio::test]
async fn test_failed_resubscribe_is_not_fully_subscribed() {
	let s = setup(saving_repository(1)).await;
	s.registry.register(filter("a"), false).await.unwrap();
	let before = s.registry.list().await;

	s.gateway.reject_subscriptions.store(true, Ordering::SeqCst);
	s.registry.resubscribe_all(NODE).await;
	assert!(!s.registry.is_fully_subscribed(NODE).await);
	assert_eq!(s.registry.list().await, before);

	s.gateway.reject_subscriptions.store(false, Ordering::SeqCst);
	s.registry.resubscribe_all(NODE).await;
	assert!(s.registry.is_fully_subscribed(NODE).await);
	assert_eq!(s.registry.list().await, before);
}

#[tokio::test]
async fn test_unsubscribe_all_keeps_registrations() {
	let s = setup(saving_repository(2)).await;
	s.registry.register(filter("a"), false).await.unwrap();
	s.registry.register(filter("b"), false).await.unwrap();

	s.registry.unsubscribe_all(NODE).await;

	assert!(s.gateway.handles().iter().all(|h| h.dispose_calls.load(Ordering::SeqCst) == 1));
	assert!(!s.registry.is_fully_subscribed(NODE).await);
	assert_eq!(s.registry.list().await.len(), 2);
}

#[tokio::test]
async fn test_init_registers_persisted_and_configured_filters() {
	let mut repository = saving_repository(2);
	repository
		.expect_find_all()
		.times(1)
		.returning(|| Ok(vec![filter("persisted")]));
	let s = setup(repository).await;

	let registered = s
		.registry
		.init(vec![filter("persisted"), filter("configured")])
		.await
		.unwrap();

	assert_eq!(registered, 2);
	let ids: Vec<String> = s
		.registry
		.list()
		.await
		.iter()
		.map(|f| f.id().to_string())
		.collect();
	assert_eq!(ids, vec!["configured".to_string(), "persisted".to_string()]);
	assert!(s.broadcaster.filters_added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_with_retry_gives_up() {
	let s = setup(MockFilterRepository::new()).await;
	s.gateway.reject_subscriptions.store(true, Ordering::SeqCst);

	let result = s.registry.register_with_retry(filter("a"), false).await;
	assert!(matches!(result, Err(RegistryError::RegistrationError(_))));
	assert!(s.registry.list().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_disposes_every_subscription() {
	let s = setup(saving_repository(2)).await;
	s.registry.register(filter("a"), false).await.unwrap();
	s.registry.register(filter("b"), false).await.unwrap();

	s.registry.shutdown().await.unwrap();
	assert!(s.gateway.handles().iter().all(|h| h.dispose_calls.load(Ordering::SeqCst) == 1));
}

#[tokio::test]
async fn test_subscriptions_are_listed_per_node() {
	let s = setup(saving_repository(2)).await;
	s.registry.register(filter("a"), false).await.unwrap();
	s.registry.register(filter("b"), false).await.unwrap();

	let mut subscriptions = s.registry.subscriptions(NODE).await;
	subscriptions.sort_by(|x, y| x.filter.id().cmp(y.filter.id()));
	let ids: Vec<&str> = subscriptions.iter().map(|sub| sub.filter.id()).collect();
	assert_eq!(ids, vec!["a", "b"]);
	assert!(s.registry.subscriptions("elsewhere").await.is_empty());

	// a copy taken earlier shares the handles the registry closes
	s.registry.unsubscribe_all(NODE).await;
	assert!(subscriptions.iter().all(|sub| sub.handle.is_disposed()));
	assert!(!s.registry.is_fully_subscribed(NODE).await);
}
