use std::{sync::Arc, time::Duration};

use block_confirmation_monitor::{
	models::BlockStrategy,
	services::{
		blockwatcher::{
			create_block_strategy, BlockDispatcher, BlockStorage, BlockSubscriptionStrategy,
			BlockTracker,
		},
		gateway::{BlockListener, BlockListeners, ChainGateway, EvmGateway},
	},
	utils::tests::builders::{
		block::{fork_hash_for, hash_for, BlockBuilder},
		node::NodeBuilder,
	},
};

use crate::integration::mocks::{
	wait_until, FakeChain, InMemoryBlockStorage, RecordingBlockListener,
};

const NODE: &str = "test_node";
const TIMEOUT: Duration = Duration::from_secs(5);

struct Pipeline {
	chain: Arc<FakeChain>,
	storage: Arc<InMemoryBlockStorage>,
	recorder: Arc<RecordingBlockListener>,
	strategy: Arc<dyn BlockSubscriptionStrategy>,
}

async fn pipeline(strategy: BlockStrategy, head: u64, storage: InMemoryBlockStorage) -> Pipeline {
	let node = NodeBuilder::new().block_strategy(strategy).build();
	let chain = Arc::new(FakeChain::with_head(NODE, head));
	let storage = Arc::new(storage);
	let recorder = Arc::new(RecordingBlockListener::default());

	let listeners = BlockListeners::new();
	let dispatcher = Arc::new(BlockDispatcher::new(
		NODE,
		listeners.clone(),
		storage.clone() as Arc<dyn BlockStorage>,
	));
	let tracker = BlockTracker::new(100, Some(storage.clone() as Arc<dyn BlockStorage>));
	let strategy = create_block_strategy(
		&node,
		chain.clone(),
		dispatcher,
		storage.clone(),
		tracker,
	);

	let recorder_listener: Arc<dyn BlockListener> = recorder.clone();
	listeners.add(recorder_listener).await;

	Pipeline {
		chain,
		storage,
		recorder,
		strategy,
	}
}

fn is_gap_free(numbers: &[u64]) -> bool {
	numbers.windows(2).all(|pair| pair[1] == pair[0] + 1)
}

#[tokio::test]
async fn test_polling_replays_checkpoint_then_follows_chain() {
	let p = pipeline(
		BlockStrategy::Polling,
		10,
		InMemoryBlockStorage::with_checkpoint(NODE, 5),
	)
	.await;
	p.strategy.subscribe().await.unwrap();
	assert!(p.strategy.is_subscribed());

	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&10)).await);
	assert_eq!(p.recorder.numbers(), (6..=10).collect::<Vec<_>>());

	p.chain.extend_to(15);
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&15)).await);
	assert_eq!(p.recorder.numbers(), (6..=15).collect::<Vec<_>>());
	assert!(wait_until(TIMEOUT, || p.storage.checkpoint(NODE) == Some(15)).await);

	p.strategy.unsubscribe().await.unwrap();
	assert!(!p.strategy.is_subscribed());
}

#[tokio::test]
async fn test_live_head_fills_gaps_between_heads() {
	let p = pipeline(
		BlockStrategy::LiveHead,
		20,
		InMemoryBlockStorage::with_checkpoint(NODE, 18),
	)
	.await;
	p.strategy.subscribe().await.unwrap();
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&20)).await);

	// the head jumps by several blocks at once
	p.chain.extend_to(27);
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&27)).await);

	let numbers = p.recorder.numbers();
	assert_eq!(numbers.first(), Some(&19));
	assert!(is_gap_free(&numbers), "blocks out of order: {:?}", numbers);
	assert!(p.storage.missed().is_empty());

	p.strategy.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_without_checkpoint_starts_at_head() {
	let p = pipeline(BlockStrategy::Polling, 42, InMemoryBlockStorage::default()).await;
	p.strategy.subscribe().await.unwrap();

	assert!(wait_until(TIMEOUT, || !p.recorder.numbers().is_empty()).await);
	assert_eq!(p.recorder.numbers()[0], 42);

	p.strategy.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_replay_is_capped_by_max_unsynced_blocks() {
	let node = NodeBuilder::new()
		.block_strategy(BlockStrategy::Polling)
		.max_unsynced_blocks(5)
		.build();
	let chain = Arc::new(FakeChain::with_head(NODE, 100));
	let storage = Arc::new(InMemoryBlockStorage::with_checkpoint(NODE, 10));
	let recorder = Arc::new(RecordingBlockListener::default());
	let listeners = BlockListeners::new();
	listeners.add(recorder.clone()).await;

	let dispatcher = Arc::new(BlockDispatcher::new(NODE, listeners, storage.clone()));
	let strategy = create_block_strategy(
		&node,
		chain,
		dispatcher,
		storage.clone(),
		BlockTracker::new(100, None),
	);
	strategy.subscribe().await.unwrap();

	assert!(wait_until(TIMEOUT, || recorder.numbers().last() == Some(&100)).await);
	assert_eq!(recorder.numbers(), (95..=100).collect::<Vec<_>>());
	strategy.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_twice_is_a_noop() {
	let p = pipeline(
		BlockStrategy::Polling,
		3,
		InMemoryBlockStorage::with_checkpoint(NODE, 0),
	)
	.await;
	p.strategy.subscribe().await.unwrap();
	p.strategy.subscribe().await.unwrap();

	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&3)).await);
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(p.recorder.numbers(), vec![1, 2, 3]);

	p.strategy.unsubscribe().await.unwrap();
	p.strategy.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_gateway_connect_opens_block_stream() {
	let node = NodeBuilder::new().block_strategy(BlockStrategy::Polling).build();
	let chain = Arc::new(FakeChain::with_head(NODE, 7));
	let storage = Arc::new(InMemoryBlockStorage::with_checkpoint(NODE, 4));
	let gateway = EvmGateway::new(node.clone(), chain.clone());
	let recorder = Arc::new(RecordingBlockListener::default());
	gateway.add_block_listener(recorder.clone()).await;

	let dispatcher = Arc::new(BlockDispatcher::new(NODE, gateway.listeners(), storage.clone()));
	let strategy = create_block_strategy(
		&node,
		chain.clone(),
		dispatcher,
		storage.clone(),
		BlockTracker::new(100, None),
	);
	gateway.attach_block_strategy(strategy.clone());
	assert!(!gateway.is_connected());

	gateway.connect().await.unwrap();
	assert!(gateway.is_connected());
	assert!(wait_until(TIMEOUT, || recorder.numbers().last() == Some(&7)).await);
	assert_eq!(recorder.numbers(), vec![5, 6, 7]);

	gateway.disconnect().await.unwrap();
	assert!(!gateway.is_connected());
	assert!(!strategy.is_subscribed());

	// a reconnect resumes after the last delivered block
	chain.extend_to(9);
	gateway.connect().await.unwrap();
	assert!(wait_until(TIMEOUT, || recorder.numbers().last() == Some(&9)).await);
	assert_eq!(recorder.numbers(), vec![5, 6, 7, 8, 9]);
	gateway.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_fork_block_at_same_number_is_not_redelivered() {
	let p = pipeline(
		BlockStrategy::LiveHead,
		5,
		InMemoryBlockStorage::with_checkpoint(NODE, 3),
	)
	.await;
	p.strategy.subscribe().await.unwrap();
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&5)).await);

	p.chain.push_block(
		BlockBuilder::new(5)
			.node(NODE)
			.hash(fork_hash_for(5))
			.build(),
	);
	p.chain.extend_to(6);
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&6)).await);
	assert_eq!(p.recorder.numbers(), vec![4, 5, 6]);

	p.strategy.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_unresolvable_head_is_filled_by_next_head() {
	let p = pipeline(
		BlockStrategy::LiveHead,
		20,
		InMemoryBlockStorage::with_checkpoint(NODE, 19),
	)
	.await;
	p.strategy.subscribe().await.unwrap();
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&20)).await);

	// head 21 never resolves by hash and is skipped
	p.chain.withhold_block(hash_for(21));
	p.chain.extend_to(21);
	assert!(wait_until(TIMEOUT, || p.chain.withheld_lookups() >= 6).await);
	assert_eq!(p.recorder.numbers(), vec![20]);
	assert!(p.strategy.is_subscribed());

	// the next head shows the gap and 21 is fetched by number
	p.chain.extend_to(22);
	assert!(wait_until(TIMEOUT, || p.recorder.numbers().last() == Some(&22)).await);
	assert_eq!(p.recorder.numbers(), vec![20, 21, 22]);
	assert!(p.storage.missed().is_empty());

	p.strategy.unsubscribe().await.unwrap();
}
