use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};

use alloy::primitives::{Address, B256};
use block_confirmation_monitor::{
	models::{
		Block, Node, TransactionIdentifier, TransactionMatchingCriterion, TransactionStatus,
	},
	services::{
		confirmation::TransactionMonitoringBlockListener,
		gateway::{BlockListener, EvmGateway, GatewayPool},
	},
	utils::tests::builders::{
		block::{fork_hash_for, BlockBuilder, ReceiptBuilder, TransactionBuilder},
		node::NodeBuilder,
	},
};

use crate::integration::mocks::{FakeChain, RecordingBroadcaster};

const NODE: &str = "test_node";
const TX_BLOCK: u64 = 50;

fn tx_hash() -> B256 {
	B256::repeat_byte(0x77)
}

fn sender() -> Address {
	Address::repeat_byte(0x0a)
}

fn block_with_tx(number: u64) -> Block {
	node_block_with_tx(NODE, number)
}

fn node_block_with_tx(node: &str, number: u64) -> Block {
	BlockBuilder::new(number)
		.node(node)
		.transaction(TransactionBuilder::new(tx_hash()).from(sender()).build())
		.build()
}

struct Setup {
	chain: Arc<FakeChain>,
	gateway: Arc<EvmGateway>,
	broadcaster: Arc<RecordingBroadcaster>,
	monitor: Arc<TransactionMonitoringBlockListener>,
}

async fn setup(node: Node) -> Setup {
	let chain = Arc::new(FakeChain::with_head(NODE, TX_BLOCK));
	chain.set_receipt(ReceiptBuilder::new(tx_hash(), TX_BLOCK).build());
	let gateway = Arc::new(EvmGateway::new(node.clone(), chain.clone()));
	let pool = GatewayPool::new();
	pool.insert(gateway.clone()).await;
	let broadcaster = Arc::new(RecordingBroadcaster::default());
	let monitor = TransactionMonitoringBlockListener::new(
		pool,
		HashMap::from([(NODE.to_string(), node)]),
		broadcaster.clone(),
	);
	Setup {
		chain,
		gateway,
		broadcaster,
		monitor,
	}
}

fn by_hash(statuses: Vec<TransactionStatus>) -> TransactionMatchingCriterion {
	TransactionMatchingCriterion::new(NODE, TransactionIdentifier::Hash(tx_hash()), statuses)
}

async fn deliver(gateway: &EvmGateway, number: u64) {
	let block = BlockBuilder::new(number).node(NODE).build();
	for listener in gateway.listeners().snapshot().await {
		listener.on_block(&block).await.unwrap();
	}
}

#[tokio::test]
async fn test_overlapping_criteria_broadcast_once() {
	let s = setup(NodeBuilder::new().confirmations(0).build()).await;
	s.monitor
		.add_matching_criterion(TransactionMatchingCriterion::new(
			NODE,
			TransactionIdentifier::FromAddress(sender()),
			vec![TransactionStatus::Confirmed],
		))
		.await
		.unwrap();
	s.monitor
		.add_matching_criterion(by_hash(vec![TransactionStatus::Confirmed]))
		.await
		.unwrap();

	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Confirmed]
	);

	// the same transaction in the same block is only observed once
	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();
	assert_eq!(s.broadcaster.transaction_statuses().len(), 1);
	assert_eq!(s.monitor.criteria(NODE).await.len(), 2);
}

#[tokio::test]
async fn test_failed_transaction_carries_revert_reason() {
	let s = setup(
		NodeBuilder::new()
			.confirmations(0)
			.revert_reason(true)
			.build(),
	)
	.await;
	s.chain
		.set_receipt(ReceiptBuilder::new(tx_hash(), TX_BLOCK).status(Some(0)).build());
	s.monitor
		.add_matching_criterion(by_hash(vec![TransactionStatus::Failed]))
		.await
		.unwrap();

	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();

	let transactions = s.broadcaster.transactions.lock().unwrap().clone();
	assert_eq!(transactions.len(), 1);
	assert_eq!(transactions[0].status, TransactionStatus::Failed);
	assert_eq!(
		transactions[0].revert_reason.as_deref(),
		Some("execution reverted: insufficient balance")
	);
	assert!(s.monitor.criteria(NODE).await.is_empty());
}

#[tokio::test]
async fn test_unwanted_status_is_not_broadcast() {
	let s = setup(NodeBuilder::new().confirmations(0).build()).await;
	s.monitor
		.add_matching_criterion(by_hash(vec![TransactionStatus::Failed]))
		.await
		.unwrap();

	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();
	assert!(s.broadcaster.transaction_statuses().is_empty());
	// the one-time criterion still reached its terminal outcome
	assert!(s.monitor.criteria(NODE).await.is_empty());
}

#[tokio::test]
async fn test_transaction_confirmed_after_depth() {
	let s = setup(NodeBuilder::new().confirmations(3).build()).await;
	s.monitor
		.add_matching_criterion(by_hash(vec![
			TransactionStatus::Unconfirmed,
			TransactionStatus::Confirmed,
		]))
		.await
		.unwrap();

	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Unconfirmed]
	);
	assert_eq!(s.gateway.listeners().len().await, 1);

	deliver(&s.gateway, 51).await;
	deliver(&s.gateway, 52).await;
	assert_eq!(s.broadcaster.transaction_statuses().len(), 1);

	deliver(&s.gateway, 53).await;
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Unconfirmed, TransactionStatus::Confirmed]
	);
	assert!(s.gateway.listeners().is_empty().await);

	let mut removed = false;
	for _ in 0..200 {
		if s.monitor.criteria(NODE).await.is_empty() {
			removed = true;
			break;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert!(removed, "one-time criterion was not removed after confirmation");
}

#[tokio::test]
async fn test_reorged_transaction_is_observed_again() {
	let s = setup(NodeBuilder::new().confirmations(3).build()).await;
	s.monitor
		.add_matching_criterion(by_hash(vec![
			TransactionStatus::Unconfirmed,
			TransactionStatus::Confirmed,
		]))
		.await
		.unwrap();
	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();

	// re-mined in a competing block 51
	s.chain.set_receipt(
		ReceiptBuilder::new(tx_hash(), 51)
			.block_hash(fork_hash_for(51))
			.build(),
	);
	deliver(&s.gateway, 51).await;
	deliver(&s.gateway, 52).await;
	deliver(&s.gateway, 53).await;
	assert!(s.gateway.listeners().is_empty().await);
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Unconfirmed]
	);
	assert_eq!(s.monitor.criteria(NODE).await.len(), 1);

	let fork_block = BlockBuilder::new(51)
		.node(NODE)
		.hash(fork_hash_for(51))
		.transaction(TransactionBuilder::new(tx_hash()).from(sender()).build())
		.build();
	s.monitor.on_block(&fork_block).await.unwrap();
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Unconfirmed, TransactionStatus::Unconfirmed]
	);
	let transactions = s.broadcaster.transactions.lock().unwrap().clone();
	assert_eq!(transactions[1].block_hash, fork_hash_for(51));
}

#[tokio::test]
async fn test_criterion_added_late_checks_cached_blocks() {
	let s = setup(NodeBuilder::new().confirmations(0).build()).await;
	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();
	assert!(s.broadcaster.transaction_statuses().is_empty());

	s.monitor
		.add_matching_criterion(by_hash(vec![TransactionStatus::Confirmed]))
		.await
		.unwrap();
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Confirmed]
	);
}

#[tokio::test]
async fn test_criterion_for_unknown_node_is_rejected() {
	let s = setup(NodeBuilder::new().build()).await;
	let criterion = TransactionMatchingCriterion::new(
		"unknown",
		TransactionIdentifier::Hash(tx_hash()),
		vec![TransactionStatus::Confirmed],
	);
	assert!(s.monitor.add_matching_criterion(criterion).await.is_err());
	assert!(s.monitor.criteria("unknown").await.is_empty());
}

#[tokio::test]
async fn test_remove_matching_criterion() {
	let s = setup(NodeBuilder::new().build()).await;
	let criterion = by_hash(vec![TransactionStatus::Confirmed]);
	let id = criterion.id.clone();
	s.monitor.add_matching_criterion(criterion).await.unwrap();

	assert!(s.monitor.remove_matching_criterion(NODE, &id).await);
	assert!(!s.monitor.remove_matching_criterion(NODE, &id).await);
	assert!(s.monitor.criteria(NODE).await.is_empty());
}

#[tokio::test]
async fn test_missing_receipt_gives_up_within_timeout() {
	let s = setup(
		NodeBuilder::new()
			.confirmations(0)
			.receipt_poll(1_000, 10, 100)
			.build(),
	)
	.await;
	s.chain.remove_receipt(tx_hash());
	s.monitor
		.add_matching_criterion(by_hash(vec![TransactionStatus::Confirmed]))
		.await
		.unwrap();

	let started = Instant::now();
	s.monitor.on_block(&block_with_tx(TX_BLOCK)).await.unwrap();
	assert!(started.elapsed() < Duration::from_secs(2));
	assert!(s.broadcaster.transaction_statuses().is_empty());
	assert_eq!(s.monitor.criteria(NODE).await.len(), 1);

	// the block is still cached, so a criterion added now sees the transaction again
	s.chain
		.set_receipt(ReceiptBuilder::new(tx_hash(), TX_BLOCK).build());
	s.monitor
		.add_matching_criterion(TransactionMatchingCriterion::new(
			NODE,
			TransactionIdentifier::FromAddress(sender()),
			vec![TransactionStatus::Confirmed],
		))
		.await
		.unwrap();
	assert_eq!(
		s.broadcaster.transaction_statuses(),
		vec![TransactionStatus::Confirmed]
	);
}

#[tokio::test]
async fn test_pending_receipt_does_not_hold_up_other_nodes() {
	let slow = NodeBuilder::new()
		.name("slow_node")
		.confirmations(0)
		.receipt_poll(50, 20, 5_000)
		.build();
	let fast = NodeBuilder::new()
		.name("fast_node")
		.confirmations(0)
		.build();

	// the slow node has mined nothing yet
	let slow_chain = Arc::new(FakeChain::with_head("slow_node", TX_BLOCK));
	let fast_chain = Arc::new(FakeChain::with_head("fast_node", TX_BLOCK));
	fast_chain.set_receipt(ReceiptBuilder::new(tx_hash(), TX_BLOCK).build());

	let pool = GatewayPool::new();
	pool.insert(Arc::new(EvmGateway::new(slow.clone(), slow_chain.clone())))
		.await;
	pool.insert(Arc::new(EvmGateway::new(fast.clone(), fast_chain)))
		.await;
	let broadcaster = Arc::new(RecordingBroadcaster::default());
	let monitor = TransactionMonitoringBlockListener::new(
		pool,
		HashMap::from([
			("slow_node".to_string(), slow),
			("fast_node".to_string(), fast),
		]),
		broadcaster.clone(),
	);
	for node in ["slow_node", "fast_node"] {
		monitor
			.add_matching_criterion(TransactionMatchingCriterion::new(
				node,
				TransactionIdentifier::Hash(tx_hash()),
				vec![TransactionStatus::Confirmed],
			))
			.await
			.unwrap();
	}

	let waiting = monitor.clone();
	let slow_block = node_block_with_tx("slow_node", TX_BLOCK);
	let pending = tokio::spawn(async move { waiting.on_block(&slow_block).await });
	tokio::time::sleep(Duration::from_millis(50)).await;

	let started = Instant::now();
	monitor
		.on_block(&node_block_with_tx("fast_node", TX_BLOCK))
		.await
		.unwrap();
	monitor
		.add_matching_criterion(TransactionMatchingCriterion::new(
			"fast_node",
			TransactionIdentifier::FromAddress(sender()),
			vec![TransactionStatus::Confirmed],
		))
		.await
		.unwrap();
	assert!(
		started.elapsed() < Duration::from_millis(500),
		"fast node waited {:?}",
		started.elapsed()
	);
	assert_eq!(
		broadcaster.transaction_statuses(),
		vec![TransactionStatus::Confirmed]
	);
	assert!(!pending.is_finished());

	slow_chain.set_receipt(ReceiptBuilder::new(tx_hash(), TX_BLOCK).build());
	pending.await.unwrap().unwrap();
	let nodes: Vec<String> = broadcaster
		.transactions
		.lock()
		.unwrap()
		.iter()
		.map(|t| t.node_name.clone())
		.collect();
	assert_eq!(nodes, vec!["fast_node".to_string(), "slow_node".to_string()]);
}
