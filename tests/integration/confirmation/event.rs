use std::{collections::HashMap, sync::Arc};

use alloy::primitives::B256;
use block_confirmation_monitor::{
	models::{Block, ContractEventDetails, ContractEventStatus, Node},
	services::{
		confirmation::{ConfirmationCheckInitialiser, EventConfirmationBlockListener},
		gateway::{BlockListener, ChainGateway, ContractEventListener, EvmGateway, GatewayPool},
	},
	utils::tests::builders::{
		block::{fork_hash_for, hash_for, BlockBuilder, ReceiptBuilder},
		node::NodeBuilder,
	},
};

use crate::integration::mocks::{FakeChain, RecordingBroadcaster};

const NODE: &str = "test_node";
const EVENT_BLOCK: u64 = 90;

fn tx_hash() -> B256 {
	B256::repeat_byte(0x42)
}

fn block(number: u64) -> Block {
	BlockBuilder::new(number).node(NODE).build()
}

fn details() -> ContractEventDetails {
	ContractEventDetails {
		name: "Transfer".to_string(),
		filter_id: "transfers".to_string(),
		node_name: NODE.to_string(),
		transaction_hash: tx_hash(),
		block_number: EVENT_BLOCK,
		block_hash: hash_for(EVENT_BLOCK),
		status: ContractEventStatus::Unconfirmed,
		..Default::default()
	}
}

struct Setup {
	node: Node,
	chain: Arc<FakeChain>,
	gateway: Arc<EvmGateway>,
	broadcaster: Arc<RecordingBroadcaster>,
}

fn setup(node: Node, head: u64) -> Setup {
	let chain = Arc::new(FakeChain::with_head(NODE, head));
	chain.set_receipt(ReceiptBuilder::new(tx_hash(), EVENT_BLOCK).build());
	let gateway = Arc::new(EvmGateway::new(node.clone(), chain.clone()));
	Setup {
		node,
		chain,
		gateway,
		broadcaster: Arc::new(RecordingBroadcaster::default()),
	}
}

async fn listener_for(s: &Setup) -> Arc<EventConfirmationBlockListener> {
	let listener = EventConfirmationBlockListener::new(
		details(),
		&s.node,
		s.gateway.clone(),
		s.broadcaster.clone(),
	);
	s.gateway.add_block_listener(listener.clone()).await;
	listener
}

/// Hands `number` to every listener currently registered on the gateway
async fn deliver(gateway: &EvmGateway, number: u64) {
	for listener in gateway.listeners().snapshot().await {
		listener.on_block(&block(number)).await.unwrap();
	}
}

#[tokio::test]
async fn test_event_confirmed_once_deep_enough() {
	let s = setup(NodeBuilder::new().confirmations(10).build(), EVENT_BLOCK);
	let listener = listener_for(&s).await;

	for number in 91..=99 {
		listener.on_block(&block(number)).await.unwrap();
	}
	assert!(s.broadcaster.event_statuses().is_empty());
	assert!(!listener.is_finished());

	listener.on_block(&block(100)).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Confirmed]
	);
	assert!(listener.is_finished());
	assert!(s.gateway.listeners().is_empty().await);

	listener.on_block(&block(101)).await.unwrap();
	assert_eq!(s.broadcaster.event_statuses().len(), 1);
}

#[tokio::test]
async fn test_event_invalidated_when_receipt_moves() {
	let s = setup(
		NodeBuilder::new()
			.confirmations(10)
			.invalidation_window(2)
			.build(),
		EVENT_BLOCK,
	);
	let listener = listener_for(&s).await;
	listener.on_block(&block(91)).await.unwrap();

	// the transaction was re-mined on a fork
	s.chain.set_receipt(
		ReceiptBuilder::new(tx_hash(), 91)
			.block_hash(fork_hash_for(91))
			.build(),
	);
	listener.on_block(&block(92)).await.unwrap();
	listener.on_block(&block(93)).await.unwrap();
	assert!(s.broadcaster.event_statuses().is_empty());

	listener.on_block(&block(94)).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Invalidated]
	);
	assert!(s.gateway.listeners().is_empty().await);

	for number in 95..=100 {
		listener.on_block(&block(number)).await.unwrap();
	}
	assert_eq!(s.broadcaster.event_statuses().len(), 1);
}

#[tokio::test]
async fn test_event_invalidated_when_receipt_disappears() {
	let s = setup(
		NodeBuilder::new()
			.confirmations(10)
			.missing_tx_window(5)
			.build(),
		EVENT_BLOCK,
	);
	let listener = listener_for(&s).await;
	s.chain.remove_receipt(tx_hash());

	for number in 91..=95 {
		listener.on_block(&block(number)).await.unwrap();
	}
	assert!(s.broadcaster.event_statuses().is_empty());

	listener.on_block(&block(96)).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Invalidated]
	);
}

#[tokio::test]
async fn test_event_invalidated_when_reorged_at_target_depth() {
	let s = setup(NodeBuilder::new().confirmations(10).build(), EVENT_BLOCK);
	let listener = listener_for(&s).await;
	for number in 91..=98 {
		listener.on_block(&block(number)).await.unwrap();
	}

	s.chain.set_receipt(
		ReceiptBuilder::new(tx_hash(), EVENT_BLOCK)
			.block_hash(fork_hash_for(EVENT_BLOCK))
			.build(),
	);
	listener.on_block(&block(99)).await.unwrap();
	listener.on_block(&block(100)).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Invalidated]
	);
}

async fn initialiser(s: &Setup) -> ConfirmationCheckInitialiser {
	let pool = GatewayPool::new();
	pool.insert(s.gateway.clone()).await;
	ConfirmationCheckInitialiser::new(
		pool,
		HashMap::from([(NODE.to_string(), s.node.clone())]),
		s.broadcaster.clone(),
	)
}

#[tokio::test]
async fn test_initialiser_confirms_deep_event_immediately() {
	let s = setup(NodeBuilder::new().confirmations(10).build(), 100);
	let initialiser = initialiser(&s).await;

	initialiser.on_event(details()).await.unwrap();

	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Confirmed]
	);
	assert!(s.gateway.listeners().is_empty().await);
}

#[tokio::test]
async fn test_initialiser_tracks_shallow_event() {
	let s = setup(NodeBuilder::new().confirmations(10).build(), 95);
	let initialiser = initialiser(&s).await;

	initialiser.on_event(details()).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Unconfirmed]
	);
	assert_eq!(s.gateway.listeners().len().await, 1);

	for number in 96..=100 {
		deliver(&s.gateway, number).await;
	}
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![
			ContractEventStatus::Unconfirmed,
			ContractEventStatus::Confirmed
		]
	);
	assert!(s.gateway.listeners().is_empty().await);
}

#[tokio::test]
async fn test_initialiser_zero_depth_confirms_without_node() {
	let s = setup(NodeBuilder::new().confirmations(0).build(), EVENT_BLOCK);
	s.chain.set_down(true);
	let initialiser = initialiser(&s).await;

	initialiser.on_event(details()).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Confirmed]
	);
}

#[tokio::test]
async fn test_initialiser_does_not_confirm_moved_event() {
	let s = setup(NodeBuilder::new().confirmations(10).build(), 100);
	s.chain.set_receipt(
		ReceiptBuilder::new(tx_hash(), EVENT_BLOCK)
			.block_hash(fork_hash_for(EVENT_BLOCK))
			.build(),
	);
	let initialiser = initialiser(&s).await;

	initialiser.on_event(details()).await.unwrap();
	assert_eq!(
		s.broadcaster.event_statuses(),
		vec![ContractEventStatus::Unconfirmed]
	);
	assert_eq!(s.gateway.listeners().len().await, 1);
}

#[tokio::test]
async fn test_initialiser_ignores_settled_event() {
	let s = setup(NodeBuilder::new().build(), 100);
	let initialiser = initialiser(&s).await;
	let mut settled = details();
	settled.status = ContractEventStatus::Invalidated;

	initialiser.on_event(settled).await.unwrap();
	assert!(s.broadcaster.event_statuses().is_empty());
}

#[tokio::test]
async fn test_initialiser_rejects_unknown_node() {
	let s = setup(NodeBuilder::new().build(), 100);
	let initialiser = initialiser(&s).await;
	let mut foreign = details();
	foreign.node_name = "other".to_string();

	assert!(initialiser.on_event(foreign).await.is_err());
	assert!(s.broadcaster.event_statuses().is_empty());
}
