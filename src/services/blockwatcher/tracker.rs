//! Delivery tracking for the block pipeline.
//!
//! [`BlockTracker`] remembers the last blocks handed to the dispatcher of each node. The
//! strategies consult it to decide which numbers still have to be fetched, and every
//! recorded block is classified so skipped, repeated or out of order numbers get logged
//! (and skipped numbers persisted as missed blocks).

use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use crate::{
	services::blockwatcher::{error::BlockWatcherError, storage::BlockStorage},
	utils::RingBuffer,
};

/// Where a recorded block sits relative to the previous one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSequence {
	/// First block recorded for the node
	First,
	/// Direct successor of the previous block
	Next,
	/// Numbers in `missed_from..=missed_to` were never recorded
	Gap { missed_from: u64, missed_to: u64 },
	/// Number at or below the previous block
	Stale { last: u64 },
}

/// Recent delivery history per node
#[derive(Clone)]
pub struct BlockTracker {
	block_history: Arc<Mutex<HashMap<String, RingBuffer<u64>>>>,
	history_size: usize,
	storage: Option<Arc<dyn BlockStorage>>,
}

impl BlockTracker {
	pub fn new(history_size: usize, storage: Option<Arc<dyn BlockStorage>>) -> Self {
		Self {
			block_history: Arc::new(Mutex::new(HashMap::new())),
			history_size: history_size.max(1),
			storage,
		}
	}

	/// Records a delivered block and classifies it against the previous one.
	///
	/// Gaps are persisted through the storage when one is configured.
	pub async fn record_block(&self, node: &str, block_number: u64) -> BlockSequence {
		let mut history = self.block_history.lock().await;
		let node_history = history
			.entry(node.to_string())
			.or_insert_with(|| RingBuffer::new(self.history_size));

		let sequence = match node_history.back().copied() {
			None => BlockSequence::First,
			Some(last) if block_number == last + 1 => BlockSequence::Next,
			Some(last) if block_number > last + 1 => BlockSequence::Gap {
				missed_from: last + 1,
				missed_to: block_number - 1,
			},
			Some(last) => BlockSequence::Stale { last },
		};
		node_history.push(block_number);
		drop(history);

		match &sequence {
			BlockSequence::Gap {
				missed_from,
				missed_to,
			} => {
				BlockWatcherError::block_tracker_error(
					format!("Missed blocks {} to {}", missed_from, missed_to),
					None,
					Some(HashMap::from([("node".to_string(), node.to_string())])),
				);
				if let Some(storage) = &self.storage {
					for missed in *missed_from..=*missed_to {
						if let Err(e) = storage.save_missed_block(node, missed).await {
							BlockWatcherError::storage_error(
								format!("Failed to store missed block {}", missed),
								Some(e.into()),
								None,
							);
						}
					}
				}
			}
			BlockSequence::Stale { last } => {
				BlockWatcherError::block_tracker_error(
					format!(
						"Out of order or duplicate block detected: received {} after {}",
						block_number, last
					),
					None,
					Some(HashMap::from([("node".to_string(), node.to_string())])),
				);
			}
			_ => {}
		}
		sequence
	}

	/// Starts the history of `node` at `block_number` without classifying it
	pub async fn seed(&self, node: &str, block_number: u64) {
		let mut history = self.block_history.lock().await;
		let node_history = history
			.entry(node.to_string())
			.or_insert_with(|| RingBuffer::new(self.history_size));
		node_history.clear();
		node_history.push(block_number);
	}

	/// Last block recorded or seeded for `node`
	pub async fn get_last_block(&self, node: &str) -> Option<u64> {
		self.block_history
			.lock()
			.await
			.get(node)
			.and_then(|history| history.back().copied())
	}
}
