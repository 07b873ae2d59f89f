//! Depth and reorg bookkeeping of one observation.

use alloy::primitives::B256;

use crate::models::{Node, TransactionReceipt};

/// Outcome of evaluating an observation against a new block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationVerdict {
	Pending,
	Confirmed,
	/// The observation is no longer part of the canonical chain
	ReorgedOut,
}

/// Tracks an observation made in block `block_number` / `block_hash` until it is deep
/// enough or reorged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTracker {
	block_number: u64,
	block_hash: B256,
	blocks_to_wait_for_confirmation: u64,
	blocks_to_wait_for_missing_tx: u64,
	blocks_to_wait_before_invalidation: u64,
	missing_for: u64,
	moved_for: u64,
}

impl ConfirmationTracker {
	/// Starts tracking an observation with the node's confirmation windows.
	///
	/// # Arguments
	/// * `node` - Supplies the confirmation, missing transaction and invalidation windows
	/// * `block_number` - Block the observation was made in
	/// * `block_hash` - Hash of that block; a receipt at another hash counts as moved
	pub fn new(node: &Node, block_number: u64, block_hash: B256) -> Self {
		Self {
			block_number,
			block_hash,
			blocks_to_wait_for_confirmation: node.blocks_to_wait_for_confirmation,
			blocks_to_wait_for_missing_tx: node.blocks_to_wait_for_missing_tx,
			blocks_to_wait_before_invalidation: node.blocks_to_wait_before_invalidation,
			missing_for: 0,
			moved_for: 0,
		}
	}

	/// Block at which the observation becomes confirmable
	pub fn target_block(&self) -> u64 {
		self.block_number + self.blocks_to_wait_for_confirmation
	}

	/// Evaluates the observation at `current_block` given its current receipt.
	///
	/// Once `current_block` reaches [`target_block`](Self::target_block) the receipt decides
	/// alone: at the recorded hash it is confirmed, anywhere else (or missing) reorged out.
	/// Before that, a receipt that stays missing for more than the missing transaction
	/// window, or stays at another hash for more than the invalidation window, is reorged
	/// out early. Either counter resets as soon as the receipt is back where it was.
	///
	/// Blocks below the observation block are ignored.
	///
	/// # Arguments
	/// * `current_block` - Number of the block just delivered
	/// * `receipt` - The transaction's receipt as the node reports it now
	///
	/// # Returns
	/// * `ConfirmationVerdict` - `Pending` until the observation is settled
	pub fn evaluate(
		&mut self,
		current_block: u64,
		receipt: Option<&TransactionReceipt>,
	) -> ConfirmationVerdict {
		if current_block < self.block_number {
			return ConfirmationVerdict::Pending;
		}

		let at_recorded_block = receipt.is_some_and(|r| r.block_hash == self.block_hash);
		if current_block >= self.target_block() {
			return if at_recorded_block {
				ConfirmationVerdict::Confirmed
			} else {
				ConfirmationVerdict::ReorgedOut
			};
		}

		match receipt {
			None => {
				self.missing_for += 1;
				self.moved_for = 0;
				if self.missing_for > self.blocks_to_wait_for_missing_tx {
					return ConfirmationVerdict::ReorgedOut;
				}
			}
			Some(_) if !at_recorded_block => {
				self.moved_for += 1;
				self.missing_for = 0;
				if self.moved_for > self.blocks_to_wait_before_invalidation {
					return ConfirmationVerdict::ReorgedOut;
				}
			}
			Some(_) => {
				self.missing_for = 0;
				self.moved_for = 0;
			}
		}
		ConfirmationVerdict::Pending
	}
}
