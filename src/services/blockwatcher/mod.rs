//! Block subscription pipeline.
//!
//! Turns a node's heads into an ordered, gap-free and duplicate-free block stream:
//! - strategies (live head or polling) replay from the checkpoint and follow the chain
//! - the tracker decides which numbers still have to be fetched
//! - the dispatcher delivers each block to every listener on a per-node lane and saves
//!   the checkpoint

mod dispatcher;
mod error;
mod storage;
mod strategy;
mod tracker;

pub use dispatcher::BlockDispatcher;
pub use error::BlockWatcherError;
pub use storage::{BlockStorage, FileBlockStorage};
pub use strategy::{
	create_block_strategy, BlockFeed, BlockSubscriptionStrategy, LiveHeadStrategy,
	PollingStrategy,
};
pub use tracker::{BlockSequence, BlockTracker};
