//! Checkpoint storage for the block pipeline.
//!
//! The checkpoint of a node is the number of the last block whose listeners all ran.
//! Blocks skipped after the fetch retry cap are appended to a missed-blocks file so
//! they can be inspected later.

use async_trait::async_trait;
use std::path::PathBuf;

/// Per-node checkpoint store
#[async_trait]
pub trait BlockStorage: Send + Sync {
	/// Last processed block of `node`, `None` when the node never checkpointed
	async fn get_last_processed_block(&self, node: &str) -> Result<Option<u64>, anyhow::Error>;

	/// Overwrites the checkpoint of `node`
	async fn save_last_processed_block(&self, node: &str, block: u64)
		-> Result<(), anyhow::Error>;

	/// Appends a block number that was never delivered
	async fn save_missed_block(&self, node: &str, block: u64) -> Result<(), anyhow::Error>;
}

/// Checkpoints as text files under a data directory
#[derive(Clone)]
pub struct FileBlockStorage {
	storage_path: PathBuf,
}

impl FileBlockStorage {
	pub fn new(storage_path: PathBuf) -> Self {
		FileBlockStorage { storage_path }
	}

	fn last_block_path(&self, node: &str) -> PathBuf {
		self.storage_path.join(format!("{}_last_block.txt", node))
	}

	async fn ensure_dir(&self) -> Result<(), anyhow::Error> {
		tokio::fs::create_dir_all(&self.storage_path)
			.await
			.map_err(|e| anyhow::anyhow!("Failed to create storage directory: {}", e))
	}
}

impl Default for FileBlockStorage {
	fn default() -> Self {
		FileBlockStorage::new(PathBuf::from("data"))
	}
}

#[async_trait]
impl BlockStorage for FileBlockStorage {
	async fn get_last_processed_block(&self, node: &str) -> Result<Option<u64>, anyhow::Error> {
		let file_path = self.last_block_path(node);
		if !file_path.exists() {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(file_path)
			.await
			.map_err(|e| anyhow::anyhow!("Failed to read last processed block: {}", e))?;
		let block_number = content
			.trim()
			.parse::<u64>()
			.map_err(|e| anyhow::anyhow!("Failed to parse last processed block: {}", e))?;
		Ok(Some(block_number))
	}

	async fn save_last_processed_block(
		&self,
		node: &str,
		block: u64,
	) -> Result<(), anyhow::Error> {
		self.ensure_dir().await?;
		tokio::fs::write(self.last_block_path(node), block.to_string())
			.await
			.map_err(|e| anyhow::anyhow!("Failed to save last processed block: {}", e))?;
		Ok(())
	}

	async fn save_missed_block(&self, node: &str, block: u64) -> Result<(), anyhow::Error> {
		self.ensure_dir().await?;
		let file_path = self
			.storage_path
			.join(format!("{}_missed_blocks.txt", node));

		let mut file = tokio::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(file_path)
			.await
			.map_err(|e| anyhow::anyhow!("Failed to create missed block file: {}", e))?;

		tokio::io::AsyncWriteExt::write_all(&mut file, format!("{}\n", block).as_bytes())
			.await
			.map_err(|e| anyhow::anyhow!("Failed to save missed block: {}", e))?;

		Ok(())
	}
}
