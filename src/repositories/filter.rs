//! Contract-event filter persistence.
//!
//! Filters registered at runtime are stored one JSON file per filter id so they survive
//! a restart. Static filters shipped with the configuration are read separately through
//! [`ConfigLoader`].

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use std::{
	collections::HashMap,
	path::{Path, PathBuf},
};

use crate::{
	models::{ConfigLoader, ContractEventFilter},
	repositories::error::RepositoryError,
};

/// Storage of registered filters
#[async_trait]
pub trait FilterRepository: Send + Sync {
	async fn save(&self, filter: &ContractEventFilter) -> Result<(), RepositoryError>;

	/// Deleting an unknown id is not an error
	async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError>;

	async fn find_all(&self) -> Result<Vec<ContractEventFilter>, RepositoryError>;
}

/// Filters as `<id>.json` files under a data directory
#[derive(Clone)]
pub struct FileFilterRepository {
	path: PathBuf,
}

impl FileFilterRepository {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	fn file_path(&self, id: &str) -> PathBuf {
		self.path.join(format!("{}.json", id))
	}

	fn metadata(&self, id: &str) -> Option<HashMap<String, String>> {
		Some(HashMap::from([
			("filter_id".to_string(), id.to_string()),
			("path".to_string(), self.path.display().to_string()),
		]))
	}
}

impl Default for FileFilterRepository {
	fn default() -> Self {
		Self::new(PathBuf::from("data/filters"))
	}
}

#[async_trait]
impl FilterRepository for FileFilterRepository {
	async fn save(&self, filter: &ContractEventFilter) -> Result<(), RepositoryError> {
		let id = filter.id();
		tokio::fs::create_dir_all(&self.path).await.map_err(|e| {
			RepositoryError::storage_error(
				"Failed to create filter directory",
				Some(Box::new(e)),
				self.metadata(id),
			)
		})?;
		let json = serde_json::to_string_pretty(filter).map_err(|e| {
			RepositoryError::storage_error(
				"Failed to serialize filter",
				Some(Box::new(e)),
				self.metadata(id),
			)
		})?;
		tokio::fs::write(self.file_path(id), json)
			.await
			.map_err(|e| {
				RepositoryError::storage_error(
					"Failed to save filter",
					Some(Box::new(e)),
					self.metadata(id),
				)
			})
	}

	async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError> {
		match tokio::fs::remove_file(self.file_path(id)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(RepositoryError::storage_error(
				"Failed to delete filter",
				Some(Box::new(e)),
				self.metadata(id),
			)),
		}
	}

	async fn find_all(&self) -> Result<Vec<ContractEventFilter>, RepositoryError> {
		if !Path::new(&self.path).exists() {
			return Ok(Vec::new());
		}
		let filters: Vec<(String, ContractEventFilter)> =
			ContractEventFilter::load_all(Some(&self.path))
				.await
				.map_err(|e| {
					RepositoryError::load_error(
						"Failed to load persisted filters",
						Some(Box::new(e)),
						Some(HashMap::from([(
							"path".to_string(),
							self.path.display().to_string(),
						)])),
					)
				})?;
		Ok(filters.into_iter().map(|(_, filter)| filter).collect())
	}
}

/// Loads the static filters of `path` (or `config/filters`)
pub async fn load_configured_filters(
	path: Option<&Path>,
) -> Result<Vec<ContractEventFilter>, RepositoryError> {
	let dir = path.unwrap_or(Path::new("config/filters"));
	if !dir.exists() {
		return Ok(Vec::new());
	}
	let filters: Vec<(String, ContractEventFilter)> = ContractEventFilter::load_all(Some(dir))
		.await
		.map_err(|e| {
			RepositoryError::load_error(
				"Failed to load configured filters",
				Some(Box::new(e)),
				Some(HashMap::from([(
					"path".to_string(),
					dir.display().to_string(),
				)])),
			)
		})?;
	Ok(filters.into_iter().map(|(_, filter)| filter).collect())
}
