//! Node configuration repository.
//!
//! Nodes are loaded once from `config/nodes/*.json` and keyed by node name.

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::{
	models::{ConfigLoader, Node},
	repositories::error::RepositoryError,
};

#[derive(Clone)]
pub struct NodeRepository {
	pub nodes: HashMap<String, Node>,
}

impl NodeRepository {
	pub async fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		let nodes = Self::load_all(path).await?;
		Ok(NodeRepository { nodes })
	}
}

/// Read access to the configured nodes
#[async_trait]
pub trait NodeRepositoryTrait: Clone {
	async fn new(path: Option<&Path>) -> Result<Self, RepositoryError>
	where
		Self: Sized;

	/// Loads every node file of `path` (or `config/nodes`), keyed by node name
	async fn load_all(path: Option<&Path>) -> Result<HashMap<String, Node>, RepositoryError>;

	fn get(&self, name: &str) -> Option<Node>;

	fn get_all(&self) -> HashMap<String, Node>;
}

#[async_trait]
impl NodeRepositoryTrait for NodeRepository {
	async fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		NodeRepository::new(path).await
	}

	async fn load_all(path: Option<&Path>) -> Result<HashMap<String, Node>, RepositoryError> {
		let path_metadata = || {
			Some(HashMap::from([(
				"path".to_string(),
				path.map_or_else(|| "default".to_string(), |p| p.display().to_string()),
			)]))
		};
		let by_file: Vec<(String, Node)> = Node::load_all(path).await.map_err(|e| {
			RepositoryError::load_error("Failed to load nodes", Some(Box::new(e)), path_metadata())
		})?;

		let mut nodes = HashMap::new();
		for (file, node) in by_file {
			if nodes.contains_key(&node.name) {
				return Err(RepositoryError::validation_error(
					format!("Node {} is defined more than once (in {})", node.name, file),
					None,
					path_metadata(),
				));
			}
			nodes.insert(node.name.clone(), node);
		}
		Ok(nodes)
	}

	fn get(&self, name: &str) -> Option<Node> {
		self.nodes.get(name).cloned()
	}

	fn get_all(&self) -> HashMap<String, Node> {
		self.nodes.clone()
	}
}

/// Service layer over a [`NodeRepositoryTrait`] implementation
#[derive(Clone)]
pub struct NodeService<T: NodeRepositoryTrait> {
	repository: T,
}

impl<T: NodeRepositoryTrait> NodeService<T> {
	pub async fn new(path: Option<&Path>) -> Result<NodeService<NodeRepository>, RepositoryError> {
		let repository = NodeRepository::new(path).await?;
		Ok(NodeService { repository })
	}

	pub fn new_with_repository(repository: T) -> Result<Self, RepositoryError> {
		Ok(NodeService { repository })
	}

	pub fn get(&self, name: &str) -> Option<Node> {
		self.repository.get(name)
	}

	pub fn get_all(&self) -> HashMap<String, Node> {
		self.repository.get_all()
	}
}
