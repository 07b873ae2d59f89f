//! Node configuration loading and validation.

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::{
	models::{
		config::{read_json_dir, read_json_file},
		ConfigError, ConfigLoader, Node,
	},
	utils::normalize_string,
};

#[async_trait]
impl ConfigLoader for Node {
	/// Loads every node of `config/nodes` (or `path`)
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		let dir = path.unwrap_or(Path::new("config/nodes"));
		let pairs = read_json_dir::<Self>(dir, "nodes").await?;
		Ok(T::from_iter(pairs))
	}

	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let config: Node = read_json_file(path, "node")?;
		config.validate()?;
		Ok(config)
	}

	/// Ensures that:
	/// - the node has a name made of lowercase letters, digits, `_` or `-`
	/// - at least one `rpc` URL with a positive weight is present
	/// - URLs are http(s) and weights are within 0..=100
	/// - the confirmation and invalidation windows make sense
	fn validate(&self) -> Result<(), ConfigError> {
		if self.name.is_empty() {
			return Err(ConfigError::validation_error(
				"Node name is required",
				None,
				None,
			));
		}

		if !self
			.name
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
		{
			return Err(ConfigError::validation_error(
				"Node name must contain only lowercase letters, numbers, '_' and '-'",
				Some(Box::new(std::io::Error::other(self.name.clone()))),
				None,
			));
		}

		if !self
			.rpc_urls
			.iter()
			.any(|rpc_url| rpc_url.type_ == "rpc" && rpc_url.weight > 0)
		{
			return Err(ConfigError::validation_error(
				"At least one rpc URL with a positive weight is required",
				None,
				Some(HashMap::from([("node".to_string(), self.name.clone())])),
			));
		}

		if !self.rpc_urls.iter().all(|rpc_url| {
			rpc_url.url.starts_with("http://") || rpc_url.url.starts_with("https://")
		}) {
			return Err(ConfigError::validation_error(
				"All RPC URLs must start with http:// or https://",
				None,
				None,
			));
		}

		if !self.rpc_urls.iter().all(|rpc_url| rpc_url.weight <= 100) {
			return Err(ConfigError::validation_error(
				"All RPC URL weights must be between 0 and 100",
				None,
				None,
			));
		}

		if self.polling_interval_ms == 0 || self.health_check_interval_ms == 0 {
			return Err(ConfigError::validation_error(
				"Polling and health check intervals must be greater than 0",
				None,
				None,
			));
		}

		if self.max_unsynced_blocks == 0 {
			return Err(ConfigError::validation_error(
				"max_unsynced_blocks must be greater than 0",
				None,
				None,
			));
		}

		if self.blocks_to_wait_before_invalidation > self.blocks_to_wait_for_missing_tx {
			tracing::warn!(
				"Node '{}' waits longer for a moved receipt ({}) than for a missing one ({})",
				self.name,
				self.blocks_to_wait_before_invalidation,
				self.blocks_to_wait_for_missing_tx
			);
		}

		self.validate_protocol();

		Ok(())
	}

	fn validate_protocol(&self) {
		for rpc_url in &self.rpc_urls {
			if rpc_url.url.starts_with("http://") {
				tracing::warn!(
					"Node '{}' uses an insecure RPC URL: {}",
					self.name,
					rpc_url.url
				);
			}
		}
	}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		if instances
			.iter()
			.any(|existing| normalize_string(&existing.name) == normalize_string(&current_instance.name))
		{
			return Err(ConfigError::validation_error(
				format!("Duplicate node name found: '{}'", current_instance.name),
				None,
				Some(HashMap::from([
					("node_name".to_string(), current_instance.name.clone()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}
		Ok(())
	}
}
