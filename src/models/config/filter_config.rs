//! Static contract-event filter loading and validation.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::models::{
	config::{read_json_dir, read_json_file},
	ConfigError, ConfigLoader, ContractEventFilter,
};

#[async_trait]
impl ConfigLoader for ContractEventFilter {
	/// Loads every filter of `config/filters` (or `path`)
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		let dir = path.unwrap_or(Path::new("config/filters"));
		let pairs = read_json_dir::<Self>(dir, "filters").await?;
		Ok(T::from_iter(pairs))
	}

	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let config: ContractEventFilter = read_json_file(path, "filter")?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.node.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Filter node is required",
				None,
				None,
			));
		}

		if self.event_specification.event_name.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Event name is required",
				None,
				Some(HashMap::from([(
					"filter_id".to_string(),
					self.id().to_string(),
				)])),
			));
		}

		let mut positions: Vec<u32> = self
			.event_specification
			.indexed_parameter_definitions
			.iter()
			.chain(self.event_specification.non_indexed_parameter_definitions.iter())
			.map(|p| p.position)
			.collect();
		positions.sort_unstable();
		if positions.windows(2).any(|w| w[0] == w[1]) {
			return Err(ConfigError::validation_error(
				"Event parameter positions must be unique",
				None,
				Some(HashMap::from([(
					"event".to_string(),
					self.event_specification.event_name.clone(),
				)])),
			));
		}

		if self.event_specification.indexed_parameter_definitions.len() > 3 {
			return Err(ConfigError::validation_error(
				"An event has at most three indexed parameters",
				None,
				None,
			));
		}

		self.validate_protocol();
		Ok(())
	}

	fn validate_protocol(&self) {
		if self.contract_address == Address::ZERO {
			tracing::warn!(
				"Filter '{}' listens on the zero address",
				self.id()
			);
		}
	}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		let Some(id) = current_instance.id.as_deref() else {
			return Ok(());
		};
		if instances.iter().any(|existing| existing.id.as_deref() == Some(id)) {
			return Err(ConfigError::validation_error(
				format!("Duplicate filter id found: '{}'", id),
				None,
				Some(HashMap::from([
					("filter_id".to_string(), id.to_string()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}
		Ok(())
	}
}
