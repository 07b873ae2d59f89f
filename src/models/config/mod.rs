//! Configuration loading and validation.
//!
//! Nodes and static contract-event filters are read from JSON files, one object per file.

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use std::path::Path;

mod error;
mod filter_config;
mod node_config;

pub use error::ConfigError;

/// Common interface for loading configuration files
#[async_trait]
pub trait ConfigLoader: Sized {
	/// Load all configuration files from a directory
	///
	/// If no path is provided, uses the default config directory.
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>;

	/// Load configuration from a specific file path
	async fn load_from_path(path: &Path) -> Result<Self, ConfigError>;

	/// Validate the configuration
	fn validate(&self) -> Result<(), ConfigError>;

	/// Logs a warning for every insecure endpoint
	fn validate_protocol(&self);

	/// Check if a file is a JSON file based on extension
	fn is_json_file(path: &Path) -> bool {
		path.extension()
			.map(|ext| ext.to_string_lossy().to_lowercase() == "json")
			.unwrap_or(false)
	}

	/// Fails when `current_instance` collides with one of `instances`
	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError>;
}

/// Loads every JSON file of `dir`, keyed by file stem, in file name order.
pub(crate) async fn read_json_dir<C: ConfigLoader + Send + Sync>(
	dir: &Path,
	kind: &str,
) -> Result<Vec<(String, C)>, ConfigError> {
	let path_metadata = || {
		Some(std::collections::HashMap::from([(
			"path".to_string(),
			dir.display().to_string(),
		)]))
	};

	if !dir.exists() {
		return Err(ConfigError::file_error(
			format!("{} directory not found", kind),
			None,
			path_metadata(),
		));
	}

	let mut pairs: Vec<(String, C)> = Vec::new();
	let entries = std::fs::read_dir(dir).map_err(|e| {
		ConfigError::file_error(
			format!("failed to read {} directory: {}", kind, e),
			Some(Box::new(e)),
			path_metadata(),
		)
	})?;

	let mut paths = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|e| {
			ConfigError::file_error(
				format!("failed to read directory entry: {}", e),
				Some(Box::new(e)),
				path_metadata(),
			)
		})?;
		let path = entry.path();
		if C::is_json_file(&path) {
			paths.push(path);
		}
	}
	paths.sort();

	for path in paths {
		let name = path
			.file_stem()
			.and_then(|s| s.to_str())
			.unwrap_or("unknown")
			.to_string();
		let display = path.display().to_string();
		let config = C::load_from_path(&path).await?;

		let existing: Vec<&C> = pairs.iter().map(|(_, c)| c).collect();
		C::validate_uniqueness(&existing, &config, &display)?;
		pairs.push((name, config));
	}

	Ok(pairs)
}

/// Opens and deserializes one JSON config file.
pub(crate) fn read_json_file<C: serde::de::DeserializeOwned>(
	path: &Path,
	kind: &str,
) -> Result<C, ConfigError> {
	let path_metadata = || {
		Some(std::collections::HashMap::from([(
			"path".to_string(),
			path.display().to_string(),
		)]))
	};
	let file = std::fs::File::open(path).map_err(|e| {
		ConfigError::file_error(
			format!("failed to open {} config file: {}", kind, e),
			Some(Box::new(e)),
			path_metadata(),
		)
	})?;
	serde_json::from_reader(file).map_err(|e| {
		ConfigError::parse_error(
			format!("failed to parse {} config: {}", kind, e),
			Some(Box::new(e)),
			path_metadata(),
		)
	})
}
