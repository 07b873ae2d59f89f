//! Block confirmation monitor entry point.
//!
//! Loads the node configuration, starts a block pipeline, filter subscriptions and a
//! health job per node, and broadcasts blocks, contract events and transactions with
//! their confirmation status until Ctrl+C.
//!
//! # Flow
//! 1. Loads node configurations from `config/nodes`
//! 2. Builds the broadcaster (webhook or log)
//! 3. Starts the engine: gateways, pipelines, filters and health checks
//! 4. Serves `/metrics` when enabled
//! 5. Shuts everything down on Ctrl+C

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use crate::{
	bootstrap::{create_broadcaster, initialize_services, start_engine, EngineConfig, Result},
	repositories::{load_configured_filters, NodeRepository},
	utils::{
		logging::setup_logging, metrics::server::create_metrics_server, parse_string_to_bytes_size,
	},
};

use clap::Parser;
use dotenvy::dotenv_override;
use std::env::{set_var, var};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
	name = "block-confirmation-monitor",
	about = "Follows blockchain nodes and broadcasts blocks, contract events and transactions together with their confirmation status.",
	version
)]
struct Cli {
	/// Write logs to file instead of stdout
	#[arg(long)]
	log_file: bool,

	/// Set log level (trace, debug, info, warn, error)
	#[arg(long, value_name = "LEVEL")]
	log_level: Option<String>,

	/// Path to store log files (default: logs/)
	#[arg(long, value_name = "PATH")]
	log_path: Option<String>,

	/// Maximum log file size before rolling (e.g., "1GB", "500MB", "1024KB")
	#[arg(long, value_name = "SIZE", value_parser = parse_string_to_bytes_size)]
	log_max_size: Option<u64>,

	/// Address to start the metrics server on (default: 127.0.0.1:8081)
	#[arg(long, value_name = "HOST:PORT")]
	metrics_address: Option<String>,

	/// Enable metrics server
	#[arg(long)]
	metrics: bool,

	/// Directory of node configurations (default: config/nodes)
	#[arg(long, value_name = "PATH")]
	nodes_path: Option<PathBuf>,

	/// Directory of static filter configurations (default: config/filters)
	#[arg(long, value_name = "PATH")]
	filters_path: Option<PathBuf>,

	/// Directory for checkpoints and registered filters (default: data)
	#[arg(long, value_name = "PATH")]
	data_dir: Option<PathBuf>,

	/// Validate configuration files without starting the service
	#[arg(long)]
	check: bool,
}

impl Cli {
	/// Apply CLI options to environment variables, overriding any existing values
	fn apply_to_env(&self) {
		dotenv_override().ok();

		if self.log_file {
			set_var("LOG_MODE", "file");
		}

		if let Ok(level) = var("RUST_LOG") {
			set_var("LOG_LEVEL", level);
		}

		if let Some(level) = &self.log_level {
			set_var("LOG_LEVEL", level);
			set_var("RUST_LOG", level);
		}

		if let Some(path) = &self.log_path {
			set_var("LOG_DATA_DIR", path);
		}

		if let Some(max_size) = &self.log_max_size {
			set_var("LOG_MAX_SIZE", max_size.to_string());
		}

		if self.metrics {
			set_var("METRICS_ENABLED", "true");
		}

		if let Some(address) = &self.metrics_address {
			if let Some(port) = address.split(':').nth(1) {
				set_var("METRICS_PORT", port);
			}
		}
	}

	fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			nodes_path: self.nodes_path.clone(),
			filters_path: self.filters_path.clone(),
			data_dir: self.data_dir.clone(),
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	cli.apply_to_env();

	setup_logging().unwrap_or_else(|e| {
		error!("Failed to setup logging: {}", e);
	});

	let config = cli.engine_config();

	if cli.check {
		validate_configuration(&config).await;
		return Ok(());
	}

	let nodes = initialize_services::<NodeRepository>(None, &config)
		.await
		.map_err(|e| anyhow::anyhow!("Failed to load node configuration: {}", e))?;
	if nodes.is_empty() {
		info!("No nodes configured. Exiting...");
		return Ok(());
	}

	let broadcaster = create_broadcaster()?;
	let engine = start_engine(nodes, &config, broadcaster).await?;

	let metrics_enabled =
		cli.metrics || var("METRICS_ENABLED").map(|v| v == "true").unwrap_or(false);
	let metrics_address = if var("IN_DOCKER").unwrap_or_default() == "true" {
		var("METRICS_PORT")
			.map(|port| format!("0.0.0.0:{}", port))
			.unwrap_or_else(|_| "0.0.0.0:8081".to_string())
	} else {
		cli.metrics_address
			.clone()
			.unwrap_or_else(|| "127.0.0.1:8081".to_string())
	};

	let metrics_server = if metrics_enabled {
		info!("Metrics server enabled, starting on {}", metrics_address);
		match create_metrics_server(metrics_address, engine.gateways.clone()) {
			Ok(server) => Some(server),
			Err(e) => {
				error!("Failed to create metrics server: {}", e);
				None
			}
		}
	} else {
		info!("Metrics server disabled. Use --metrics flag or METRICS_ENABLED=true to enable");
		None
	};

	info!("Service started. Press Ctrl+C to shutdown");

	let ctrl_c = tokio::signal::ctrl_c();
	if let Some(metrics_future) = metrics_server {
		tokio::select! {
			result = ctrl_c => {
				if let Err(e) = result {
					error!("Error waiting for Ctrl+C: {}", e);
				}
				info!("Shutdown signal received, stopping services...");
			}
			result = metrics_future => {
				if let Err(e) = result {
					error!("Metrics server error: {}", e);
				}
				info!("Metrics server stopped, shutting down services...");
			}
		}
	} else {
		let _ = ctrl_c.await;
		info!("Shutdown signal received, stopping services...");
	}

	engine.shutdown().await;
	info!("Shutdown complete");
	Ok(())
}

/// Loads every configuration file and reports what would be started
async fn validate_configuration(config: &EngineConfig) {
	info!("Validating configuration files...");

	let nodes = match initialize_services::<NodeRepository>(None, config).await {
		Ok(nodes) => nodes,
		Err(e) => {
			error!("{}", e);
			return;
		}
	};
	if nodes.is_empty() {
		error!("No nodes configured");
		return;
	}
	info!("✓ Found {} node(s)", nodes.len());

	match load_configured_filters(config.filters_path.as_deref()).await {
		Ok(filters) => {
			let unknown: Vec<&str> = filters
				.iter()
				.filter(|f| !nodes.contains_key(&f.node))
				.map(|f| f.id())
				.collect();
			if !unknown.is_empty() {
				error!("Filters refer to unknown nodes: {}", unknown.join(", "));
				return;
			}
			info!("✓ Found {} filter(s)", filters.len());
		}
		Err(e) => {
			error!("{}", e);
			return;
		}
	}

	info!("Configuration validation completed successfully!");
}
