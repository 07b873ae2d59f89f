//! Prometheus metrics of the engine.
//!
//! - System gauges (CPU, memory, disk) refreshed on every scrape
//! - Per-node gauges labelled by `node`, updated by the services as they run

pub mod server;

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use sysinfo::{Disks, System};

use crate::services::gateway::ChainGateway;

lazy_static! {
	/// Global Prometheus registry.
	pub static ref REGISTRY: Registry = Registry::new();

	/// CPU usage percentage across all cores
	pub static ref CPU_USAGE: Gauge = {
		let gauge = Gauge::new("cpu_usage_percentage", "Current CPU usage percentage").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref MEMORY_USAGE_PERCENT: Gauge = {
		let gauge = Gauge::new("memory_usage_percentage", "Memory usage percentage").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref MEMORY_USAGE: Gauge = {
		let gauge = Gauge::new("memory_usage_bytes", "Memory usage in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref TOTAL_MEMORY: Gauge = {
		let gauge = Gauge::new("total_memory_bytes", "Total memory in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref DISK_USAGE: Gauge = {
		let gauge = Gauge::new("disk_usage_bytes", "Used disk space in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref DISK_USAGE_PERCENT: Gauge = {
		let gauge = Gauge::new("disk_usage_percentage", "Disk usage percentage").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Number of configured nodes
	pub static ref NODES_TOTAL: Gauge = {
		let gauge = Gauge::new("nodes_total", "Number of configured nodes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Number of nodes whose gateway is connected with a live block stream
	pub static ref NODES_CONNECTED: Gauge = {
		let gauge = Gauge::new("nodes_connected", "Number of connected nodes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Health status per node: 0 down, 1 connected, 2 subscribed
	pub static ref NODE_STATUS: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("node_status", "Health status of the node"),
			&["node"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Latest block number reported by the node
	pub static ref NODE_CURRENT_BLOCK: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("node_current_block", "Current block number of the node"),
			&["node"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// 1 while the block pipeline lags more than the syncing threshold behind the node
	pub static ref NODE_SYNCING: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("node_syncing", "Whether the block pipeline is catching up"),
			&["node"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref FILTERS_REGISTERED: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("filters_registered", "Number of registered contract-event filters"),
			&["node"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	pub static ref TRANSACTION_CRITERIA: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("transaction_criteria", "Number of transaction matching criteria"),
			&["node"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};
}

/// Gather all metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
	let encoder = TextEncoder::new();
	let metric_families = REGISTRY.gather();
	let mut buffer = Vec::new();
	encoder.encode(&metric_families, &mut buffer)?;
	Ok(buffer)
}

/// Refreshes the CPU, memory and disk gauges.
pub fn update_system_metrics() {
	let mut sys = System::new_all();
	sys.refresh_all();

	CPU_USAGE.set(sys.global_cpu_usage() as f64);

	let total_memory = sys.total_memory();
	let memory_usage = sys.used_memory();
	TOTAL_MEMORY.set(total_memory as f64);
	MEMORY_USAGE.set(memory_usage as f64);
	MEMORY_USAGE_PERCENT.set(percentage(memory_usage, total_memory));

	let disks = Disks::new_with_refreshed_list();
	let (total_disk_space, total_disk_available) = disks
		.list()
		.iter()
		.fold((0u64, 0u64), |(total, available), disk| {
			(total + disk.total_space(), available + disk.available_space())
		});
	let used_disk_space = total_disk_space.saturating_sub(total_disk_available);
	DISK_USAGE.set(used_disk_space as f64);
	DISK_USAGE_PERCENT.set(percentage(used_disk_space, total_disk_space));
}

/// Refreshes the node count gauges from the live gateways
pub fn update_gateway_metrics(gateways: &[Arc<dyn ChainGateway>]) {
	NODES_TOTAL.set(gateways.len() as f64);
	NODES_CONNECTED.set(gateways.iter().filter(|g| g.is_connected()).count() as f64);
}

fn percentage(part: u64, total: u64) -> f64 {
	if total > 0 {
		(part as f64 / total as f64) * 100.0
	} else {
		0.0
	}
}
