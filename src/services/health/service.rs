//! Scheduling of the per-node health checks.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::services::health::{HealthCheckError, NodeHealthCheckService};

/// Abstraction over the job scheduler so tests can drive health jobs by hand
#[async_trait::async_trait]
pub trait JobSchedulerTrait: Send + Sync + Sized {
	async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;
	async fn add(&self, job: Job) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
	async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
	async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl JobSchedulerTrait for JobScheduler {
	async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
		Self::new().await.map_err(Into::into)
	}

	async fn add(&self, job: Job) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.add(job).await.map(|_| ()).map_err(Into::into)
	}

	async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.start().await.map(|_| ()).map_err(Into::into)
	}

	async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.shutdown().await.map(|_| ()).map_err(Into::into)
	}
}

/// One node's health job
pub struct NodeHealthWatcher<J: JobSchedulerTrait> {
	checker: Arc<NodeHealthCheckService>,
	scheduler: J,
}

impl<J: JobSchedulerTrait> NodeHealthWatcher<J> {
	pub async fn new(checker: Arc<NodeHealthCheckService>) -> Result<Self, HealthCheckError> {
		let scheduler = J::new().await.map_err(|e| {
			HealthCheckError::scheduler_error(
				e.to_string(),
				Some(e),
				Some(node_metadata(&checker)),
			)
		})?;
		Ok(Self { checker, scheduler })
	}

	/// Schedules `tick` every `health_check_interval_ms`
	pub async fn start(&mut self) -> Result<(), HealthCheckError> {
		let interval = Duration::from_millis(self.checker.node().health_check_interval_ms);
		let checker = self.checker.clone();
		let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
			let checker = checker.clone();
			Box::pin(async move {
				checker.tick().await;
			})
		})
		.map_err(|e| {
			HealthCheckError::scheduler_error(
				"Failed to create health job",
				Some(Box::new(e)),
				Some(node_metadata(&self.checker)),
			)
		})?;

		self.scheduler.add(job).await.map_err(|e| {
			HealthCheckError::scheduler_error(e.to_string(), Some(e), Some(node_metadata(&self.checker)))
		})?;
		self.scheduler.start().await.map_err(|e| {
			HealthCheckError::scheduler_error(e.to_string(), Some(e), Some(node_metadata(&self.checker)))
		})?;

		info!(node = %self.checker.node().name, ?interval, "started health checks");
		Ok(())
	}

	pub async fn stop(&mut self) -> Result<(), HealthCheckError> {
		self.scheduler.shutdown().await.map_err(|e| {
			HealthCheckError::scheduler_error(e.to_string(), Some(e), Some(node_metadata(&self.checker)))
		})?;
		info!(node = %self.checker.node().name, "stopped health checks");
		Ok(())
	}
}

/// Health jobs of every node
pub struct HealthWatcherService<J: JobSchedulerTrait> {
	active_watchers: Arc<RwLock<HashMap<String, NodeHealthWatcher<J>>>>,
}

impl<J: JobSchedulerTrait> Default for HealthWatcherService<J> {
	fn default() -> Self {
		Self {
			active_watchers: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl<J: JobSchedulerTrait> HealthWatcherService<J> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts the health job of the checker's node unless one is already running
	pub async fn start_node_watcher(
		&self,
		checker: Arc<NodeHealthCheckService>,
	) -> Result<(), HealthCheckError> {
		let mut watchers = self.active_watchers.write().await;
		let node = checker.node().name.clone();
		if watchers.contains_key(&node) {
			info!(node = %node, "health checks already running");
			return Ok(());
		}

		let mut watcher = NodeHealthWatcher::<J>::new(checker).await?;
		watcher.start().await?;
		watchers.insert(node, watcher);
		Ok(())
	}

	pub async fn stop_node_watcher(&self, node: &str) -> Result<(), HealthCheckError> {
		let mut watchers = self.active_watchers.write().await;
		if let Some(mut watcher) = watchers.remove(node) {
			watcher.stop().await?;
		}
		Ok(())
	}

	/// Stops every health job; a failing stop does not keep the others running
	pub async fn stop_all(&self) -> Vec<HealthCheckError> {
		let mut watchers = self.active_watchers.write().await;
		let mut errors = Vec::new();
		for (_, mut watcher) in watchers.drain() {
			if let Err(e) = watcher.stop().await {
				errors.push(e);
			}
		}
		errors
	}

	pub async fn nodes(&self) -> Vec<String> {
		let mut nodes: Vec<String> = self.active_watchers.read().await.keys().cloned().collect();
		nodes.sort();
		nodes
	}
}

fn node_metadata(checker: &NodeHealthCheckService) -> HashMap<String, String> {
	HashMap::from([("node".to_string(), checker.node().name.clone())])
}
