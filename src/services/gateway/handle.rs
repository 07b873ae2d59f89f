//! Cancelable subscription handles.

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Mutex,
};
use tokio::task::JoinHandle;

use crate::services::gateway::GatewayError;

/// Explicit cancellation of a live subscription.
///
/// `dispose` may be called any number of times; only the first call does anything.
pub trait Disposable: Send + Sync {
	fn dispose(&self) -> Result<(), GatewayError>;

	fn is_disposed(&self) -> bool;
}

pub type SubscriptionHandle = Arc<dyn Disposable>;

/// Handle owning a background task, aborted on dispose
#[derive(Default)]
pub struct TaskHandle {
	disposed: AtomicBool,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl TaskHandle {
	pub fn new(task: JoinHandle<()>) -> Self {
		Self {
			disposed: AtomicBool::new(false),
			task: Mutex::new(Some(task)),
		}
	}

	/// A handle that reports itself as disposed, for subscriptions that could not be re-opened
	pub fn disposed() -> Self {
		Self {
			disposed: AtomicBool::new(true),
			task: Mutex::new(None),
		}
	}
}

impl Disposable for TaskHandle {
	fn dispose(&self) -> Result<(), GatewayError> {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		let task = self
			.task
			.lock()
			.map_err(|e| anyhow::anyhow!("subscription task lock poisoned: {}", e))?
			.take();
		if let Some(task) = task {
			task.abort();
		}
		Ok(())
	}

	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}
}

impl Drop for TaskHandle {
	fn drop(&mut self) {
		if let Ok(mut task) = self.task.lock() {
			if let Some(task) = task.take() {
				task.abort();
			}
		}
	}
}
