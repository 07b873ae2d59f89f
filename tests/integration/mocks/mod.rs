//! Mock implementations for testing purposes.
//!
//! - `clients`: mocked and in-memory blockchain clients
//! - `repositories`: mocked and in-memory storages
//! - `services`: mocked broadcasters and health collaborators, a stub gateway and
//!   recording listeners
//!
//! Trait mocks are implemented using the `mockall` crate.

mod repositories;
mod services;

#[allow(unused_imports)]
pub use clients::*;
#[allow(unused_imports)]
pub use repositories::*;
#[allow(unused_imports)]
pub use services::*;

use std::time::Duration;

/// Polls `condition` until it holds or `timeout` elapses; returns its last value
#[allow(dead_code)]
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
	F: FnMut() -> bool,
{
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		if condition() {
			return true;
		}
		if tokio::time::Instant::now() >= deadline {
			return condition();
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}
