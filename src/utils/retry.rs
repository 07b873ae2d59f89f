//! Fixed-backoff, attempt-capped retries.
//!
//! Used wherever the engine has to wait for eventually consistent node state:
//! resolving a head notification to a full block, waiting for a transaction
//! receipt and re-registering a filter while a node is coming back.

use backon::ConstantBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_attempts() -> usize {
	10
}

fn default_backoff_ms() -> u64 {
	500
}

/// Bounded retry with a constant delay between attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FixedRetryConfig {
	/// Total number of attempts, including the first one
	#[serde(default = "default_max_attempts")]
	pub max_attempts: usize,
	/// Delay between two attempts
	#[serde(default = "default_backoff_ms")]
	pub backoff_ms: u64,
}

impl Default for FixedRetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			backoff_ms: default_backoff_ms(),
		}
	}
}

impl FixedRetryConfig {
	pub fn new(max_attempts: usize, backoff_ms: u64) -> Self {
		Self {
			max_attempts,
			backoff_ms,
		}
	}

	/// backon builder performing `max_attempts - 1` retries after the first call
	pub fn builder(&self) -> ConstantBuilder {
		ConstantBuilder::default()
			.with_delay(Duration::from_millis(self.backoff_ms))
			.with_max_times(self.max_attempts.saturating_sub(1))
	}
}
