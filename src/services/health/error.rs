//! Health controller error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum HealthCheckError {
	/// Health job could not be scheduled or stopped
	#[error("Scheduler error: {0}")]
	SchedulerError(ErrorContext),

	/// Reconnecting or resubscribing a node failed
	#[error("Reconnection error: {0}")]
	ReconnectionError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl HealthCheckError {
	pub fn scheduler_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::SchedulerError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn reconnection_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ReconnectionError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for HealthCheckError {
	fn trace_id(&self) -> String {
		match self {
			Self::SchedulerError(ctx) => ctx.trace_id.clone(),
			Self::ReconnectionError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
