//! Broadcast error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Errors raised while publishing a message downstream
#[derive(ThisError, Debug)]
pub enum BroadcastError {
	/// Sink unreachable or answered with a non-success status
	#[error("Network error: {0}")]
	NetworkError(Box<ErrorContext>),

	/// Invalid sink settings
	#[error("Config error: {0}")]
	ConfigError(Box<ErrorContext>),

	/// Message could not be built or signed
	#[error("Internal error: {0}")]
	InternalError(Box<ErrorContext>),

	/// Sink did not answer in time
	#[error("Timeout: {0}")]
	Timeout(Box<ErrorContext>),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl BroadcastError {
	pub fn network_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::NetworkError(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}

	pub fn config_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ConfigError(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}

	pub fn internal_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::InternalError(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}

	pub fn timeout(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Timeout(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}
}

impl TraceableError for BroadcastError {
	fn trace_id(&self) -> String {
		match self {
			Self::NetworkError(ctx) => ctx.trace_id.clone(),
			Self::ConfigError(ctx) => ctx.trace_id.clone(),
			Self::InternalError(ctx) => ctx.trace_id.clone(),
			Self::Timeout(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
