//! Filter subscription registry error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum RegistryError {
	/// No filter is registered under the given id
	#[error("Not found: {0}")]
	NotFound(ErrorContext),

	/// The node refused to open the log subscription
	#[error("Registration error: {0}")]
	RegistrationError(ErrorContext),

	/// Event store or filter persistence failure
	#[error("Store error: {0}")]
	StoreError(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl RegistryError {
	pub fn not_found(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::NotFound(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn registration_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::RegistrationError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn store_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::StoreError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for RegistryError {
	fn trace_id(&self) -> String {
		match self {
			Self::NotFound(ctx) => ctx.trace_id.clone(),
			Self::RegistrationError(ctx) => ctx.trace_id.clone(),
			Self::StoreError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
