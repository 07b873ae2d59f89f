//! Confirmation engine error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

#[derive(ThisError, Debug)]
pub enum ConfirmationError {
	/// Receipt of an observed transaction could not be read
	#[error("Receipt error: {0}")]
	ReceiptError(ErrorContext),

	/// A criterion or listener refers to a node without gateway
	#[error("Unknown node: {0}")]
	UnknownNode(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl ConfirmationError {
	pub fn receipt_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ReceiptError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn unknown_node(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::UnknownNode(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for ConfirmationError {
	fn trace_id(&self) -> String {
		match self {
			Self::ReceiptError(ctx) => ctx.trace_id.clone(),
			Self::UnknownNode(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
