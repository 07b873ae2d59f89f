//! Chain gateway error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Errors surfaced by a [`ChainGateway`](crate::services::gateway::ChainGateway)
#[derive(ThisError, Debug)]
pub enum GatewayError {
	/// Node unreachable or RPC failure
	#[error("Transport error: {0}")]
	TransportError(ErrorContext),

	/// Upstream rejected a subscription when it was created
	#[error("Subscription error: {0}")]
	SubscriptionError(ErrorContext),

	/// A receipt did not show up within the poll bounds
	#[error("Receipt timeout: {0}")]
	ReceiptTimeout(ErrorContext),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl GatewayError {
	pub fn transport_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::TransportError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn subscription_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::SubscriptionError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn receipt_timeout(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ReceiptTimeout(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for GatewayError {
	fn trace_id(&self) -> String {
		match self {
			Self::TransportError(ctx) => ctx.trace_id.clone(),
			Self::SubscriptionError(ctx) => ctx.trace_id.clone(),
			Self::ReceiptTimeout(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
