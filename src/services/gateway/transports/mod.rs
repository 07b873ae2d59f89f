//! JSON-RPC transports used by the chain gateway.
//!
//! - `HttpTransportClient`: HTTP JSON-RPC with retries and endpoint rotation
//! - `EndpointManager`: active/fallback URL bookkeeping

mod endpoint_manager;
mod error;
mod http;

pub use endpoint_manager::EndpointManager;
pub use error::TransportError;
pub use http::HttpTransportClient;

use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{
	default_on_request_failure, default_on_request_success, Retryable, RetryableStrategy,
};
use serde::Serialize;
use serde_json::{json, Value};

/// HTTP status codes after which the next endpoint is tried
/// - 429: rate limited
/// - 502/503/504: node behind a gateway that is restarting
pub const ROTATE_ON_ERROR_CODES: [u16; 4] = [429, 502, 503, 504];

/// Base trait for JSON-RPC transports
#[async_trait::async_trait]
pub trait BlockchainTransport: Send + Sync {
	/// URL requests are currently sent to
	async fn get_current_url(&self) -> String;

	/// Sends a JSON-RPC request and returns the whole response object
	async fn send_raw_request<P>(
		&self,
		method: &str,
		params: Option<P>,
	) -> Result<Value, TransportError>
	where
		P: Into<Value> + Send + Clone + Serialize;

	/// Builds the JSON-RPC 2.0 envelope
	async fn customize_request<P>(&self, method: &str, params: Option<P>) -> Value
	where
		P: Into<Value> + Send + Clone + Serialize,
	{
		json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params.map(|p| p.into())
		})
	}

	/// Replaces the HTTP client, e.g. to change the retry policy
	fn update_endpoint_manager_client(
		&mut self,
		client: ClientWithMiddleware,
	) -> Result<(), anyhow::Error>;
}

/// Transports able to switch to another endpoint
#[async_trait::async_trait]
pub trait RotatingTransport: BlockchainTransport {
	/// Checks that `url` answers before switching to it
	async fn try_connect(&self, url: &str) -> Result<(), anyhow::Error>;

	/// Makes `url` the active endpoint
	async fn update_client(&self, url: &str) -> Result<(), anyhow::Error>;
}

/// Retries what reqwest-retry classifies as transient: connection errors, timeouts, 5xx, 429
pub struct TransientErrorRetryStrategy;

impl RetryableStrategy for TransientErrorRetryStrategy {
	fn handle(
		&self,
		res: &Result<reqwest::Response, reqwest_middleware::Error>,
	) -> Option<Retryable> {
		match res {
			Ok(success) => default_on_request_success(success),
			Err(error) => default_on_request_failure(error),
		}
	}
}
