//! HTTP JSON-RPC transport with retries and endpoint failover.

use anyhow::Context;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::{
	models::Node,
	services::gateway::transports::{
		BlockchainTransport, EndpointManager, RotatingTransport, TransientErrorRetryStrategy,
		TransportError,
	},
	utils::http::{create_retryable_http_client, RetryConfig},
};

/// Thread-safe HTTP transport for one node.
///
/// Cloning is cheap: clones share the connection pool and the endpoint state.
#[derive(Clone, Debug)]
pub struct HttpTransportClient {
	pub client: ClientWithMiddleware,
	endpoint_manager: EndpointManager,
}

fn probe_request() -> Value {
	json!({
		"jsonrpc": "2.0",
		"id": 1,
		"method": "eth_blockNumber",
		"params": []
	})
}

impl HttpTransportClient {
	/// Connects to the highest weighted `rpc` URL of `node` that answers a probe.
	///
	/// The remaining URLs become fallbacks.
	pub async fn new(node: &Node, retry_config: &RetryConfig) -> Result<Self, anyhow::Error> {
		let mut rpc_urls: Vec<_> = node
			.rpc_urls
			.iter()
			.filter(|rpc_url| rpc_url.type_ == "rpc" && rpc_url.weight > 0)
			.collect();
		rpc_urls.sort_by(|a, b| b.weight.cmp(&a.weight));

		let base_client = reqwest::ClientBuilder::new()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(32)
			.timeout(Duration::from_secs(30))
			.connect_timeout(Duration::from_secs(20))
			.build()
			.context("Failed to create base HTTP client")?;
		let client =
			create_retryable_http_client(retry_config, base_client, Some(TransientErrorRetryStrategy));

		for rpc_url in rpc_urls.iter() {
			let Ok(url) = Url::parse(&rpc_url.url) else {
				tracing::warn!(node = %node.name, url = %rpc_url.url, "skipping invalid RPC URL");
				continue;
			};

			match client.post(url).json(&probe_request()).send().await {
				Ok(response) if response.status().is_success() => {
					let fallback_urls = rpc_urls
						.iter()
						.filter(|other| other.url != rpc_url.url)
						.map(|other| other.url.clone())
						.collect();

					return Ok(Self {
						endpoint_manager: EndpointManager::new(
							client.clone(),
							&rpc_url.url,
							fallback_urls,
						),
						client,
					});
				}
				Ok(response) => {
					tracing::warn!(node = %node.name, url = %rpc_url.url, status = %response.status(), "RPC URL rejected probe");
				}
				Err(e) => {
					tracing::warn!(node = %node.name, url = %rpc_url.url, error = %e, "RPC URL unreachable");
				}
			}
		}

		Err(anyhow::anyhow!(
			"All RPC URLs of node '{}' failed to connect",
			node.name
		))
	}
}

#[async_trait]
impl BlockchainTransport for HttpTransportClient {
	async fn get_current_url(&self) -> String {
		self.endpoint_manager.active_url.read().await.clone()
	}

	async fn send_raw_request<P>(
		&self,
		method: &str,
		params: Option<P>,
	) -> Result<Value, TransportError>
	where
		P: Into<Value> + Send + Clone + Serialize,
	{
		self.endpoint_manager
			.send_raw_request(self, method, params)
			.await
	}

	fn update_endpoint_manager_client(
		&mut self,
		client: ClientWithMiddleware,
	) -> Result<(), anyhow::Error> {
		self.endpoint_manager.update_client(client);
		Ok(())
	}
}

#[async_trait]
impl RotatingTransport for HttpTransportClient {
	async fn try_connect(&self, url: &str) -> Result<(), anyhow::Error> {
		let url = Url::parse(url).map_err(|_| anyhow::anyhow!("Invalid URL: {}", url))?;
		let response = self
			.client
			.post(url.clone())
			.json(&probe_request())
			.send()
			.await
			.map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;

		if response.status().is_success() {
			Ok(())
		} else {
			Err(anyhow::anyhow!(
				"Failed to connect to {}: {}",
				url,
				response.status().as_u16()
			))
		}
	}

	async fn update_client(&self, url: &str) -> Result<(), anyhow::Error> {
		let parsed = Url::parse(url).map_err(|_| anyhow::anyhow!("Invalid URL: {}", url))?;
		let mut active_url = self.endpoint_manager.active_url.write().await;
		*active_url = parsed.as_str().trim_end_matches('/').to_string();
		Ok(())
	}
}
