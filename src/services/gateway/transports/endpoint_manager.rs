//! Active and fallback RPC endpoints of one node.
//!
//! Requests go to the active URL. A network failure, or one of the
//! [`ROTATE_ON_ERROR_CODES`] statuses, promotes the first fallback that answers and
//! demotes the failed URL to the end of the fallback list.

use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::services::gateway::transports::{
	RotatingTransport, TransportError, ROTATE_ON_ERROR_CODES,
};

#[derive(Clone, Debug)]
pub struct EndpointManager {
	pub active_url: Arc<RwLock<String>>,
	pub fallback_urls: Arc<RwLock<Vec<String>>>,
	client: ClientWithMiddleware,
	rotation_lock: Arc<Mutex<()>>,
}

/// Result of a single POST to one URL
#[derive(Debug)]
enum AttemptOutcome {
	Response(reqwest::Response),
	NetworkError(reqwest_middleware::Error),
	SerializationError(TransportError),
}

impl EndpointManager {
	pub fn new(client: ClientWithMiddleware, active_url: &str, fallback_urls: Vec<String>) -> Self {
		Self {
			active_url: Arc::new(RwLock::new(active_url.to_string())),
			fallback_urls: Arc::new(RwLock::new(fallback_urls)),
			rotation_lock: Arc::new(Mutex::new(())),
			client,
		}
	}

	pub fn update_client(&mut self, client: ClientWithMiddleware) {
		self.client = client;
	}

	/// Switches to the first fallback that accepts a connection.
	///
	/// Rotations are serialized. Returns the new active URL.
	pub async fn try_rotate_url<T: RotatingTransport>(
		&self,
		transport: &T,
	) -> Result<String, TransportError> {
		let _guard = self.rotation_lock.lock().await;
		let previous_url = self.active_url.read().await.clone();
		let fallbacks = self.fallback_urls.read().await.clone();

		let Some(candidate) = fallbacks.iter().find(|url| **url != previous_url).cloned() else {
			return Err(TransportError::url_rotation(
				format!("No fallback URL available for '{}'", previous_url),
				None,
				None,
			));
		};

		transport.try_connect(&candidate).await.map_err(|e| {
			TransportError::url_rotation(
				format!("Failed to connect to fallback URL '{}'", candidate),
				Some(e.into()),
				None,
			)
		})?;
		transport.update_client(&candidate).await.map_err(|e| {
			TransportError::url_rotation(
				format!("Failed to switch transport to '{}'", candidate),
				Some(e.into()),
				None,
			)
		})?;

		let mut active_url = self.active_url.write().await;
		let mut fallback_urls = self.fallback_urls.write().await;
		let mut next_fallbacks: Vec<String> = fallback_urls
			.iter()
			.filter(|url| **url != candidate)
			.cloned()
			.collect();
		next_fallbacks.push(previous_url.clone());

		tracing::info!(from = %previous_url, to = %candidate, "rotated RPC endpoint");
		*fallback_urls = next_fallbacks;
		*active_url = candidate.clone();

		Ok(candidate)
	}

	async fn attempt<P>(
		&self,
		url: &str,
		transport: &impl RotatingTransport,
		method: &str,
		params: Option<P>,
	) -> AttemptOutcome
	where
		P: Into<Value> + Send + Clone + Serialize,
	{
		let body = transport.customize_request(method, params).await;
		let body = match serde_json::to_string(&body) {
			Ok(body) => body,
			Err(e) => {
				return AttemptOutcome::SerializationError(TransportError::request_serialization(
					"Failed to serialize request JSON",
					Some(Box::new(e)),
					None,
				));
			}
		};

		match self
			.client
			.post(url)
			.header("Content-Type", "application/json")
			.body(body)
			.send()
			.await
		{
			Ok(response) => AttemptOutcome::Response(response),
			Err(e) => AttemptOutcome::NetworkError(e),
		}
	}

	/// Sends a request to the active URL, rotating on network failures and rotation statuses.
	pub async fn send_raw_request<T, P>(
		&self,
		transport: &T,
		method: &str,
		params: Option<P>,
	) -> Result<Value, TransportError>
	where
		T: RotatingTransport,
		P: Into<Value> + Send + Clone + Serialize,
	{
		loop {
			let url = self.active_url.read().await.clone();
			tracing::trace!(%url, method, "sending JSON-RPC request");

			match self.attempt(&url, transport, method, params.clone()).await {
				AttemptOutcome::Response(response) => {
					let status = response.status();
					if status.is_success() {
						return response.json().await.map_err(|e| {
							TransportError::response_parse(
								format!("Failed to parse {} response", method),
								Some(Box::new(e)),
								None,
							)
						});
					}

					let body = response.text().await.unwrap_or_default();
					if !ROTATE_ON_ERROR_CODES.contains(&status.as_u16()) {
						return Err(TransportError::http(status, url, body, None, None));
					}

					tracing::warn!(%url, %status, "endpoint rejected request, rotating");
					if let Err(rotation_error) = self.try_rotate_url(transport).await {
						return Err(TransportError::http(
							status,
							url,
							body,
							Some(Box::new(rotation_error)),
							None,
						));
					}
				}
				AttemptOutcome::NetworkError(network_error) => {
					tracing::warn!(%url, error = %network_error, "endpoint unreachable, rotating");
					if let Err(rotation_error) = self.try_rotate_url(transport).await {
						return Err(TransportError::network(
							network_error.to_string(),
							Some(Box::new(rotation_error)),
							None,
						));
					}
				}
				AttemptOutcome::SerializationError(e) => return Err(e),
			}
		}
	}
}
