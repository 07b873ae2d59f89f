//! Webhook broadcaster.
//!
//! Every message is POSTed as JSON to a single URL. With a secret configured the body is
//! signed with HMAC-SHA256 over `payload || timestamp` and the signature and timestamp
//! travel in the `x-signature` / `x-timestamp` headers.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use sha2::Sha256;
use std::{collections::HashMap, env, sync::Arc, time::Duration};
use tracing::debug;

use crate::{
	models::{BlockDetails, ContractEventDetails, ContractEventFilter, TransactionDetails},
	services::broadcast::{BlockchainEventBroadcaster, BroadcastError, BroadcastMessage},
};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Webhook sink settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
	pub url: String,
	pub secret: Option<String>,
	pub timeout: Duration,
}

impl WebhookConfig {
	/// Reads `BROADCAST_WEBHOOK_URL`, `BROADCAST_WEBHOOK_SECRET` and `BROADCAST_TIMEOUT_MS`.
	///
	/// Returns `None` when no URL is set.
	pub fn from_env() -> Result<Option<Self>, BroadcastError> {
		let Ok(url) = env::var("BROADCAST_WEBHOOK_URL") else {
			return Ok(None);
		};
		url::Url::parse(&url).map_err(|e| {
			BroadcastError::config_error(
				"BROADCAST_WEBHOOK_URL is not a valid URL",
				Some(e.into()),
				Some(HashMap::from([("url".to_string(), url.clone())])),
			)
		})?;

		let timeout_ms = match env::var("BROADCAST_TIMEOUT_MS") {
			Ok(raw) => raw.parse::<u64>().map_err(|e| {
				BroadcastError::config_error(
					"BROADCAST_TIMEOUT_MS must be a valid u64",
					Some(e.into()),
					None,
				)
			})?,
			Err(_) => DEFAULT_TIMEOUT_MS,
		};

		Ok(Some(Self {
			url,
			secret: env::var("BROADCAST_WEBHOOK_SECRET")
				.ok()
				.filter(|s| !s.is_empty()),
			timeout: Duration::from_millis(timeout_ms),
		}))
	}
}

/// Posts broadcast messages as JSON to a webhook, signed with HMAC-SHA256 when a secret is set
pub struct WebhookBroadcaster {
	config: WebhookConfig,
	client: Arc<ClientWithMiddleware>,
}

impl WebhookBroadcaster {
	pub fn new(config: WebhookConfig, client: Arc<ClientWithMiddleware>) -> Self {
		Self { config, client }
	}

	/// Signs `payload` for the `x-signature` and `x-timestamp` headers.
	///
	/// The signature is the hex HMAC-SHA256 of the payload followed by the timestamp.
	///
	/// # Arguments
	/// * `secret` - Shared webhook secret, must not be empty
	/// * `payload` - Serialized message body
	///
	/// # Returns
	/// * `Result<(String, String), BroadcastError>` - `(signature, timestamp)` or a config error
	pub fn sign_payload(
		&self,
		secret: &str,
		payload: &str,
	) -> Result<(String, String), BroadcastError> {
		// HmacSha256 accepts empty keys
		if secret.is_empty() {
			return Err(BroadcastError::config_error(
				"Invalid secret: cannot be empty.",
				None,
				None,
			));
		}

		let timestamp = Utc::now().timestamp_millis();
		let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
			BroadcastError::config_error(format!("Invalid secret: {}", e), None, None)
		})?;
		mac.update(format!("{}{}", payload, timestamp).as_bytes());

		Ok((hex::encode(mac.finalize().into_bytes()), timestamp.to_string()))
	}

	async fn post<T: Serialize + Sync>(
		&self,
		message: &BroadcastMessage<T>,
	) -> Result<(), BroadcastError> {
		let payload = serde_json::to_string(message).map_err(|e| {
			BroadcastError::internal_error("Failed to serialize message", Some(e.into()), None)
		})?;

		let mut headers = HeaderMap::new();
		headers.insert(
			HeaderName::from_static("content-type"),
			HeaderValue::from_static("application/json"),
		);
		if let Some(secret) = &self.config.secret {
			let (signature, timestamp) = self.sign_payload(secret, &payload)?;
			for (name, value) in [("x-signature", signature), ("x-timestamp", timestamp)] {
				headers.insert(
					HeaderName::from_static(name),
					HeaderValue::from_str(&value).map_err(|e| {
						BroadcastError::internal_error(
							format!("Invalid {} value", name),
							Some(e.into()),
							None,
						)
					})?,
				);
			}
		}

		let metadata = Some(HashMap::from([("message_id".to_string(), message.id.clone())]));
		let request = self
			.client
			.post(self.config.url.as_str())
			.headers(headers)
			.body(payload)
			.send();

		let response = tokio::time::timeout(self.config.timeout, request)
			.await
			.map_err(|e| {
				BroadcastError::timeout(
					format!("Webhook did not answer within {:?}", self.config.timeout),
					Some(e.into()),
					metadata.clone(),
				)
			})?
			.map_err(|e| {
				BroadcastError::network_error(
					format!("Failed to send webhook request: {}", e),
					Some(e.into()),
					metadata.clone(),
				)
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(BroadcastError::network_error(
				format!("Webhook request failed with status: {}", status),
				None,
				metadata,
			));
		}
		debug!(id = %message.id, "message delivered");
		Ok(())
	}
}

#[async_trait]
impl BlockchainEventBroadcaster for WebhookBroadcaster {
	async fn broadcast_block(&self, details: &BlockDetails) -> Result<(), BroadcastError> {
		self.post(&BroadcastMessage::block(details)).await
	}

	async fn broadcast_contract_event(
		&self,
		details: &ContractEventDetails,
	) -> Result<(), BroadcastError> {
		self.post(&BroadcastMessage::contract_event(details)).await
	}

	async fn broadcast_transaction(
		&self,
		details: &TransactionDetails,
	) -> Result<(), BroadcastError> {
		self.post(&BroadcastMessage::transaction(details)).await
	}

	async fn broadcast_filter_added(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError> {
		self.post(&BroadcastMessage::filter_added(filter)).await
	}

	async fn broadcast_filter_removed(
		&self,
		filter: &ContractEventFilter,
	) -> Result<(), BroadcastError> {
		self.post(&BroadcastMessage::filter_removed(filter)).await
	}
}
