//! Error context shared by every error type of the engine.
//!
//! [`ErrorContext`] carries a message, the underlying error, string metadata (usually the
//! node and filter involved), an RFC 3339 timestamp and a trace id. The trace id of a
//! wrapped engine error is reused so one failure keeps the same id while it travels up
//! through the gateway, the pipeline and the services.

use chrono::Utc;
use std::{collections::HashMap, error::Error, fmt};
use uuid::Uuid;

type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Source chains are only followed this deep when looking for a trace id
const MAX_TRACE_DEPTH: usize = 3;

#[derive(Debug)]
pub struct ErrorContext {
	pub message: String,
	pub source: Option<BoxedError>,
	pub metadata: Option<HashMap<String, String>>,
	pub timestamp: String,
	pub trace_id: String,
}

impl ErrorContext {
	pub fn new(
		message: impl Into<String>,
		source: Option<BoxedError>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		let trace_id = match &source {
			Some(source) => TraceableError::trace_id(source.as_ref()),
			None => Uuid::new_v4().to_string(),
		};

		Self {
			message: message.into(),
			source,
			metadata,
			timestamp: Utc::now().to_rfc3339(),
			trace_id,
		}
	}

	/// Same as [`Self::new`], and emits the error as an `ERROR` event
	pub fn new_with_log(
		message: impl Into<String>,
		source: Option<BoxedError>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		let context = Self::new(message, source, metadata);
		log_error(&context);
		context
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata
			.get_or_insert_with(HashMap::new)
			.insert(key.into(), value.into());
		self
	}

	/// Node the error was raised for, when recorded in the metadata
	pub fn node(&self) -> Option<&str> {
		self.metadata
			.as_ref()
			.and_then(|metadata| metadata.get("node"))
			.map(String::as_str)
	}

	/// `message [key=value, ...]` with keys in alphabetical order
	pub fn format_with_metadata(&self) -> String {
		let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_empty()) else {
			return self.message.clone();
		};

		let mut pairs: Vec<(&String, &String)> = metadata.iter().collect();
		pairs.sort();
		let formatted: Vec<String> = pairs
			.into_iter()
			.map(|(key, value)| format!("{}={}", key, value))
			.collect();
		format!("{} [{}]", self.message, formatted.join(", "))
	}
}

impl fmt::Display for ErrorContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.format_with_metadata())
	}
}

impl Error for ErrorContext {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
	}
}

/// Errors that expose the trace id of their context
pub trait TraceableError: Error + Send + Sync {
	fn trace_id(&self) -> String;
}

impl TraceableError for dyn Error + Send + Sync + 'static {
	/// Trace id of the first engine error in the chain, or a fresh one
	fn trace_id(&self) -> String {
		let mut current: Option<&(dyn Error + 'static)> = Some(self);
		for _ in 0..=MAX_TRACE_DEPTH {
			let Some(err) = current else {
				break;
			};
			if let Some(id) = try_extract_trace_id(err) {
				return id;
			}
			current = err.source();
		}
		Uuid::new_v4().to_string()
	}
}

fn try_extract_trace_id(err: &(dyn Error + 'static)) -> Option<String> {
	if let Some(context) = err.downcast_ref::<ErrorContext>() {
		return Some(context.trace_id.clone());
	}

	macro_rules! downcast_trace_id {
		($($ty:path),* $(,)?) => {
			$(
				if let Some(e) = err.downcast_ref::<$ty>() {
					return Some(e.trace_id());
				}
			)*
		};
	}

	downcast_trace_id!(
		crate::services::gateway::GatewayError,
		crate::services::gateway::transports::TransportError,
		crate::services::blockwatcher::BlockWatcherError,
		crate::services::confirmation::ConfirmationError,
		crate::services::subscription::RegistryError,
		crate::services::health::HealthCheckError,
		crate::services::broadcast::BroadcastError,
		crate::repositories::RepositoryError,
		crate::models::ConfigError,
	);
	None
}

/// Drops HTML bodies some node proxies return with error responses
fn strip_html(message: &str) -> &str {
	let is_html = ["<html>", "<head>", "<body>"]
		.iter()
		.any(|tag| message.contains(tag));
	match message.find('<') {
		Some(pos) if is_html => message[..pos].trim(),
		_ => message,
	}
}

fn error_chain(err: &dyn Error) -> String {
	let mut chain = strip_html(&err.to_string()).to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		chain.push_str("\n\tCaused by: ");
		chain.push_str(strip_html(&cause.to_string()));
		source = cause.source();
	}
	chain
}

fn log_error(context: &ErrorContext) {
	let node = context.node().unwrap_or("-");
	match &context.source {
		Some(source) => tracing::error!(
			message = context.format_with_metadata(),
			node = %node,
			trace_id = %context.trace_id,
			timestamp = %context.timestamp,
			error.chain = %error_chain(source.as_ref()),
			"Error occurred"
		),
		None => tracing::error!(
			message = context.format_with_metadata(),
			node = %node,
			trace_id = %context.trace_id,
			timestamp = %context.timestamp,
			"Error occurred"
		),
	}
}
