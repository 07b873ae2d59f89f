//! Utility modules shared across the engine.
//!
//! - client_storage: per-node storage of shared services
//! - http: retryable HTTP client construction
//! - logging: logging setup and error context
//! - metrics: prometheus gauges and the metrics server
//! - parsing: parsing helpers
//! - retry: fixed-backoff bounded retries
//! - ring_buffer: bounded FIFO used as recent block cache
//! - tests: test builders

pub mod client_storage;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod parsing;
pub mod retry;
pub mod ring_buffer;

pub use client_storage::ClientStorage;
pub use http::*;
pub use parsing::*;
pub use retry::FixedRetryConfig;
pub use ring_buffer::RingBuffer;
