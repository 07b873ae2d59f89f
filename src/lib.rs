//! Block confirmation monitor.
//!
//! Follows one or more blockchain nodes and reports what happens on them together with a
//! confirmation status that accounts for chain reorganisations:
//!
//! - Blocks are delivered per node in strictly increasing, gap-free order
//! - Contract events matched by registered filters go from `UNCONFIRMED` to `CONFIRMED`
//!   or `INVALIDATED`
//! - Transactions matched by criteria go to `CONFIRMED` or `FAILED`
//! - Node health is checked periodically; nodes that go down are reconnected and
//!   resubscribed
//!
//! # Module Structure
//!
//! - `bootstrap`: assembles and shuts down the engine
//! - `models`: configuration and blockchain data
//! - `repositories`: node configuration and filter persistence
//! - `services`: gateways, block pipeline, confirmation, subscriptions, health, broadcast
//! - `utils`: logging, metrics, HTTP, retries and test helpers

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
