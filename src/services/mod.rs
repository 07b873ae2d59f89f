//! Services of the confirmation engine.
//!
//! - `gateway`: node access, block listeners and log subscriptions
//! - `blockwatcher`: ordered, gap-free block pipeline per node
//! - `confirmation`: confirmation tracking of events and transactions
//! - `subscription`: contract-event filter registry
//! - `health`: node health checks and reconnection
//! - `broadcast`: downstream delivery of observations

pub mod blockwatcher;
pub mod broadcast;
pub mod confirmation;
pub mod gateway;
pub mod health;
pub mod subscription;
