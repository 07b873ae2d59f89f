//! Confirmation engine.
//!
//! Contract events and monitored transactions enter as `UNCONFIRMED` and are followed
//! block by block until they are deep enough (`CONFIRMED`) or fall off the canonical
//! chain (`INVALIDATED` for events; transactions simply wait to be observed again).
//! Failed transactions and zero-depth nodes skip the unconfirmed stage.

mod error;
mod event_listener;
mod initialiser;
mod monitor;
mod tracker;
mod transaction_listener;

pub use error::ConfirmationError;
pub use event_listener::EventConfirmationBlockListener;
pub use initialiser::ConfirmationCheckInitialiser;
pub use monitor::TransactionMonitoringBlockListener;
pub use tracker::{ConfirmationTracker, ConfirmationVerdict};
pub use transaction_listener::TransactionConfirmationBlockListener;
