//! Publication of blocks, contract events, transactions and filter changes.
//!
//! [`BlockchainEventBroadcaster`] is the downstream sink. [`WebhookBroadcaster`] posts
//! signed JSON envelopes, [`LoggingBroadcaster`] writes them to the log.

mod broadcaster;
mod error;
mod listener;
mod message;
mod webhook;

pub use broadcaster::{BlockchainEventBroadcaster, LoggingBroadcaster};
pub use error::BroadcastError;
pub use listener::BlockBroadcastListener;
pub use message::{BroadcastMessage, MessageType};
pub use webhook::{WebhookBroadcaster, WebhookConfig};
