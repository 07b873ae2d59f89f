//! Contract-event filter subscriptions.
//!
//! - `registry`: live filter subscriptions per node
//! - `block_management`: start block selection for new subscriptions
//! - `store`: events seen so far
//! - `listener`: recording and fan-out event listeners

mod block_management;
mod error;
mod listener;
mod registry;
mod store;

pub use block_management::{select_start_block, EventBlockManagementService};
pub use error::RegistryError;
pub use listener::{EventRecordingListener, FanOutEventListener};
pub use registry::{FilterSubscription, FilterSubscriptionRegistry, SubscriptionRegistry};
pub use store::{EventStore, InMemoryEventStore};
