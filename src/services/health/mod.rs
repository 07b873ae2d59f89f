//! Node health and reconnection.
//!
//! A periodic job per node reads the node's current block. A node that stops answering
//! is marked `DOWN`, its subscriptions are closed and it is reconnected and resubscribed
//! as soon as it answers again.

mod checker;
mod error;
mod reconnection;
mod service;
mod status;

pub use checker::{is_syncing, NodeHealthCheckService};
pub use error::HealthCheckError;
pub use reconnection::{ReconnectionStrategy, ResubscribingReconnectionStrategy};
pub use service::{HealthWatcherService, JobSchedulerTrait, NodeHealthWatcher};
pub use status::NodeStatus;
