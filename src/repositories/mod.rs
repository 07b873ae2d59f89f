//! Repositories for node configuration and registered filters.
//!
//! - Node: nodes loaded from `config/nodes`, keyed by name
//! - Filter: runtime filter persistence plus the static filters of `config/filters`

mod error;
mod filter;
mod node;

pub use error::RepositoryError;
pub use filter::{load_configured_filters, FileFilterRepository, FilterRepository};
pub use node::{NodeRepository, NodeRepositoryTrait, NodeService};
