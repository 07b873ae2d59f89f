//! Core domain models of the confirmation engine.
//!
//! - Nodes: monitored chain endpoints and their confirmation settings
//! - Filters: contract events to follow
//! - Criteria: transactions to follow
//! - Details: the observations that get broadcast

mod criteria;
mod details;
mod filter;
mod node;

pub use criteria::{TransactionIdentifier, TransactionMatchingCriterion};
pub use details::{
	BlockDetails, ContractEventDetails, ContractEventStatus, TransactionDetails, TransactionStatus,
};
pub use filter::{ContractEventFilter, ContractEventSpecification, ParameterDefinition};
pub use node::{BlockStrategy, Node, RpcUrl};
