//! Domain models and data structures of the confirmation engine.
//!
//! - `blockchain`: blocks, transactions, receipts and logs as read from a node
//! - `config`: configuration loading and validation
//! - `core`: nodes, filters, criteria and observations

mod blockchain;
mod config;
mod core;

pub use blockchain::{
	Block, BlockHead, ContractLog, RpcBlock, RpcBlockHeader, Transaction, TransactionReceipt,
};

pub use core::{
	BlockDetails, BlockStrategy, ContractEventDetails, ContractEventFilter,
	ContractEventSpecification, ContractEventStatus, Node, ParameterDefinition, RpcUrl,
	TransactionDetails, TransactionIdentifier, TransactionMatchingCriterion, TransactionStatus,
};

pub use config::{ConfigError, ConfigLoader};
