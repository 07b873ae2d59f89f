use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::models::{Transaction, TransactionStatus};

/// What a transaction criterion matches on
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionIdentifier {
	Hash(B256),
	FromAddress(Address),
	ToAddress(Address),
}

/// Transaction monitoring request for one node
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransactionMatchingCriterion {
	pub id: String,
	pub node_name: String,
	pub identifier: TransactionIdentifier,
	/// Statuses that are broadcast; others are tracked silently
	pub statuses: Vec<TransactionStatus>,
	/// Removed after its first terminal outcome
	pub one_time_match: bool,
}

impl TransactionMatchingCriterion {
	/// Hash criteria match a single transaction and are one-time; address criteria are not.
	pub fn new(
		node_name: impl Into<String>,
		identifier: TransactionIdentifier,
		statuses: Vec<TransactionStatus>,
	) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			node_name: node_name.into(),
			one_time_match: matches!(identifier, TransactionIdentifier::Hash(_)),
			identifier,
			statuses,
		}
	}

	pub fn is_a_match(&self, transaction: &Transaction) -> bool {
		match self.identifier {
			TransactionIdentifier::Hash(hash) => transaction.hash == hash,
			TransactionIdentifier::FromAddress(from) => transaction.from == from,
			TransactionIdentifier::ToAddress(to) => transaction.to == Some(to),
		}
	}

	pub fn wants(&self, status: TransactionStatus) -> bool {
		self.statuses.contains(&status)
	}
}
