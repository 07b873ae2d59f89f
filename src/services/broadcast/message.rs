//! Message envelope published for every broadcast.

use serde::{Deserialize, Serialize};

use crate::models::{BlockDetails, ContractEventDetails, ContractEventFilter, TransactionDetails};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
	Block,
	ContractEvent,
	Transaction,
	EventFilterAdded,
	EventFilterRemoved,
}

/// `{id, type, details, retries}` envelope
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BroadcastMessage<T> {
	pub id: String,
	#[serde(rename = "type")]
	pub type_: MessageType,
	pub details: T,
	pub retries: u32,
}

impl<T> BroadcastMessage<T> {
	fn new(id: String, type_: MessageType, details: T) -> Self {
		Self {
			id,
			type_,
			details,
			retries: 0,
		}
	}
}

impl<'a> BroadcastMessage<&'a BlockDetails> {
	pub fn block(details: &'a BlockDetails) -> Self {
		Self::new(format!("{:#x}", details.hash), MessageType::Block, details)
	}
}

impl<'a> BroadcastMessage<&'a ContractEventDetails> {
	pub fn contract_event(details: &'a ContractEventDetails) -> Self {
		Self::new(details.id(), MessageType::ContractEvent, details)
	}
}

impl<'a> BroadcastMessage<&'a TransactionDetails> {
	pub fn transaction(details: &'a TransactionDetails) -> Self {
		Self::new(format!("{:#x}", details.hash), MessageType::Transaction, details)
	}
}

impl<'a> BroadcastMessage<&'a ContractEventFilter> {
	pub fn filter_added(filter: &'a ContractEventFilter) -> Self {
		Self::new(filter.id().to_string(), MessageType::EventFilterAdded, filter)
	}

	pub fn filter_removed(filter: &'a ContractEventFilter) -> Self {
		Self::new(filter.id().to_string(), MessageType::EventFilterRemoved, filter)
	}
}
