//! Builders for test blocks, transactions and receipts.
//!
//! Hashes are derived from numbers so tests can build a canonical chain (`hash_for(n)`)
//! and a fork of it (`fork_hash_for(n)`).

use alloy::primitives::{Address, Bytes, B256, U256, U64};

use crate::models::{Block, BlockHead, ContractLog, Transaction, TransactionReceipt};

/// Canonical hash of block `number`
pub fn hash_for(number: u64) -> B256 {
	B256::left_padding_from(&number.to_be_bytes())
}

/// Hash of block `number` on a competing fork
pub fn fork_hash_for(number: u64) -> B256 {
	let mut hash = hash_for(number);
	hash.0[0] = 0xff;
	hash
}

pub struct BlockBuilder {
	block: Block,
}

impl BlockBuilder {
	pub fn new(number: u64) -> Self {
		Self {
			block: Block {
				hash: hash_for(number),
				parent_hash: hash_for(number.saturating_sub(1)),
				number,
				timestamp: 1_700_000_000 + number,
				node_name: "test_node".to_string(),
				transactions: vec![],
			},
		}
	}

	pub fn hash(mut self, hash: B256) -> Self {
		self.block.hash = hash;
		self
	}

	pub fn node(mut self, node: &str) -> Self {
		self.block.node_name = node.to_string();
		self
	}

	pub fn transaction(mut self, transaction: Transaction) -> Self {
		let mut transaction = transaction;
		transaction.block_hash = Some(self.block.hash);
		transaction.block_number = Some(U64::from(self.block.number));
		transaction.transaction_index = Some(U64::from(self.block.transactions.len()));
		self.block.transactions.push(transaction);
		self
	}

	pub fn build(self) -> Block {
		self.block
	}

	pub fn head(self) -> BlockHead {
		BlockHead::from(&self.block)
	}
}

pub struct TransactionBuilder {
	transaction: Transaction,
}

impl TransactionBuilder {
	pub fn new(hash: B256) -> Self {
		Self {
			transaction: Transaction {
				hash,
				from: Address::repeat_byte(0x01),
				to: Some(Address::repeat_byte(0x02)),
				value: U256::from(1u64),
				..Default::default()
			},
		}
	}

	pub fn from(mut self, from: Address) -> Self {
		self.transaction.from = from;
		self
	}

	pub fn to(mut self, to: Option<Address>) -> Self {
		self.transaction.to = to;
		self
	}

	pub fn input(mut self, input: Bytes) -> Self {
		self.transaction.input = input;
		self
	}

	pub fn build(self) -> Transaction {
		self.transaction
	}
}

pub struct ReceiptBuilder {
	receipt: TransactionReceipt,
}

impl ReceiptBuilder {
	/// Successful receipt of `tx_hash` included in the canonical block `block_number`
	pub fn new(tx_hash: B256, block_number: u64) -> Self {
		Self {
			receipt: TransactionReceipt {
				transaction_hash: tx_hash,
				block_hash: hash_for(block_number),
				block_number: U64::from(block_number),
				status: Some(U64::from(1)),
				..Default::default()
			},
		}
	}

	pub fn block_hash(mut self, hash: B256) -> Self {
		self.receipt.block_hash = hash;
		self
	}

	pub fn status(mut self, status: Option<u64>) -> Self {
		self.receipt.status = status.map(U64::from);
		self
	}

	pub fn contract_address(mut self, address: Address) -> Self {
		self.receipt.contract_address = Some(address);
		self
	}

	pub fn build(self) -> TransactionReceipt {
		self.receipt
	}
}

/// Log of `tx_hash` at `log_index`, emitted by `address` in the canonical block `block_number`
pub fn log_for(address: Address, topic: B256, tx_hash: B256, block_number: u64, log_index: u64) -> ContractLog {
	ContractLog {
		address,
		topics: vec![topic],
		data: Bytes::new(),
		block_hash: Some(hash_for(block_number)),
		block_number: Some(U64::from(block_number)),
		transaction_hash: Some(tx_hash),
		transaction_index: Some(U64::ZERO),
		log_index: Some(U64::from(log_index)),
		removed: false,
	}
}
