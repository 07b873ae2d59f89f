//! Chain data as read from a node's JSON-RPC interface.

mod block;
mod receipt;
mod transaction;

pub use block::{Block, BlockHead, RpcBlock, RpcBlockHeader};
pub use receipt::{ContractLog, TransactionReceipt};
pub use transaction::Transaction;
