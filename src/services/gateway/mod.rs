//! Chain gateway: the engine's view of a blockchain node.
//!
//! - [`transports`]: JSON-RPC over HTTP with endpoint rotation
//! - [`EvmClient`]: typed RPC calls
//! - [`EvmGateway`]: connection state, block listeners, log subscriptions and the EVENT lane
//! - [`GatewayPool`]: gateways by node name

mod client;
mod error;
mod gateway;
mod handle;
mod listener;
mod pool;
mod revert;
pub mod transports;

pub use client::{BlockChainClient, EvmClient};
pub use error::GatewayError;
pub use gateway::{fetch_block, poll_receipt, ChainGateway, EvmGateway};
pub use handle::{Disposable, SubscriptionHandle, TaskHandle};
pub use listener::{BlockListener, BlockListeners, ContractEventListener};
pub use pool::GatewayPool;
pub use revert::decode_revert_reason;
