//! Contract event listeners attached to every filter subscription.

use async_trait::async_trait;
use futures::FutureExt;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::{error, warn};

use crate::{
	models::ContractEventDetails,
	services::{
		gateway::ContractEventListener,
		subscription::{EventBlockManagementService, EventStore},
	},
};

/// Records matched events so a later registration resumes after them
pub struct EventRecordingListener {
	store: Arc<dyn EventStore>,
	block_management: Arc<EventBlockManagementService>,
}

impl EventRecordingListener {
	pub fn new(
		store: Arc<dyn EventStore>,
		block_management: Arc<EventBlockManagementService>,
	) -> Self {
		Self {
			store,
			block_management,
		}
	}
}

#[async_trait]
impl ContractEventListener for EventRecordingListener {
	async fn on_event(&self, details: ContractEventDetails) -> Result<(), anyhow::Error> {
		self.block_management
			.update_latest_block(
				&details.event_specification_signature,
				details.address,
				details.block_number,
			)
			.await;
		self.store.save_contract_event(&details).await?;
		Ok(())
	}
}

/// Hands each event to every inner listener; one failing listener does not stop the others
pub struct FanOutEventListener {
	listeners: Vec<Arc<dyn ContractEventListener>>,
}

impl FanOutEventListener {
	pub fn new(listeners: Vec<Arc<dyn ContractEventListener>>) -> Self {
		Self { listeners }
	}
}

#[async_trait]
impl ContractEventListener for FanOutEventListener {
	async fn on_event(&self, details: ContractEventDetails) -> Result<(), anyhow::Error> {
		for listener in &self.listeners {
			match AssertUnwindSafe(listener.on_event(details.clone()))
				.catch_unwind()
				.await
			{
				Ok(Ok(())) => {}
				Ok(Err(e)) => warn!(event = %details.id(), error = %e, "event listener failed"),
				Err(_) => error!(event = %details.id(), "event listener panicked"),
			}
		}
		Ok(())
	}
}
