use alloy::primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

fn default_node() -> String {
	"default".to_string()
}

/// Position and solidity type of an event parameter
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct ParameterDefinition {
	pub position: u32,
	#[serde(rename = "type")]
	pub type_: String,
}

/// Name and parameter layout of a contract event
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct ContractEventSpecification {
	pub event_name: String,
	#[serde(default)]
	pub indexed_parameter_definitions: Vec<ParameterDefinition>,
	#[serde(default)]
	pub non_indexed_parameter_definitions: Vec<ParameterDefinition>,
}

impl ContractEventSpecification {
	/// Canonical signature, e.g. `Transfer(address,address,uint256)`.
	///
	/// Indexed and non-indexed parameters are merged and ordered by position.
	pub fn signature(&self) -> String {
		let mut parameters: Vec<&ParameterDefinition> = self
			.indexed_parameter_definitions
			.iter()
			.chain(self.non_indexed_parameter_definitions.iter())
			.collect();
		parameters.sort_by_key(|p| p.position);

		let types: Vec<&str> = parameters.iter().map(|p| p.type_.as_str()).collect();
		format!("{}({})", self.event_name, types.join(","))
	}

	/// Keccak-256 of the signature, i.e. the log's first topic
	pub fn topic(&self) -> B256 {
		keccak256(self.signature().as_bytes())
	}

	/// Lower-case `0x` hex of [`Self::topic`]
	pub fn signature_hash(&self) -> String {
		format!("{:#x}", self.topic())
	}
}

/// A contract event the engine should follow.
///
/// The id is the primary key. It is generated at registration when absent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContractEventFilter {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default = "default_node")]
	pub node: String,
	pub contract_address: Address,
	pub event_specification: ContractEventSpecification,
	#[serde(default)]
	pub start_block: Option<u64>,
}

impl ContractEventFilter {
	pub fn id(&self) -> &str {
		self.id.as_deref().unwrap_or_default()
	}
}
