use crate::properties::strategies::parameters_strategy;

use alloy::primitives::keccak256;
use block_confirmation_monitor::{
	models::ContractEventSpecification,
	services::subscription::select_start_block,
};
use proptest::{prelude::*, test_runner::Config};

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	// The signature lists parameter types by position whichever of them are indexed
	#[test]
	fn test_signature_orders_parameters_by_position(
		name in "[A-Z][a-zA-Z]{0,15}",
		parameters in parameters_strategy(),
	) {
		let (indexed, non_indexed): (Vec<_>, Vec<_>) =
			parameters.iter().cloned().partition(|(_, indexed)| *indexed);
		let spec = ContractEventSpecification {
			event_name: name.clone(),
			indexed_parameter_definitions: indexed.into_iter().map(|(p, _)| p).collect(),
			non_indexed_parameter_definitions: non_indexed.into_iter().map(|(p, _)| p).collect(),
		};

		let mut by_position: Vec<_> = parameters.iter().map(|(p, _)| p.clone()).collect();
		by_position.sort_by_key(|p| p.position);
		let types: Vec<String> = by_position.into_iter().map(|p| p.type_).collect();
		let expected = format!("{}({})", name, types.join(","));

		prop_assert_eq!(spec.signature(), expected.clone());
		prop_assert_eq!(spec.topic(), keccak256(expected.as_bytes()));
		prop_assert_eq!(spec.signature_hash(), format!("{:#x}", spec.topic()));
	}

	// An event seen in this process always wins and resumes right after it
	#[test]
	fn test_start_block_after_seen_event(
		seen in 0u64..1_000_000,
		stored in proptest::option::of(0u64..1_000_000),
		current in 0u64..1_000_000,
		max_unsynced in 0u64..10_000,
	) {
		prop_assert_eq!(select_start_block(Some(seen), stored, current, max_unsynced), seen + 1);
	}

	// A stored event resumes after it, but never further back than the unsynced window
	#[test]
	fn test_start_block_after_stored_event(
		stored in 0u64..1_000_000,
		current in 0u64..1_000_000,
		max_unsynced in 0u64..10_000,
	) {
		let start = select_start_block(None, Some(stored), current, max_unsynced);
		prop_assert!(start > stored);
		prop_assert!(start >= current.saturating_sub(max_unsynced));
		prop_assert!(start == stored + 1 || start == current.saturating_sub(max_unsynced));
	}

	// Without history the filter starts at the current block
	#[test]
	fn test_start_block_without_history(
		current in 0u64..1_000_000,
		max_unsynced in 0u64..10_000,
	) {
		prop_assert_eq!(select_start_block(None, None, current, max_unsynced), current);
	}
}
