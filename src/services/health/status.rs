use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a node as seen by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
	Connected,
	#[default]
	Subscribed,
	Down,
}

impl NodeStatus {
	/// Value reported by the `node_status` gauge
	pub fn gauge_value(&self) -> f64 {
		match self {
			Self::Down => 0.0,
			Self::Connected => 1.0,
			Self::Subscribed => 2.0,
		}
	}
}

impl fmt::Display for NodeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Connected => write!(f, "CONNECTED"),
			Self::Subscribed => write!(f, "SUBSCRIBED"),
			Self::Down => write!(f, "DOWN"),
		}
	}
}
