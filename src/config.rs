use serde::{Deserialize, Serialize};

/// Tuning knobs of the engine.
///
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// How deep the differ descends into nested lists before giving up.
	pub depth_limit: usize,
	/// Idle buffers kept by a snapshot pool.
	pub pool_retain: usize,
	/// Buffers returned with more keyhole capacity than this are logged.
	pub pool_capacity_warning: usize,
	/// Capacity of a session's inbound event queue.
	pub event_queue: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			depth_limit: 64,
			pool_retain: 32,
			pool_capacity_warning: 16384,
			event_queue: 64,
		}
	}
}

impl EngineConfig {
	/// # Errors
	///
	/// Iff `json` is not a JSON object with fields of the right types.
	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}

	#[must_use]
	pub fn differ(&self) -> crate::Differ {
		crate::Differ::new(self.depth_limit)
	}

	#[must_use]
	pub fn pool(&self) -> crate::SnapshotPool {
		crate::SnapshotPool::new(self.pool_retain, self.pool_capacity_warning)
	}
}
