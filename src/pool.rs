use crate::snapshot::Keyhole;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{trace, warn};

/// Shared allocator for [`Snapshot`](`crate::Snapshot`) buffers.
///
/// Cloning yields another handle to the same pool. Renting and returning are safe from any thread,
/// which is the only state independent sessions share.
#[derive(Debug, Clone)]
pub struct SnapshotPool(Arc<Inner>);

#[derive(Debug)]
struct Inner {
	idle: Mutex<Vec<Vec<Keyhole>>>,
	retain: usize,
	capacity_warning: usize,
}

impl Default for SnapshotPool {
	fn default() -> Self {
		Self::new(32, 16 * 1024)
	}
}

impl SnapshotPool {
	/// Keeps at most `retain` idle buffers and warns when a returned buffer grew beyond `capacity_warning` keyholes.
	#[must_use]
	pub fn new(retain: usize, capacity_warning: usize) -> Self {
		Self(Arc::new(Inner {
			idle: Mutex::new(Vec::with_capacity(retain)),
			retain,
			capacity_warning,
		}))
	}

	/// Hands out an empty buffer, reusing an idle one if available.
	#[must_use]
	pub fn rent(&self) -> Vec<Keyhole> {
		let buffer = self.0.idle.lock().pop();
		match buffer {
			Some(buffer) => {
				debug_assert!(buffer.is_empty());
				trace!(capacity = buffer.capacity(), "Reusing pooled snapshot buffer.");
				buffer
			}
			None => Vec::new(),
		}
	}

	pub(crate) fn give_back(&self, mut buffer: Vec<Keyhole>) {
		// Cleared on return so no keys or values outlive their snapshot while idle.
		buffer.clear();
		if buffer.capacity() >= self.0.capacity_warning {
			warn!(
				"A returned snapshot buffer has a large capacity ({}).\n\
				This may point to an unexpectedly large or unbounded list in a template.",
				buffer.capacity()
			);
		}
		let mut idle = self.0.idle.lock();
		if idle.len() < self.0.retain {
			idle.push(buffer);
		}
	}

	/// Number of buffers currently waiting to be rented.
	#[must_use]
	pub fn idle(&self) -> usize {
		self.0.idle.lock().len()
	}

	/// Sum of the capacities of idle buffers, in keyholes.
	#[must_use]
	pub fn retained_capacity(&self) -> usize {
		self.0.idle.lock().iter().map(Vec::capacity).sum()
	}
}
