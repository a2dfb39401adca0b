//! Atomic commit of one diff pass.

use crate::{error::TransportError, op::MutationOp, transport::Transport, wire::Message};
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Open,
	Flushed,
	Discarded,
}

/// What a [`MutationBatch::commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	/// The batch was empty, so nothing was written.
	Empty,
	/// One message carrying all operations was handed to the transport.
	Sent { operations: usize },
	/// The batch had already been flushed or discarded before. Nothing was written.
	AlreadyFlushed,
}

/// Accumulates the operations of one diff pass and hands them to the transport as one [`Message`].
///
/// The batch flushes exactly once: on [`commit`](`MutationBatch::commit`), or when dropped while still open.
/// Further commits are no-ops. [`discard`](`MutationBatch::discard`) drops the operations without any write.
///
/// A batch mutably borrows its transport, so there can be at most one unflushed batch per transport at a time.
#[must_use = "a batch that isn't committed flushes on drop"]
pub struct MutationBatch<'t, T: Transport + ?Sized> {
	transport: &'t mut T,
	operations: Vec<MutationOp>,
	state: State,
}

impl<'t, T: Transport + ?Sized> MutationBatch<'t, T> {
	pub fn open(transport: &'t mut T) -> Self {
		Self {
			transport,
			operations: Vec::new(),
			state: State::Open,
		}
	}

	pub fn push(&mut self, operation: MutationOp) {
		debug_assert_eq!(self.state, State::Open);
		self.operations.push(operation);
	}

	pub fn extend(&mut self, operations: impl IntoIterator<Item = MutationOp>) {
		debug_assert_eq!(self.state, State::Open);
		self.operations.extend(operations);
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.operations.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.operations.is_empty()
	}

	#[must_use]
	pub fn operations(&self) -> &[MutationOp] {
		&self.operations
	}

	/// Flushes the batch as one message, unless it is empty or already flushed.
	///
	/// The batch counts as flushed even if the transport fails: it is never retried, since the remote state is unknown at that point.
	///
	/// # Errors
	///
	/// Iff the transport rejects the message. None of the operations count as delivered then.
	pub fn commit(&mut self) -> Result<Delivery, TransportError> {
		if self.state != State::Open {
			trace!("Batch already flushed. Skipping.");
			return Ok(Delivery::AlreadyFlushed);
		}
		self.state = State::Flushed;

		let operations = std::mem::take(&mut self.operations);
		if operations.is_empty() {
			trace!("Empty batch. Nothing to send.");
			return Ok(Delivery::Empty);
		}

		let message = Message::from_operations(&operations);
		if cfg!(feature = "dangerous-logging") {
			trace!(%message, "Flushing batch.");
		}
		self.transport.send(message)?;
		debug!(operations = operations.len(), "Batch flushed.");
		Ok(Delivery::Sent { operations: operations.len() })
	}

	/// Drops all operations without writing anything. A later commit is a no-op.
	pub fn discard(mut self) {
		if self.state == State::Open {
			debug!(operations = self.operations.len(), "Batch discarded.");
		}
		self.state = State::Discarded;
		self.operations.clear();
	}
}

impl<'t, T: Transport + ?Sized> Drop for MutationBatch<'t, T> {
	fn drop(&mut self) {
		// An unwinding cycle is abandoned, not committed.
		if self.state == State::Open && !std::thread::panicking() {
			if let Err(error) = self.commit() {
				error!("Batch flush on drop failed: {}", error);
			}
		}
	}
}
