//! Per-session task with a FIFO event queue.
//!
//! ```text
//!                         ┌──────────────────────────┐
//!                         │      SessionRunner       │
//! SessionHandle           │                          │
//!   on_event() ─────────► │  events ◄── mpsc (FIFO)  │
//!   close() ────────────► │  closed ◄── watch        │
//!                         │         │                │
//!                         │         ▼                │
//!                         │  Session::dispatch()     │
//!                         │         │                │
//!                         │         ▼                │
//!                         │  Transport::send() ──────┼──► remote
//!                         └──────────────────────────┘
//! ```
//!
//! Events of one session are dispatched strictly one after another. Runners of different sessions share nothing but the snapshot pool.

use crate::{
	config::EngineConfig,
	error::SessionError,
	session::{Outcome, Session, SessionId},
	transport::Transport,
	wire::InboundEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Handle for feeding events into a [`SessionRunner`] and closing it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
	id: SessionId,
	events: mpsc::Sender<InboundEvent>,
	closed: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
	#[must_use]
	pub fn id(&self) -> SessionId {
		self.id
	}

	/// Queues `event`, waiting while the queue is full.
	///
	/// # Errors
	///
	/// [`SessionError::Closed`] if the runner has stopped.
	pub async fn on_event(&self, event: InboundEvent) -> Result<(), SessionError> {
		self.events.send(event).await.map_err(|_| SessionError::Closed)
	}

	/// Queues `event` without waiting.
	///
	/// # Errors
	///
	/// [`SessionError::QueueFull`] if the queue is at capacity, [`SessionError::Closed`] if the runner has stopped.
	pub fn try_on_event(&self, event: InboundEvent) -> Result<(), SessionError> {
		self.events.try_send(event).map_err(|error| match error {
			mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
			mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
		})
	}

	/// Signals that the connection is gone. A cycle in flight is abandoned and queued events are dropped.
	pub fn close(&self) {
		debug!("SessionHandle {}: close requested", self.id);
		// The runner holds a clone of the sender, so this only fails once it is gone anyway.
		let _ = self.closed.send(true);
	}

	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.events.is_closed()
	}
}

/// Drives one [`Session`] from its event queue, in its own task.
pub struct SessionRunner<S, T> {
	session: Session<S, T>,
	events: mpsc::Receiver<InboundEvent>,
	closed: watch::Receiver<bool>,
	/// Keeps `closed` from reporting a dropped sender.
	_close_signal: Arc<watch::Sender<bool>>,
}

impl<S, T> SessionRunner<S, T>
where
	S: Send + 'static,
	T: Transport + Send + 'static,
{
	/// Wraps a (usually already mounted) session.
	#[must_use]
	pub fn new(session: Session<S, T>, config: &EngineConfig) -> (Self, SessionHandle) {
		let (event_tx, event_rx) = mpsc::channel(config.event_queue.max(1));
		let (close_tx, close_rx) = watch::channel(false);
		let close_tx = Arc::new(close_tx);
		let handle = SessionHandle {
			id: session.id(),
			events: event_tx,
			closed: Arc::clone(&close_tx),
		};
		let runner = Self {
			session,
			events: event_rx,
			closed: close_rx,
			_close_signal: close_tx,
		};
		(runner, handle)
	}

	#[must_use]
	pub fn id(&self) -> SessionId {
		self.session.id()
	}

	/// Processes events until the handle closes the session, every handle is dropped,
	/// the session faults or a batch can't be delivered.
	///
	/// Returns the session: unmounted if a batch couldn't be delivered (so it can be re-mounted on reconnect), closed otherwise.
	pub async fn run(mut self) -> Session<S, T> {
		let id = self.session.id();
		info!("SessionRunner {} started", id);
		let mut undelivered = false;

		loop {
			let event = tokio::select! {
				// Priority: closing first
				biased;

				_ = self.closed.changed() => {
					info!("SessionRunner {}: closed", id);
					break;
				}

				event = self.events.recv() => match event {
					Some(event) => event,
					None => {
						info!("SessionRunner {}: event channel closed", id);
						break;
					}
				},
			};

			let outcome = tokio::select! {
				biased;

				_ = self.closed.changed() => {
					info!("SessionRunner {}: closed mid-cycle, abandoning it", id);
					break;
				}

				outcome = self.session.dispatch(event) => outcome,
			};

			match outcome {
				Ok(Outcome::Unbound) => debug!("SessionRunner {}: event ignored", id),
				Ok(Outcome::Committed(delivery)) => debug!("SessionRunner {}: {:?}", id, delivery),
				Err(error @ SessionError::Undelivered(_)) => {
					warn!("SessionRunner {}: {}. Stopping until re-mounted.", id, error);
					undelivered = true;
					break;
				}
				Err(error) if error.is_fatal() => {
					error!("SessionRunner {}: {}", id, error);
					break;
				}
				Err(error) => warn!("SessionRunner {}: {}", id, error),
			}
		}

		self.events.close();
		if !undelivered {
			self.session.close();
		}
		info!("SessionRunner {} stopped", id);
		self.session
	}
}
