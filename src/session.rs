//! One logical session: the state it owns and the render → diff → commit cycle that keeps the remote view in step with it.

use crate::{
	batch::{Delivery, MutationBatch},
	compose::{capture, Render, Template},
	config::EngineConfig,
	diff::Differ,
	error::SessionError,
	handler::HandlerResult,
	key::Key,
	pool::SnapshotPool,
	snapshot::Snapshot,
	transport::Transport,
	wire::InboundEvent,
};
use core::{any::Any, fmt, panic::AssertUnwindSafe};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// Where a session is in its cycle.
///
/// `Idle → EventReceived → HandlerInvoked | AwaitingHandler → Reconciling → Committing → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	EventReceived,
	/// A synchronous handler is running.
	HandlerInvoked,
	/// An asynchronous handler is suspended. Further events wait.
	AwaitingHandler,
	Reconciling,
	Committing,
	/// A contract violation occurred. Only closing is possible.
	Faulted,
	Closed,
}

/// How a cycle ended, if it didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// No handler is bound to the event's key (anymore). Nothing was rendered.
	Unbound,
	Committed(Delivery),
}

/// A view bound to its state and its connection.
///
/// A session runs at most one cycle at a time since every cycle needs `&mut self`.
/// Use a [`SessionRunner`](`crate::SessionRunner`) to queue events for it.
pub struct Session<S, T> {
	id: SessionId,
	state: S,
	view: Arc<dyn Template<S> + Send + Sync>,
	transport: T,
	pool: SnapshotPool,
	differ: Differ,
	previous: Option<Render<S>>,
	phase: Phase,
}

impl<S, T> fmt::Debug for Session<S, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("phase", &self.phase)
			.field("mounted", &self.previous.is_some())
			.finish_non_exhaustive()
	}
}

impl<S, T: Transport> Session<S, T> {
	/// Creates an unmounted session. Buffers are rented from `pool`, which may be shared with other sessions.
	pub fn new(state: S, view: Arc<dyn Template<S> + Send + Sync>, transport: T, config: &EngineConfig, pool: SnapshotPool) -> Self {
		let id = SessionId::new();
		debug!(%id, "Session created.");
		Self {
			id,
			state,
			view,
			transport,
			pool,
			differ: config.differ(),
			previous: None,
			phase: Phase::Idle,
		}
	}

	#[must_use]
	pub fn id(&self) -> SessionId {
		self.id
	}

	#[must_use]
	pub fn state(&self) -> &S {
		&self.state
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		self.phase
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.previous.is_some()
	}

	/// The snapshot the remote view is assumed to reflect.
	#[must_use]
	pub fn snapshot(&self) -> Option<&Snapshot> {
		self.previous.as_ref().map(|previous| &previous.snapshot)
	}

	#[must_use]
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Captures a full render and returns its markup, which the remote view must be (re)initialized with.
	///
	/// This is also how a session recovers from [`SessionError::Undelivered`].
	///
	/// # Errors
	///
	/// If the session is faulted or closed, or the view violates the composer contract (which faults the session).
	#[instrument(skip(self), fields(id = %self.id))]
	pub fn mount(&mut self) -> Result<String, SessionError> {
		self.ensure_usable()?;
		let render = match capture(&*self.view, &self.state, &self.pool) {
			Ok(render) => render,
			Err(error) => return Err(self.fault(error.into())),
		};
		let markup = render.snapshot.markup();
		if cfg!(feature = "dangerous-logging") {
			trace!(%markup, "Mounted.");
		}
		info!(keyholes = render.snapshot.len(), handlers = render.handlers.len(), "Session mounted.");
		// Replacing the previous render returns its buffer to the pool.
		self.previous = Some(render);
		self.phase = Phase::Idle;
		Ok(markup)
	}

	/// Runs the handler bound to `event.key`, then reconciles and commits.
	///
	/// Handler errors and panics are logged and don't abort the cycle: the view is reconciled either way.
	///
	/// # Errors
	///
	/// If the session isn't mounted, is faulted or closed, if the view violates the composer contract or yields an incomparable shape (which faults the session),
	/// or if the transport fails (which unmounts it).
	#[instrument(skip(self, event), fields(id = %self.id, key = %event.key))]
	pub async fn dispatch(&mut self, event: InboundEvent) -> Result<Outcome, SessionError>
	where
		S: Send,
	{
		self.ensure_usable()?;
		self.phase = Phase::EventReceived;
		let handler = match &self.previous {
			None => {
				self.phase = Phase::Idle;
				return Err(SessionError::NotMounted);
			}
			Some(previous) => previous.handlers.get(event.key.as_str()).cloned(),
		};
		let handler = match handler {
			Some(handler) => handler,
			None => {
				warn!("No handler bound to {}. Was the event sent for an outdated view?", event.key);
				self.phase = Phase::Idle;
				return Ok(Outcome::Unbound);
			}
		};

		self.phase = if handler.is_async() { Phase::AwaitingHandler } else { Phase::HandlerInvoked };
		if cfg!(feature = "dangerous-logging") {
			trace!(payload = ?event.payload, "Invoking handler.");
		} else {
			trace!("Invoking handler.");
		}
		let result = AssertUnwindSafe(handler.invoke(&mut self.state, event.payload)).catch_unwind().await;
		report(&event.key, result);

		self.reconcile().map(Outcome::Committed)
	}

	/// Mutates the state outside of any event, then reconciles and commits.
	///
	/// # Errors
	///
	/// See [`Session::dispatch`].
	#[instrument(skip(self, update), fields(id = %self.id))]
	pub fn update(&mut self, update: impl FnOnce(&mut S)) -> Result<Delivery, SessionError> {
		self.ensure_usable()?;
		if self.previous.is_none() {
			return Err(SessionError::NotMounted);
		}
		update(&mut self.state);
		self.reconcile()
	}

	/// Ends the session. The previous snapshot's buffer goes back to the pool.
	pub fn close(&mut self) {
		if self.phase != Phase::Closed {
			debug!(id = %self.id, phase = ?self.phase, "Session closed.");
		}
		self.previous = None;
		self.phase = Phase::Closed;
	}

	fn ensure_usable(&self) -> Result<(), SessionError> {
		match self.phase {
			Phase::Closed => Err(SessionError::Closed),
			Phase::Faulted => Err(SessionError::Faulted),
			_ => Ok(()),
		}
	}

	fn fault(&mut self, error: SessionError) -> SessionError {
		error!("Session {} faulted: {}", self.id, error);
		self.phase = Phase::Faulted;
		error
	}

	fn reconcile(&mut self) -> Result<Delivery, SessionError> {
		self.phase = Phase::Reconciling;
		let render = match capture(&*self.view, &self.state, &self.pool) {
			Ok(render) => render,
			Err(error) => return Err(self.fault(error.into())),
		};
		let diffed = match &self.previous {
			Some(previous) => self.differ.diff(&previous.snapshot, &render.snapshot),
			None => {
				self.phase = Phase::Idle;
				return Err(SessionError::NotMounted);
			}
		};
		let operations = match diffed {
			Ok(operations) => operations,
			Err(error) => return Err(self.fault(error.into())),
		};

		self.phase = Phase::Committing;
		let committed = {
			let mut batch = MutationBatch::open(&mut self.transport);
			batch.extend(operations);
			batch.commit()
		};
		self.phase = Phase::Idle;
		match committed {
			Ok(delivery) => {
				// The swap returns the old buffer to the pool.
				self.previous = Some(render);
				info!(
					?delivery,
					pool.idle = self.pool.idle(),
					pool.retained_capacity = self.pool.retained_capacity(),
					"Cycle committed."
				);
				Ok(delivery)
			}
			Err(error) => {
				warn!("Batch not delivered, a re-mount is required: {}", error);
				self.previous = None;
				Err(SessionError::Undelivered(error))
			}
		}
	}
}

fn report(key: &Key, result: Result<HandlerResult, Box<dyn Any + Send>>) {
	match result {
		Ok(Ok(())) => trace!("Handler completed."),
		Ok(Err(error)) => error!("Handler for {} failed: {:#}", key, error),
		Err(panic) => error!("Handler for {} panicked: {}", key, panic_message(&*panic)),
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&'static str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message
	} else {
		"(non-string panic payload)"
	}
}
