use crate::key::Key;
use core::fmt;
use futures::{future::BoxFuture, FutureExt};
use hashbrown::HashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Structured payload of an inbound event, as sent by the remote side.
pub type EventPayload = Value;

pub type HandlerResult = anyhow::Result<()>;

type Plain<S> = dyn Fn(&mut S) -> HandlerResult + Send + Sync;
type WithEvent<S> = dyn Fn(&mut S, Option<EventPayload>) -> HandlerResult + Send + Sync;
type Async<S> = dyn for<'a> Fn(&'a mut S) -> BoxFuture<'a, HandlerResult> + Send + Sync;
type AsyncWithEvent<S> = dyn for<'a> Fn(&'a mut S, Option<EventPayload>) -> BoxFuture<'a, HandlerResult> + Send + Sync;

/// A callback bound to an [`EventBinding`](`crate::Keyhole::EventBinding`) keyhole.
///
/// Handlers receive exclusive access to the session state. Asynchronous variants keep that access while suspended,
/// which is what keeps further events of the same session waiting.
pub enum Handler<S> {
	Plain(Arc<Plain<S>>),
	WithEvent(Arc<WithEvent<S>>),
	Async(Arc<Async<S>>),
	AsyncWithEvent(Arc<AsyncWithEvent<S>>),
}

impl<S> Clone for Handler<S> {
	fn clone(&self) -> Self {
		match self {
			Self::Plain(f) => Self::Plain(Arc::clone(f)),
			Self::WithEvent(f) => Self::WithEvent(Arc::clone(f)),
			Self::Async(f) => Self::Async(Arc::clone(f)),
			Self::AsyncWithEvent(f) => Self::AsyncWithEvent(Arc::clone(f)),
		}
	}
}

impl<S> fmt::Debug for Handler<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Plain(_) => "Handler::Plain",
			Self::WithEvent(_) => "Handler::WithEvent",
			Self::Async(_) => "Handler::Async",
			Self::AsyncWithEvent(_) => "Handler::AsyncWithEvent",
		})
	}
}

impl<S> Handler<S> {
	pub fn new(handler: impl Fn(&mut S) -> HandlerResult + Send + Sync + 'static) -> Self {
		Self::Plain(Arc::new(handler))
	}

	pub fn with_event(handler: impl Fn(&mut S, Option<EventPayload>) -> HandlerResult + Send + Sync + 'static) -> Self {
		Self::WithEvent(Arc::new(handler))
	}

	pub fn future<F>(handler: F) -> Self
	where
		F: for<'a> Fn(&'a mut S) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
	{
		Self::Async(Arc::new(handler))
	}

	pub fn future_with_event<F>(handler: F) -> Self
	where
		F: for<'a> Fn(&'a mut S, Option<EventPayload>) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
	{
		Self::AsyncWithEvent(Arc::new(handler))
	}

	#[must_use]
	pub fn is_async(&self) -> bool {
		matches!(self, Self::Async(_) | Self::AsyncWithEvent(_))
	}

	/// Runs the handler. Synchronous variants only run once the returned future is polled.
	pub fn invoke<'a>(&'a self, state: &'a mut S, payload: Option<EventPayload>) -> BoxFuture<'a, HandlerResult>
	where
		S: Send,
	{
		match self {
			Self::Plain(handler) => async move { handler(state) }.boxed(),
			Self::WithEvent(handler) => async move { handler(state, payload) }.boxed(),
			Self::Async(handler) => handler(state),
			Self::AsyncWithEvent(handler) => handler(state, payload),
		}
	}
}

/// Handlers of one render, keyed by the [`Key`] of their event binding.
pub struct HandlerTable<S>(HashMap<Key, Handler<S>>);

impl<S> Default for HandlerTable<S> {
	fn default() -> Self {
		Self(HashMap::new())
	}
}

impl<S> fmt::Debug for HandlerTable<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.0.keys()).finish()
	}
}

impl<S> HandlerTable<S> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn bind(&mut self, key: Key, handler: Handler<S>) {
		trace!(%key, "Bound handler.");
		let replaced = self.0.insert(key, handler);
		// Keys are unique per render.
		debug_assert!(replaced.is_none());
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&Handler<S>> {
		self.0.get(key)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
