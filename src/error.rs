//! Error taxonomy.
//!
//! | Error | Cause | Consequence |
//! |---|---|---|
//! | [`ComposeError`] | The template front end broke the scope protocol or reused a list key | The session is faulted |
//! | [`DiffError`] | Two snapshots of one template differ in static shape | The session is faulted |
//! | [`TransportError`] | The outbound batch could not be handed to the transport | The batch is not delivered, a re-mount is required |
//!
//! Handler failures are not errors of the engine: they are logged where the handler is invoked and the cycle continues.

use crate::{key::Key, snapshot::KeyholeKind};
use core::fmt;
use thiserror::Error;

/// The front end violated the composer contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
	#[error("`{call}` was called outside of any scope")]
	NoScope { call: &'static str },

	#[error("more {what} appended than the {announced} announced by the enclosing scope")]
	ScopeOverflow { what: &'static str, announced: usize },

	#[error("scope closed with {literals} literal(s) and {holes} hole(s) still outstanding")]
	UnterminatedScope { literals: usize, holes: usize },

	#[error("a scope was entered while another one is open, without reserving a hole for it")]
	UnexpectedScope,

	#[error("nested template for {key} did not enter a scope")]
	MissingScope { key: Key },

	#[error("the render already completed; start a new one with a fresh composer")]
	Detached,

	#[error("duplicate item key {item} in list {list}")]
	DuplicateKey { list: Key, item: Key },

	#[error("{kind} is not allowed inside attribute {key}")]
	AttributeContent { key: Key, kind: KeyholeKind },

	#[error("the output sink failed")]
	Sink(#[from] fmt::Error),
}

/// Two snapshots could not be compared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
	#[error("root length changed from {previous} to {next}")]
	RootLengthMismatch { previous: usize, next: usize },

	#[error("shape mismatch at {at}: {detail}")]
	ShapeMismatch { at: String, detail: String },

	#[error("duplicate item key {item} in list {list}")]
	DuplicateKey { list: Key, item: Key },

	#[error("depth limit reached at {at}")]
	DepthLimit { at: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("the connection is closed")]
	Closed,

	#[error("the transport rejected the message: {0}")]
	Rejected(String),

	#[error("failed to encode the message")]
	Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
	#[error(transparent)]
	Compose(#[from] ComposeError),

	#[error(transparent)]
	Diff(#[from] DiffError),

	#[error("batch not delivered")]
	Undelivered(#[source] TransportError),

	#[error("the session has no mounted view")]
	NotMounted,

	#[error("the session is faulted by an earlier contract violation")]
	Faulted,

	#[error("the session is closed")]
	Closed,

	#[error("the session's event queue is full")]
	QueueFull,
}

impl SessionError {
	/// Contract violations leave the session unusable. Everything else can be recovered from by re-mounting.
	#[must_use]
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Compose(_) | Self::Diff(_) | Self::Faulted | Self::Closed)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
	#[error("no {expected} keyed {key}")]
	UnknownKey { key: Key, expected: &'static str },

	#[error("{key} is not at index {index} of its list")]
	IndexMismatch { key: Key, index: usize },

	#[error("index {index} is out of range for list {list}")]
	IndexOutOfRange { list: Key, index: usize },
}
