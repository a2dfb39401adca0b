//! Logical wire shape of outbound batches and inbound events.
//!
//! The byte encoding belongs to the transport. What's fixed here is the grouping (one [`Message`] per batch)
//! and the argument list of each [`Notification`].

use crate::{error::TransportError, key::Key, op::MutationOp};
use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `target.operation(args...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub target: String,
	pub operation: String,
	pub args: Vec<Value>,
}

impl From<&MutationOp> for Notification {
	fn from(op: &MutationOp) -> Self {
		let transition = |transition: Option<&'static str>| transition.map_or(Value::Null, |name| Value::String(name.to_owned()));
		let args = match op {
			MutationOp::SetTextNode { value, .. } => vec![Value::String(value.clone())],
			MutationOp::SetAttribute { name, value, .. } => vec![Value::String((*name).to_owned()), Value::String(value.clone())],
			MutationOp::SetElement { subtree, transition: t, .. } => vec![Value::String(subtree.markup()), transition(*t)],
			MutationOp::AddElement {
				after, key, subtree, transition: t, ..
			} => vec![
				after.as_ref().map_or(Value::Null, |after| Value::String(after.to_string())),
				Value::String(key.to_string()),
				Value::String(subtree.markup()),
				transition(*t),
			],
			MutationOp::RemoveElement { transition: t, .. } => vec![transition(*t)],
			MutationOp::MoveElement { from, to, .. } => vec![Value::from(*from), Value::from(*to)],
		};
		Self {
			target: op.target().to_string(),
			operation: op.operation().to_owned(),
			args,
		}
	}
}

impl fmt::Display for Notification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}(", self.target, self.operation)?;
		for (i, arg) in self.args.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{}", arg)?;
		}
		f.write_str(")")
	}
}

/// All notifications of one committed batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
	pub notifications: Vec<Notification>,
}

impl Message {
	#[must_use]
	pub fn from_operations(operations: &[MutationOp]) -> Self {
		Self {
			notifications: operations.iter().map(Notification::from).collect(),
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.notifications.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.notifications.is_empty()
	}

	/// # Errors
	///
	/// Iff serialization fails, which can't happen for well-formed notifications.
	pub fn to_json(&self) -> Result<String, TransportError> {
		Ok(serde_json::to_string(self)?)
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for notification in &self.notifications {
			writeln!(f, "{}", notification)?;
		}
		Ok(())
	}
}

/// An interaction reported by the remote side, addressed to an event binding by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
	pub key: Key,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
}

impl InboundEvent {
	pub fn new(key: impl Into<Key>, payload: Option<Value>) -> Self {
		Self { key: key.into(), payload }
	}

	/// # Errors
	///
	/// Iff `json` isn't an object with a string `key` and an optional `payload`.
	pub fn from_json(json: &str) -> Result<Self, TransportError> {
		Ok(serde_json::from_str(json)?)
	}
}
