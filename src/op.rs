use crate::{key::Key, snapshot::Fragment};

/// One targeted change to the remote view.
///
/// List positions (`from`/`to`) refer to the list as it stands when the operation is applied,
/// i.e. after every earlier operation of the same batch.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
	SetTextNode {
		key: Key,
		value: String,
	},
	/// `value` is the rendered attribute value markup.
	SetAttribute {
		key: Key,
		name: &'static str,
		value: String,
	},
	SetElement {
		key: Key,
		subtree: Fragment,
		transition: Option<&'static str>,
	},
	/// Inserts item `key` into `list` directly after `after`, or at the start of the list if there is no anchor.
	AddElement {
		list: Key,
		after: Option<Key>,
		key: Key,
		subtree: Fragment,
		transition: Option<&'static str>,
	},
	RemoveElement {
		key: Key,
		transition: Option<&'static str>,
	},
	MoveElement {
		key: Key,
		from: usize,
		to: usize,
	},
}

impl MutationOp {
	/// The keyhole this operation is about. For [`MutationOp::AddElement`], that's the new item.
	#[must_use]
	pub fn key(&self) -> &Key {
		match self {
			Self::SetTextNode { key, .. } | Self::SetAttribute { key, .. } | Self::SetElement { key, .. } | Self::AddElement { key, .. } | Self::RemoveElement { key, .. } | Self::MoveElement { key, .. } => key,
		}
	}

	/// The keyhole the operation is addressed to on the wire.
	#[must_use]
	pub fn target(&self) -> &Key {
		match self {
			Self::AddElement { list, .. } => list,
			_ => self.key(),
		}
	}

	/// Wire name of the operation.
	#[must_use]
	pub fn operation(&self) -> &'static str {
		match self {
			Self::SetTextNode { .. } => "setTextNode",
			Self::SetAttribute { .. } => "setAttribute",
			Self::SetElement { .. } => "setElement",
			Self::AddElement { .. } => "addElement",
			Self::RemoveElement { .. } => "removeElement",
			Self::MoveElement { .. } => "moveElement",
		}
	}

	#[must_use]
	pub fn transition(&self) -> Option<&'static str> {
		match *self {
			Self::SetElement { transition, .. } | Self::AddElement { transition, .. } | Self::RemoveElement { transition, .. } => transition,
			Self::SetTextNode { .. } | Self::SetAttribute { .. } | Self::MoveElement { .. } => None,
		}
	}
}
