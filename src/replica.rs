//! A model of the remote applier.
//!
//! [`Replica`] holds a pointer tree (unlike [`Snapshot`](`crate::Snapshot`)'s flat buffer) and applies [`MutationOp`]s the way the remote side does,
//! addressing everything by [`Key`]. Rendering it back to markup makes "applying `Diff(A, B)` to `A` yields `B`" checkable.

use crate::{
	error::ReplicaError,
	key::Key,
	markup,
	op::MutationOp,
	snapshot::{Keyhole, Range, Tree},
};
use core::fmt::{self, Write};
use tracing::{error, trace};

#[derive(Debug, Clone, PartialEq)]
enum Node {
	Literal(&'static str),
	Text { key: Key, text: String },
	Attribute { key: Key, name: &'static str, value: String },
	Event { key: Key, name: &'static str },
	Element { key: Key, children: Vec<Node> },
	List { key: Key, items: Vec<Node> },
}

impl Node {
	fn key(&self) -> Option<&Key> {
		match self {
			Self::Literal(_) => None,
			Self::Text { key, .. } | Self::Attribute { key, .. } | Self::Event { key, .. } | Self::Element { key, .. } | Self::List { key, .. } => Some(key),
		}
	}

	fn has_key(&self, key: &str) -> bool {
		self.key().map(Key::as_str) == Some(key)
	}
}

fn nodes(tree: Tree<'_>, range: Range) -> Vec<Node> {
	tree.children(range)
		.map(|(_, keyhole)| match keyhole {
			Keyhole::Literal(literal) => Node::Literal(*literal),
			Keyhole::Scalar { key, value, format } => Node::Text {
				key: key.clone(),
				text: value.to_formatted_string(*format),
			},
			Keyhole::Attribute { key, name, range } => Node::Attribute {
				key: key.clone(),
				name: *name,
				value: markup::attribute_value(tree, *range),
			},
			Keyhole::EventBinding { key, name } => Node::Event { key: key.clone(), name: *name },
			Keyhole::Element { key, range } => Node::Element {
				key: key.clone(),
				children: nodes(tree, *range),
			},
			Keyhole::List { key, range, .. } => Node::List {
				key: key.clone(),
				items: nodes(tree, *range),
			},
		})
		.collect()
}

fn find_mut<'a>(nodes: &'a mut [Node], key: &str) -> Option<&'a mut Node> {
	for node in nodes {
		if node.has_key(key) {
			return Some(node);
		}
		match node {
			Node::Element { children: nested, .. } | Node::List { items: nested, .. } => {
				if let Some(found) = find_mut(nested, key) {
					return Some(found);
				}
			}
			_ => (),
		}
	}
	None
}

fn find<'a>(nodes: &'a [Node], key: &str) -> Option<&'a Node> {
	nodes.iter().find_map(|node| {
		if node.has_key(key) {
			return Some(node);
		}
		match node {
			Node::Element { children: nested, .. } | Node::List { items: nested, .. } => find(nested, key),
			_ => None,
		}
	})
}

/// Finds the list that holds the item keyed `item`.
fn containing_list_mut<'a>(nodes: &'a mut [Node], item: &str) -> Option<(Key, &'a mut Vec<Node>)> {
	for node in nodes {
		match node {
			Node::List { key, items } => {
				if items.iter().any(|candidate| candidate.has_key(item)) {
					return Some((key.clone(), items));
				}
				if let Some(found) = containing_list_mut(items, item) {
					return Some(found);
				}
			}
			Node::Element { children, .. } => {
				if let Some(found) = containing_list_mut(children, item) {
					return Some(found);
				}
			}
			_ => (),
		}
	}
	None
}

fn write_nodes(nodes: &[Node], out: &mut dyn Write) -> fmt::Result {
	for node in nodes {
		match node {
			Node::Literal(literal) => out.write_str(literal)?,
			Node::Text { key, text } => markup::write_text(key, text, out)?,
			Node::Attribute { key, name, value } => markup::write_attribute(name, key, value, out)?,
			Node::Event { key, name } => markup::write_event_binding(name, key, out)?,
			Node::Element { key, children: nested } | Node::List { key, items: nested } => {
				markup::open_marker(key, out)?;
				write_nodes(nested, out)?;
				markup::close_marker(out)?;
			}
		}
	}
	Ok(())
}

fn unknown(key: &Key, expected: &'static str) -> ReplicaError {
	error!("Replica has no {} keyed {}", expected, key);
	ReplicaError::UnknownKey { key: key.clone(), expected }
}

/// Remote-side view model, initialized from a full render and updated only through [`MutationOp`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Replica {
	roots: Vec<Node>,
}

impl Replica {
	#[must_use]
	pub fn from_tree(tree: Tree<'_>) -> Self {
		Self { roots: nodes(tree, tree.all()) }
	}

	/// Applies `operations` in order, stopping at the first one that doesn't fit.
	///
	/// # Errors
	///
	/// See [`Replica::apply`].
	pub fn apply_all<'a>(&mut self, operations: impl IntoIterator<Item = &'a MutationOp>) -> Result<(), ReplicaError> {
		operations.into_iter().try_for_each(|operation| self.apply(operation))
	}

	/// # Errors
	///
	/// Iff `operation` addresses a key that doesn't exist (with the expected kind), or a [`MutationOp::MoveElement`]'s indices don't match.
	pub fn apply(&mut self, operation: &MutationOp) -> Result<(), ReplicaError> {
		trace!(operation = operation.operation(), key = %operation.key(), "Applying.");
		match operation {
			MutationOp::SetTextNode { key, value } => match find_mut(&mut self.roots, key.as_str()) {
				Some(Node::Text { text, .. }) => value.clone_into(text),
				_ => return Err(unknown(key, "text node")),
			},

			MutationOp::SetAttribute { key, name, value: new_value } => match find_mut(&mut self.roots, key.as_str()) {
				Some(Node::Attribute { name: current, value, .. }) if current == name => new_value.clone_into(value),
				_ => return Err(unknown(key, "attribute")),
			},

			MutationOp::SetElement { key, subtree, .. } => match find_mut(&mut self.roots, key.as_str()) {
				Some(Node::Element { children, .. }) => *children = nodes(subtree.tree(), subtree.tree().all()),
				_ => return Err(unknown(key, "element")),
			},

			MutationOp::AddElement { list, after, key, subtree, .. } => {
				let items = match find_mut(&mut self.roots, list.as_str()) {
					Some(Node::List { items, .. }) => items,
					_ => return Err(unknown(list, "list")),
				};
				let index = match after {
					None => 0,
					Some(after) => match items.iter().position(|item| item.has_key(after.as_str())) {
						Some(position) => position + 1,
						None => return Err(unknown(after, "list item")),
					},
				};
				items.insert(
					index,
					Node::Element {
						key: key.clone(),
						children: nodes(subtree.tree(), subtree.tree().all()),
					},
				);
			}

			MutationOp::RemoveElement { key, .. } => match containing_list_mut(&mut self.roots, key.as_str()) {
				Some((_, items)) => items.retain(|item| !item.has_key(key.as_str())),
				None => return Err(unknown(key, "list item")),
			},

			MutationOp::MoveElement { key, from, to } => {
				let (list, items) = containing_list_mut(&mut self.roots, key.as_str()).ok_or_else(|| unknown(key, "list item"))?;
				if !items.get(*from).map_or(false, |item| item.has_key(key.as_str())) {
					error!("{} is not at index {} of {}", key, from, list);
					return Err(ReplicaError::IndexMismatch { key: key.clone(), index: *from });
				}
				if *to >= items.len() {
					error!("Index {} is out of range for {}", to, list);
					return Err(ReplicaError::IndexOutOfRange { list, index: *to });
				}
				let item = items.remove(*from);
				items.insert(*to, item);
			}
		}
		Ok(())
	}

	#[must_use]
	pub fn markup(&self) -> String {
		let mut markup = String::new();
		// Writing into a `String` is infallible.
		let _ = write_nodes(&self.roots, &mut markup);
		markup
	}

	/// Current text of the text node keyed `key`.
	#[must_use]
	pub fn text(&self, key: &str) -> Option<&str> {
		match find(&self.roots, key)? {
			Node::Text { text, .. } => Some(text),
			_ => None,
		}
	}

	/// Current value markup of the attribute keyed `key`.
	#[must_use]
	pub fn attribute(&self, key: &str) -> Option<&str> {
		match find(&self.roots, key)? {
			Node::Attribute { value, .. } => Some(value),
			_ => None,
		}
	}

	/// Item keys of the list keyed `key`, in order.
	#[must_use]
	pub fn list_keys(&self, key: &str) -> Option<Vec<&Key>> {
		match find(&self.roots, key)? {
			Node::List { items, .. } => Some(items.iter().filter_map(Node::key).collect()),
			_ => None,
		}
	}
}
