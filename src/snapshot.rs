//! The flat keyhole buffer one render pass is captured into.
//!
//! Nesting is expressed purely through [`Range`]s into the same buffer: a ranged keyhole at index `i` owns the `length` keyholes directly following it,
//! grandchildren included, so the next sibling of any keyhole is found in constant time without following pointers.

use crate::{key::Key, markup, pool::SnapshotPool, value::ScalarValue};
use core::fmt::{self, Write};

/// `(start, length)` into the backing buffer of a [`Snapshot`] or [`Fragment`].
///
/// `length` counts every nested keyhole, not only direct children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
	pub start: usize,
	pub length: usize,
}

impl Range {
	#[must_use]
	pub fn end(self) -> usize {
		self.start + self.length
	}

	#[must_use]
	pub fn is_empty(self) -> bool {
		self.length == 0
	}
}

/// Discriminant of a [`Keyhole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyholeKind {
	StringLiteral,
	ScalarValue,
	Attribute,
	EventBinding,
	Element,
	List,
}

impl fmt::Display for KeyholeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::StringLiteral => "string literal",
			Self::ScalarValue => "scalar value",
			Self::Attribute => "attribute",
			Self::EventBinding => "event binding",
			Self::Element => "element",
			Self::List => "list",
		})
	}
}

/// One slot of a rendered view.
///
/// Literal segments of the template are captured too (without a key), which is what makes any range renderable back into markup.
#[derive(Debug, Clone)]
pub enum Keyhole {
	Literal(&'static str),
	Scalar {
		key: Key,
		value: ScalarValue,
		format: Option<&'static str>,
	},
	/// Children are the literal and scalar parts of the attribute value.
	Attribute { key: Key, name: &'static str, range: Range },
	EventBinding { key: Key, name: &'static str },
	Element { key: Key, range: Range },
	/// Direct children are exclusively [`Keyhole::Element`]s, one per item.
	List {
		key: Key,
		range: Range,
		transition: Option<&'static str>,
	},
}

impl Keyhole {
	#[must_use]
	pub fn kind(&self) -> KeyholeKind {
		match self {
			Self::Literal(_) => KeyholeKind::StringLiteral,
			Self::Scalar { .. } => KeyholeKind::ScalarValue,
			Self::Attribute { .. } => KeyholeKind::Attribute,
			Self::EventBinding { .. } => KeyholeKind::EventBinding,
			Self::Element { .. } => KeyholeKind::Element,
			Self::List { .. } => KeyholeKind::List,
		}
	}

	/// [`None`] only for literals.
	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		match self {
			Self::Literal(_) => None,
			Self::Scalar { key, .. } | Self::Attribute { key, .. } | Self::EventBinding { key, .. } | Self::Element { key, .. } | Self::List { key, .. } => Some(key),
		}
	}

	#[must_use]
	pub fn range(&self) -> Option<Range> {
		match *self {
			Self::Attribute { range, .. } | Self::Element { range, .. } | Self::List { range, .. } => Some(range),
			Self::Literal(_) | Self::Scalar { .. } | Self::EventBinding { .. } => None,
		}
	}

	/// Number of buffer slots this keyhole occupies, itself included.
	#[must_use]
	pub fn span(&self) -> usize {
		1 + self.range().map_or(0, |range| range.length)
	}

	pub(crate) fn range_mut(&mut self) -> Option<&mut Range> {
		match self {
			Self::Attribute { range, .. } | Self::Element { range, .. } | Self::List { range, .. } => Some(range),
			Self::Literal(_) | Self::Scalar { .. } | Self::EventBinding { .. } => None,
		}
	}

	/// Compares content, treating ranges as equal if they have the same position relative to `base`/`other_base` respectively.
	fn same_content(&self, base: usize, other: &Self, other_base: usize) -> bool {
		match (self, other) {
			(Self::Literal(a), Self::Literal(b)) => a == b,
			(Self::Scalar { key: k_1, value: v_1, format: f_1 }, Self::Scalar { key: k_2, value: v_2, format: f_2 }) => k_1 == k_2 && v_1 == v_2 && f_1 == f_2,
			(Self::Attribute { key: k_1, name: n_1, range: r_1 }, Self::Attribute { key: k_2, name: n_2, range: r_2 }) => k_1 == k_2 && n_1 == n_2 && same_relative(*r_1, base, *r_2, other_base),
			(Self::EventBinding { key: k_1, name: n_1 }, Self::EventBinding { key: k_2, name: n_2 }) => k_1 == k_2 && n_1 == n_2,
			(Self::Element { key: k_1, range: r_1 }, Self::Element { key: k_2, range: r_2 }) => k_1 == k_2 && same_relative(*r_1, base, *r_2, other_base),
			(Self::List { key: k_1, range: r_1, transition: t_1 }, Self::List { key: k_2, range: r_2, transition: t_2 }) => {
				k_1 == k_2 && t_1 == t_2 && same_relative(*r_1, base, *r_2, other_base)
			}
			_ => false,
		}
	}
}

fn same_relative(a: Range, a_base: usize, b: Range, b_base: usize) -> bool {
	a.length == b.length && a.start.wrapping_sub(a_base) == b.start.wrapping_sub(b_base)
}

impl PartialEq for Keyhole {
	fn eq(&self, other: &Self) -> bool {
		self.same_content(0, other, 0)
	}
}

/// Iterates the direct children of a range, skipping over nested ranges.
///
/// Yields `(index, keyhole)` with `index` into the backing buffer.
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
	keyholes: &'a [Keyhole],
	index: usize,
	end: usize,
}

impl<'a> Iterator for Siblings<'a> {
	type Item = (usize, &'a Keyhole);

	fn next(&mut self) -> Option<Self::Item> {
		if self.index >= self.end {
			return None;
		}
		let index = self.index;
		let keyhole = self.keyholes.get(index)?;
		self.index += keyhole.span();
		Some((index, keyhole))
	}
}

/// Borrowed, read-only view of a keyhole buffer.
///
/// This is what the differ, the markup writer and the [`Replica`](`crate::replica::Replica`) operate on,
/// so [`Snapshot`]s and detached [`Fragment`]s are handled identically.
#[derive(Debug, Clone, Copy)]
pub struct Tree<'a> {
	keyholes: &'a [Keyhole],
	root_length: usize,
}

impl<'a> Tree<'a> {
	#[must_use]
	pub fn keyholes(self) -> &'a [Keyhole] {
		self.keyholes
	}

	#[must_use]
	pub fn len(self) -> usize {
		self.keyholes.len()
	}

	#[must_use]
	pub fn is_empty(self) -> bool {
		self.keyholes.is_empty()
	}

	/// Count of top-level keyholes.
	#[must_use]
	pub fn root_length(self) -> usize {
		self.root_length
	}

	/// Range spanning the whole buffer.
	#[must_use]
	pub fn all(self) -> Range {
		Range { start: 0, length: self.keyholes.len() }
	}

	#[must_use]
	pub fn roots(self) -> Siblings<'a> {
		self.children(self.all())
	}

	#[must_use]
	pub fn children(self, range: Range) -> Siblings<'a> {
		Siblings {
			keyholes: self.keyholes,
			index: range.start,
			end: range.end().min(self.keyholes.len()),
		}
	}

	/// Finds a keyhole by key with a linear scan.
	#[must_use]
	pub fn find(self, key: &str) -> Option<(usize, &'a Keyhole)> {
		self.keyholes.iter().enumerate().find(|(_, keyhole)| keyhole.key().map(Key::as_str) == Some(key))
	}

	/// Whether `range` of `self` and `other_range` of `other` hold the same content.
	#[must_use]
	pub fn content_eq(self, range: Range, other: Tree<'_>, other_range: Range) -> bool {
		range.length == other_range.length
			&& self.keyholes[range.start..range.end()]
				.iter()
				.zip(&other.keyholes[other_range.start..other_range.end()])
				.all(|(a, b)| a.same_content(range.start, b, other_range.start))
	}

	/// Detaches a copy of `range`, rebased so its direct children become the roots of the [`Fragment`].
	#[must_use]
	pub fn fragment(self, range: Range) -> Fragment {
		let keyholes: Vec<_> = self.keyholes[range.start..range.end()]
			.iter()
			.map(|keyhole| {
				let mut keyhole = keyhole.clone();
				if let Some(nested) = keyhole.range_mut() {
					nested.start -= range.start;
				}
				keyhole
			})
			.collect();
		let root_length = self.children(range).count();
		Fragment { keyholes, root_length }
	}

	/// # Errors
	///
	/// Iff `out` fails.
	pub fn write_markup(self, out: &mut dyn Write) -> fmt::Result {
		markup::write_siblings(self, self.all(), out)
	}

	#[must_use]
	pub fn markup(self) -> String {
		let mut markup = String::new();
		// Writing into a `String` is infallible.
		let _ = self.write_markup(&mut markup);
		markup
	}
}

/// One captured render.
///
/// The buffer is rented from a [`SnapshotPool`] and given back when the snapshot is dropped.
#[derive(Debug)]
pub struct Snapshot {
	buffer: Vec<Keyhole>,
	root_length: usize,
	pool: SnapshotPool,
}

impl Snapshot {
	#[must_use]
	pub fn rented_from(pool: &SnapshotPool) -> Self {
		Self {
			buffer: pool.rent(),
			root_length: 0,
			pool: pool.clone(),
		}
	}

	#[must_use]
	pub fn tree(&self) -> Tree<'_> {
		Tree {
			keyholes: &self.buffer,
			root_length: self.root_length,
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	#[must_use]
	pub fn root_length(&self) -> usize {
		self.root_length
	}

	#[must_use]
	pub fn keyholes(&self) -> &[Keyhole] {
		&self.buffer
	}

	#[must_use]
	pub fn markup(&self) -> String {
		self.tree().markup()
	}

	pub(crate) fn push(&mut self, keyhole: Keyhole) -> usize {
		self.buffer.push(keyhole);
		self.buffer.len() - 1
	}

	/// Backfills the length of the placeholder at `index` once its nested scope is closed.
	pub(crate) fn close_range(&mut self, index: usize) {
		let length = self.buffer.len() - (index + 1);
		if let Some(range) = self.buffer.get_mut(index).and_then(Keyhole::range_mut) {
			debug_assert_eq!(range.start, index + 1);
			range.length = length;
		}
	}

	pub(crate) fn set_root_length(&mut self, root_length: usize) {
		self.root_length = root_length;
	}
}

impl Drop for Snapshot {
	fn drop(&mut self) {
		self.pool.give_back(std::mem::take(&mut self.buffer));
	}
}

/// An owned, detached subtree, as carried by [`MutationOp::SetElement`](`crate::MutationOp::SetElement`) and [`MutationOp::AddElement`](`crate::MutationOp::AddElement`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
	keyholes: Vec<Keyhole>,
	root_length: usize,
}

impl Fragment {
	#[must_use]
	pub fn tree(&self) -> Tree<'_> {
		Tree {
			keyholes: &self.keyholes,
			root_length: self.root_length,
		}
	}

	#[must_use]
	pub fn markup(&self) -> String {
		self.tree().markup()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.keyholes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.keyholes.is_empty()
	}
}
