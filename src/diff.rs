use crate::{
	error::DiffError,
	key::Key,
	markup,
	op::MutationOp,
	snapshot::{Keyhole, Range, Siblings, Snapshot, Tree},
};
use hashbrown::{hash_map::Entry, HashMap, HashSet};
use tracing::{error, instrument, trace, trace_span};

/// Compares two [`Snapshot`]s of the same template and emits the [`MutationOp`]s that turn the first into the second.
///
/// # Algorithm
///
/// Static positions are walked index-aligned in lock-step, since their shape is fixed by the template:
///
/// - scalars and attributes whose content changed yield [`SetTextNode`](`MutationOp::SetTextNode`)/[`SetAttribute`](`MutationOp::SetAttribute`),
/// - elements whose content changed anywhere are replaced wholesale with [`SetElement`](`MutationOp::SetElement`),
/// - lists are reconciled by item key.
///
/// List reconciliation first removes vanished items (in previous order), then walks the next items in order,
/// adding new ones after their preceding sibling, moving displaced ones into place and diffing kept ones field by field.
/// Kept items on a longest run whose relative order didn't change never move; every other kept item moves at most once,
/// so rotating a list by one costs a single move.
/// Items are only ever matched by key, so a pure reorder yields only moves.
///
/// # Correct Use
///
/// Both snapshots must stem from the same template, and list item keys must be unique per list.
/// Violations are reported as [`DiffError`]s rather than patched over.
#[derive(Debug, Clone, Copy)]
pub struct Differ {
	depth_limit: usize,
}

impl Default for Differ {
	fn default() -> Self {
		Self::new(64)
	}
}

/// Diffs with the default [`Differ`].
///
/// # Errors
///
/// See [`Differ::diff`].
pub fn diff(previous: &Snapshot, next: &Snapshot) -> Result<Vec<MutationOp>, DiffError> {
	Differ::default().diff(previous, next)
}

impl Differ {
	#[must_use]
	pub fn new(depth_limit: usize) -> Self {
		Self { depth_limit }
	}

	/// # Errors
	///
	/// If the snapshots don't have the same static shape, contain duplicate list item keys, or nest deeper than the depth limit.
	pub fn diff(&self, previous: &Snapshot, next: &Snapshot) -> Result<Vec<MutationOp>, DiffError> {
		let mut ops = Vec::new();
		self.diff_into(previous.tree(), next.tree(), &mut ops)?;
		Ok(ops)
	}

	/// Appends the operations for `previous` → `next` to `ops`.
	///
	/// # Errors
	///
	/// See [`Differ::diff`]. `ops` may hold a partial result if this fails.
	#[instrument(skip_all, fields(previous.len = previous.len(), next.len = next.len()))]
	pub fn diff_into(&self, previous: Tree<'_>, next: Tree<'_>, ops: &mut Vec<MutationOp>) -> Result<(), DiffError> {
		if previous.root_length() != next.root_length() {
			error!("Root length changed from {} to {}. Were both snapshots captured from the same template?", previous.root_length(), next.root_length());
			return Err(DiffError::RootLengthMismatch {
				previous: previous.root_length(),
				next: next.root_length(),
			});
		}
		let start = ops.len();
		self.diff_siblings(previous, previous.roots(), next, next.roots(), "root", ops, self.depth_limit)?;
		trace!("Emitted {} operation(s).", ops.len() - start);
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	#[allow(clippy::too_many_lines)]
	fn diff_siblings(&self, a: Tree<'_>, mut siblings_a: Siblings<'_>, b: Tree<'_>, mut siblings_b: Siblings<'_>, parent: &str, ops: &mut Vec<MutationOp>, depth_limit: usize) -> Result<(), DiffError> {
		if depth_limit == 0 {
			error!("Depth limit reached");
			return Err(DiffError::DepthLimit { at: parent.to_owned() });
		}

		loop {
			let (keyhole_a, keyhole_b) = match (siblings_a.next(), siblings_b.next()) {
				(None, None) => return Ok(()),
				(Some((_, keyhole_a)), Some((_, keyhole_b))) => (keyhole_a, keyhole_b),
				(left, right) => {
					let unmatched_a = usize::from(left.is_some()) + siblings_a.count();
					let unmatched_b = usize::from(right.is_some()) + siblings_b.count();
					return Err(mismatch(parent, format!("sibling count differs ({} unmatched before, {} after)", unmatched_a, unmatched_b)));
				}
			};

			if keyhole_a.key() != keyhole_b.key() {
				return Err(mismatch(parent, format!("key {:?} became {:?}", keyhole_a.key(), keyhole_b.key())));
			}

			match (keyhole_a, keyhole_b) {
				(Keyhole::Literal(l_1), Keyhole::Literal(l_2)) => {
					if l_1 != l_2 {
						return Err(mismatch(parent, "literal segment changed".to_owned()));
					}
				}

				(Keyhole::Scalar { value: v_1, format: f_1, .. }, Keyhole::Scalar { key, value: v_2, format: f_2 }) => {
					if v_1 != v_2 || f_1 != f_2 {
						let value = v_2.to_formatted_string(*f_2);
						if cfg!(feature = "dangerous-logging") {
							trace!(%key, ?v_1, ?v_2, "Scalar changed.");
						} else {
							trace!(%key, "Scalar changed.");
						}
						ops.push(MutationOp::SetTextNode { key: key.clone(), value });
					}
				}

				(Keyhole::Attribute { name: n_1, range: r_1, .. }, Keyhole::Attribute { key, name: n_2, range: r_2 }) => {
					if n_1 != n_2 {
						return Err(mismatch(key.as_str(), format!("attribute {} became {}", n_1, n_2)));
					}
					if !a.content_eq(*r_1, b, *r_2) {
						trace!(%key, name = n_2, "Attribute changed.");
						ops.push(MutationOp::SetAttribute {
							key: key.clone(),
							name: n_2,
							value: markup::attribute_value(b, *r_2),
						});
					}
				}

				(Keyhole::EventBinding { name: n_1, .. }, Keyhole::EventBinding { key, name: n_2 }) => {
					if n_1 != n_2 {
						return Err(mismatch(key.as_str(), format!("event binding {} became {}", n_1, n_2)));
					}
				}

				(Keyhole::Element { range: r_1, .. }, Keyhole::Element { key, range: r_2 }) => {
					let span = trace_span!("Diffing element", %key);
					let _enter = span.enter();
					if !a.content_eq(*r_1, b, *r_2) {
						trace!("Content changed. Replacing.");
						ops.push(MutationOp::SetElement {
							key: key.clone(),
							subtree: b.fragment(*r_2),
							transition: None,
						});
					}
				}

				(Keyhole::List { range: r_1, .. }, Keyhole::List { key, range: r_2, transition }) => {
					let span = trace_span!("Diffing list", %key);
					let _enter = span.enter();
					self.reconcile_list(a, *r_1, b, *r_2, key, *transition, ops, depth_limit - 1)?;
				}

				(keyhole_a, keyhole_b) => {
					return Err(mismatch(
						keyhole_b.key().map_or(parent, Key::as_str),
						format!("{} became {}", keyhole_a.kind(), keyhole_b.kind()),
					))
				}
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn reconcile_list(&self, a: Tree<'_>, range_a: Range, b: Tree<'_>, range_b: Range, list: &Key, transition: Option<&'static str>, ops: &mut Vec<MutationOp>, depth_limit: usize) -> Result<(), DiffError> {
		let items_a = list_items(a, range_a, list)?;
		let items_b = list_items(b, range_b, list)?;
		trace!("items_a.len()" = items_a.len(), "items_b.len()" = items_b.len());

		// Previous slot index per key:
		let mut slots = HashMap::with_capacity(items_a.len());
		for (i, &(key, _)) in items_a.iter().enumerate() {
			match slots.entry(key) {
				Entry::Occupied(_) => return Err(duplicate(list, key)),
				Entry::Vacant(vacant) => {
					vacant.insert(i);
				}
			}
		}
		// Next position per key:
		let mut ranks = HashMap::with_capacity(items_b.len());
		for (t, &(key, _)) in items_b.iter().enumerate() {
			if ranks.insert(key, t).is_some() {
				return Err(duplicate(list, key));
			}
		}

		// Removals first, so their keys are free before anything is added:
		let mut order = Vec::with_capacity(items_b.len());
		let mut kept_ranks = Vec::with_capacity(items_a.len());
		for &(key, _) in &items_a {
			if let Some(&rank) = ranks.get(key) {
				order.push(key);
				kept_ranks.push(rank);
			} else {
				trace!(%key, "Removing item.");
				ops.push(MutationOp::RemoveElement { key: key.clone(), transition });
			}
		}

		// Kept items on one longest run that is already in next order stay put. Every other kept item moves at most once.
		let stable: HashSet<&Key> = order.iter().zip(longest_increasing_run(&kept_ranks)).filter_map(|(&key, stable)| stable.then(|| key)).collect();
		trace!(kept = order.len(), stable = stable.len());

		// `order` mirrors the remote list. Processed items appear in it in next order, ahead of every unprocessed stable item.
		for (t, &(key, item_b)) in items_b.iter().enumerate() {
			let span = trace_span!("Diffing item", %key);
			let _enter = span.enter();
			let previous = t.checked_sub(1).map(|previous| items_b[previous].0);
			match slots.get(key) {
				None => {
					trace!("Adding item.");
					ops.push(MutationOp::AddElement {
						list: list.clone(),
						after: previous.cloned(),
						key: key.clone(),
						subtree: b.fragment(item_b),
						transition,
					});
					order.insert(slot_after(&order, previous), key);
				}
				Some(&slot) => {
					if !stable.contains(key) {
						let from = position(&order, key);
						let moved = order.remove(from);
						let to = slot_after(&order, previous);
						order.insert(to, moved);
						if from != to {
							trace!(from, to, "Moving item.");
							ops.push(MutationOp::MoveElement { key: key.clone(), from, to });
						}
					}
					let item_a = items_a[slot].1;
					self.diff_siblings(a, a.children(item_a), b, b.children(item_b), key.as_str(), ops, depth_limit)?;
				}
			}
		}
		debug_assert_eq!(order.len(), items_b.len());
		Ok(())
	}
}

/// Marks one longest strictly increasing run within `ranks`. Of equally long runs, the one starting with the greatest rank wins.
fn longest_increasing_run(ranks: &[usize]) -> Vec<bool> {
	// `heads[l]` starts the best run of length `l + 1` found so far, scanning from the back.
	let mut heads: Vec<usize> = Vec::new();
	let mut next = vec![None; ranks.len()];
	for i in (0..ranks.len()).rev() {
		let length = heads.partition_point(|&head| ranks[head] > ranks[i]);
		next[i] = length.checked_sub(1).map(|shorter| heads[shorter]);
		if length == heads.len() {
			heads.push(i);
		} else {
			heads[length] = i;
		}
	}

	let mut run = vec![false; ranks.len()];
	let mut cursor = heads.last().copied();
	while let Some(i) = cursor {
		run[i] = true;
		cursor = next[i];
	}
	run
}

/// Index of `key` in the working list, which contains every key asked for here.
fn position(order: &[&Key], key: &Key) -> usize {
	let position = order.iter().position(|k| *k == key);
	debug_assert!(position.is_some(), "{} is not in the working list", key);
	position.unwrap_or(order.len())
}

/// Where an item goes so that it directly follows `previous`, or leads the list.
fn slot_after(order: &[&Key], previous: Option<&Key>) -> usize {
	previous.map_or(0, |previous| position(order, previous) + 1)
}

/// Collects `(key, content range)` of each item of a list.
fn list_items<'a>(tree: Tree<'a>, range: Range, list: &Key) -> Result<Vec<(&'a Key, Range)>, DiffError> {
	tree.children(range)
		.map(|(_, item)| match item {
			Keyhole::Element { key, range } => Ok((key, *range)),
			other => Err(mismatch(list.as_str(), format!("list item is a {}", other.kind()))),
		})
		.collect()
}

fn mismatch(at: &str, detail: String) -> DiffError {
	error!("Shape mismatch at {}: {}", at, detail);
	DiffError::ShapeMismatch { at: at.to_owned(), detail }
}

fn duplicate(list: &Key, item: &Key) -> DiffError {
	error!("Duplicate item key {} in list {}", item, list);
	DiffError::DuplicateKey {
		list: list.clone(),
		item: item.clone(),
	}
}
