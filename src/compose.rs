//! Turns the front end's call sequence into markup or into a [`Snapshot`].
//!
//! # Scope protocol
//!
//! A template announces its shape with [`Composer::enter_scope`] (literal segment count, hole count) and then appends exactly that many literals and holes,
//! in document order. Nested content ([`append_attribute`](`Composer::append_attribute`), [`append_element`](`Composer::append_element`),
//! [`append_list`](`Composer::append_list`) items) is composed by a nested template, which enters its own scope.
//!
//! A scope closes as soon as both of its counts reach zero. Once the outermost scope closes, the composer is detached: the render is complete,
//! and any further call fails with [`ComposeError::Detached`]. Miscounting in either direction is an error, never silently resized.

use crate::{
	error::ComposeError,
	handler::{Handler, HandlerTable},
	key::Key,
	markup,
	pool::SnapshotPool,
	snapshot::{Keyhole, KeyholeKind, Range, Snapshot},
	value::ScalarValue,
};
use core::fmt::{Display, Write};
use hashbrown::HashSet;
use tracing::{error, instrument, trace, trace_span};

pub type ComposeResult = Result<(), ComposeError>;

/// A compiled template: replays the same call sequence against a [`Composer`] on every render.
pub trait Template<S> {
	/// # Errors
	///
	/// Iff the call sequence violates the scope protocol (or the output sink fails).
	fn compose(&self, state: &S, composer: &mut Composer<'_, S>) -> ComposeResult;
}

impl<S, F> Template<S> for F
where
	F: Fn(&S, &mut Composer<'_, S>) -> ComposeResult,
{
	fn compose(&self, state: &S, composer: &mut Composer<'_, S>) -> ComposeResult {
		self(state, composer)
	}
}

/// Pins down the signature of a template closure, which spares callers from annotating its parameters.
pub fn template<S, F>(template: F) -> F
where
	F: Fn(&S, &mut Composer<'_, S>) -> ComposeResult,
{
	template
}

/// The result of one capturing render: the snapshot and the handlers bound while capturing it.
#[derive(Debug)]
pub struct Render<S> {
	pub snapshot: Snapshot,
	pub handlers: HandlerTable<S>,
}

/// Captures `template` into a snapshot rented from `pool`.
///
/// # Errors
///
/// Iff `template` violates the scope protocol.
#[instrument(skip_all)]
pub fn capture<S, T>(template: &T, state: &S, pool: &SnapshotPool) -> Result<Render<S>, ComposeError>
where
	T: Template<S> + ?Sized,
{
	let mut composer = Composer::capturing(pool);
	template.compose(state, &mut composer)?;
	// A capturing composer always yields a render.
	composer.finish()?.ok_or(ComposeError::Detached)
}

/// Streams the markup of `template` into `out`, for a first paint that won't be diffed against.
///
/// # Errors
///
/// Iff `template` violates the scope protocol or `out` fails.
#[instrument(skip_all)]
pub fn stream<S, T>(template: &T, state: &S, out: &mut dyn Write) -> ComposeResult
where
	T: Template<S> + ?Sized,
{
	let mut composer = Composer::streaming(out);
	template.compose(state, &mut composer)?;
	composer.finish().map(drop)
}

enum Sink<'a> {
	Streaming(&'a mut dyn Write),
	Capturing(Snapshot),
}

struct Frame {
	literals: usize,
	holes: usize,
	announced_literals: usize,
	announced_holes: usize,
	next_hole: usize,
	/// [`None`] for the outermost scope.
	prefix: Option<Key>,
	in_attribute: bool,
}

struct Reserved {
	prefix: Key,
	in_attribute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
	Ready,
	Rendering,
	Detached,
}

/// Consumes the front end's call sequence for exactly one render.
///
/// The composer is the explicit render context: independent renders use independent composers and never share state.
pub struct Composer<'a, S> {
	sink: Sink<'a>,
	frames: Vec<Frame>,
	/// Hole reserved for the nested scope that is about to be entered.
	reserved: Option<Reserved>,
	/// Appends are only valid while at least this many scopes are open, so nested templates can't write into their parent's scope.
	floor: usize,
	handlers: HandlerTable<S>,
	progress: Progress,
}

fn fail(error: ComposeError) -> ComposeError {
	error!("Template contract violation: {}", error);
	error
}

impl<'a, S> Composer<'a, S> {
	/// Writes markup directly into `out` as the call sequence arrives.
	pub fn streaming(out: &'a mut dyn Write) -> Self {
		Self::new(Sink::Streaming(out))
	}

	/// Captures keyholes into a snapshot rented from `pool`.
	#[must_use]
	pub fn capturing(pool: &SnapshotPool) -> Self {
		Self::new(Sink::Capturing(Snapshot::rented_from(pool)))
	}

	fn new(sink: Sink<'a>) -> Self {
		Self {
			sink,
			frames: Vec::new(),
			reserved: None,
			floor: 1,
			handlers: HandlerTable::new(),
			progress: Progress::Ready,
		}
	}

	#[must_use]
	pub fn is_capturing(&self) -> bool {
		matches!(self.sink, Sink::Capturing(_))
	}

	/// Whether the outermost scope has closed.
	#[must_use]
	pub fn is_detached(&self) -> bool {
		self.progress == Progress::Detached
	}

	/// Announces the shape of the scope that the following appends fill.
	///
	/// # Errors
	///
	/// [`ComposeError::UnexpectedScope`] if a scope is already open and no hole was reserved for this one,
	/// [`ComposeError::Detached`] if the render already completed.
	pub fn enter_scope(&mut self, literals: usize, holes: usize) -> ComposeResult {
		let (prefix, in_attribute) = match self.reserved.take() {
			Some(Reserved { prefix, in_attribute }) => (Some(prefix), in_attribute),
			None => match self.progress {
				Progress::Ready => {
					self.progress = Progress::Rendering;
					(None, false)
				}
				Progress::Rendering => return Err(fail(ComposeError::UnexpectedScope)),
				Progress::Detached => return Err(ComposeError::Detached),
			},
		};
		trace!(literals, holes, prefix = ?prefix, "Entering scope.");
		self.frames.push(Frame {
			literals,
			holes,
			announced_literals: literals,
			announced_holes: holes,
			next_hole: 0,
			prefix,
			in_attribute,
		});
		self.close_finished();
		Ok(())
	}

	/// # Errors
	///
	/// If no scope is open or it has no literal segments left.
	pub fn append_literal(&mut self, text: &'static str) -> ComposeResult {
		let frame = self.current("append_literal")?;
		if frame.literals == 0 {
			return Err(fail(ComposeError::ScopeOverflow {
				what: "literals",
				announced: frame.announced_literals,
			}));
		}
		frame.literals -= 1;
		match &mut self.sink {
			Sink::Streaming(out) => out.write_str(text)?,
			Sink::Capturing(snapshot) => {
				snapshot.push(Keyhole::Literal(text));
			}
		}
		self.close_finished();
		Ok(())
	}

	/// # Errors
	///
	/// If no scope is open or it has no holes left.
	pub fn append_scalar(&mut self, value: impl Into<ScalarValue>, format: Option<&'static str>) -> ComposeResult {
		let (key, in_attribute) = self.begin_hole("append_scalar")?;
		let value = value.into();
		if cfg!(feature = "dangerous-logging") {
			trace!(%key, ?value, ?format, "Scalar.");
		} else {
			trace!(%key, kind = value.type_name(), "Scalar.");
		}
		match &mut self.sink {
			Sink::Streaming(out) => markup::write_scalar(&key, &value, format, in_attribute, &mut **out)?,
			Sink::Capturing(snapshot) => {
				snapshot.push(Keyhole::Scalar { key, value, format });
			}
		}
		self.end_hole();
		Ok(())
	}

	/// Appends an attribute whose value is composed by `value` (literals and scalars only).
	///
	/// # Errors
	///
	/// If no scope is open or it has no holes left, if used inside another attribute, or if `value` fails.
	pub fn append_attribute(&mut self, name: &'static str, value: impl FnOnce(&mut Self) -> ComposeResult) -> ComposeResult {
		let (key, in_attribute) = self.begin_hole("append_attribute")?;
		if in_attribute {
			return Err(fail(ComposeError::AttributeContent { key, kind: KeyholeKind::Attribute }));
		}
		let placeholder = match &mut self.sink {
			Sink::Streaming(out) => {
				markup::open_attribute(name, &mut **out)?;
				None
			}
			Sink::Capturing(snapshot) => {
				let index = snapshot.len();
				Some(snapshot.push(Keyhole::Attribute {
					key: key.clone(),
					name,
					range: Range { start: index + 1, length: 0 },
				}))
			}
		};
		self.nested(key.clone(), true, value)?;
		match (&mut self.sink, placeholder) {
			(Sink::Streaming(out), _) => markup::close_attribute(name, &key, &mut **out)?,
			(Sink::Capturing(snapshot), Some(index)) => snapshot.close_range(index),
			(Sink::Capturing(_), None) => (),
		}
		self.end_hole();
		Ok(())
	}

	/// Binds `handler` to the event `name` of the enclosing element.
	///
	/// # Errors
	///
	/// If no scope is open or it has no holes left, or if used inside an attribute.
	pub fn append_event_binding(&mut self, name: &'static str, handler: Handler<S>) -> ComposeResult {
		let (key, in_attribute) = self.begin_hole("append_event_binding")?;
		if in_attribute {
			return Err(fail(ComposeError::AttributeContent { key, kind: KeyholeKind::EventBinding }));
		}
		match &mut self.sink {
			Sink::Streaming(out) => markup::write_event_binding(name, &key, &mut **out)?,
			Sink::Capturing(snapshot) => {
				snapshot.push(Keyhole::EventBinding { key: key.clone(), name });
				self.handlers.bind(key, handler);
			}
		}
		self.end_hole();
		Ok(())
	}

	/// Appends a nested sub-template instance.
	///
	/// # Errors
	///
	/// If no scope is open or it has no holes left, if used inside an attribute, or if `template` fails.
	pub fn append_element(&mut self, template: impl FnOnce(&mut Self) -> ComposeResult) -> ComposeResult {
		let (key, in_attribute) = self.begin_hole("append_element")?;
		if in_attribute {
			return Err(fail(ComposeError::AttributeContent { key, kind: KeyholeKind::Element }));
		}
		let placeholder = self.open_range(&key, |key, range| Keyhole::Element { key, range })?;
		self.nested(key, false, template)?;
		self.close_range(placeholder)?;
		self.end_hole();
		Ok(())
	}

	/// Appends a repeated sequence, one `template` instance per item.
	///
	/// `key_of` declares each item's key, which must be unique within the list. The transition name is forwarded with additions and removals.
	///
	/// # Errors
	///
	/// If no scope is open or it has no holes left, if used inside an attribute, on duplicate item keys, or if `template` fails.
	pub fn append_list<I, K, F>(&mut self, items: I, mut key_of: impl FnMut(&I::Item) -> K, transition: Option<&'static str>, mut template: F) -> ComposeResult
	where
		I: IntoIterator,
		K: Display,
		F: FnMut(&mut Self, I::Item) -> ComposeResult,
	{
		let (key, in_attribute) = self.begin_hole("append_list")?;
		if in_attribute {
			return Err(fail(ComposeError::AttributeContent { key, kind: KeyholeKind::List }));
		}
		let span = trace_span!("Composing list", %key, ?transition);
		let _enter = span.enter();

		let list = self.open_range(&key, |key, range| Keyhole::List { key, range, transition })?;
		let mut seen = HashSet::new();
		for item in items {
			let item_key = key.item(&key_of(&item).to_string());
			if !seen.insert(item_key.clone()) {
				return Err(fail(ComposeError::DuplicateKey { list: key, item: item_key }));
			}
			let placeholder = self.open_range(&item_key, |key, range| Keyhole::Element { key, range })?;
			self.nested(item_key, false, |composer| template(composer, item))?;
			self.close_range(placeholder)?;
		}
		self.close_range(list)?;
		trace!(items = seen.len(), "Composed list.");
		self.end_hole();
		Ok(())
	}

	/// Appends a subtree that is only present while `visible`, as a list of zero or one item.
	///
	/// # Errors
	///
	/// See [`append_list`](`Composer::append_list`).
	pub fn append_conditional(&mut self, visible: bool, transition: Option<&'static str>, template: impl FnOnce(&mut Self) -> ComposeResult) -> ComposeResult {
		let mut template = Some(template);
		self.append_list(visible.then_some(()), |()| "if", transition, |composer, ()| match template.take() {
			Some(template) => template(composer),
			None => Ok(()),
		})
	}

	/// Checks that the render completed and hands out its capture, if capturing.
	///
	/// # Errors
	///
	/// [`ComposeError::UnterminatedScope`] if a scope is still open, [`ComposeError::NoScope`] if nothing was rendered.
	pub fn finish(self) -> Result<Option<Render<S>>, ComposeError> {
		if let Some(frame) = self.frames.last() {
			return Err(fail(ComposeError::UnterminatedScope {
				literals: frame.literals,
				holes: frame.holes,
			}));
		}
		if self.progress != Progress::Detached {
			return Err(fail(ComposeError::NoScope { call: "finish" }));
		}
		match self.sink {
			Sink::Streaming(_) => Ok(None),
			Sink::Capturing(snapshot) => {
				trace!(keyholes = snapshot.len(), handlers = self.handlers.len(), "Captured render.");
				Ok(Some(Render {
					snapshot,
					handlers: self.handlers,
				}))
			}
		}
	}

	fn current(&mut self, call: &'static str) -> Result<&mut Frame, ComposeError> {
		if self.progress == Progress::Detached {
			return Err(ComposeError::Detached);
		}
		if self.frames.len() < self.floor {
			return Err(fail(ComposeError::NoScope { call }));
		}
		self.frames.last_mut().ok_or(ComposeError::NoScope { call })
	}

	/// Claims the next hole of the current scope, returning its key and whether it is part of an attribute value.
	fn begin_hole(&mut self, call: &'static str) -> Result<(Key, bool), ComposeError> {
		let frame = self.current(call)?;
		if frame.next_hole >= frame.announced_holes {
			return Err(fail(ComposeError::ScopeOverflow {
				what: "holes",
				announced: frame.announced_holes,
			}));
		}
		let index = frame.next_hole;
		frame.next_hole += 1;
		let key = match &frame.prefix {
			Some(prefix) => prefix.hole(index),
			None => Key::root(index),
		};
		Ok((key, frame.in_attribute))
	}

	fn end_hole(&mut self) {
		if let Some(frame) = self.frames.last_mut() {
			frame.holes -= 1;
		}
		self.close_finished();
	}

	fn open_range(&mut self, key: &Key, keyhole: impl FnOnce(Key, Range) -> Keyhole) -> Result<Option<usize>, ComposeError> {
		Ok(match &mut self.sink {
			Sink::Streaming(out) => {
				markup::open_marker(key, &mut **out)?;
				None
			}
			Sink::Capturing(snapshot) => {
				let index = snapshot.len();
				Some(snapshot.push(keyhole(key.clone(), Range { start: index + 1, length: 0 })))
			}
		})
	}

	fn close_range(&mut self, placeholder: Option<usize>) -> ComposeResult {
		match (&mut self.sink, placeholder) {
			(Sink::Streaming(out), _) => markup::close_marker(&mut **out)?,
			(Sink::Capturing(snapshot), Some(index)) => snapshot.close_range(index),
			(Sink::Capturing(_), None) => (),
		}
		Ok(())
	}

	/// Runs a nested template in a scope reserved below `key`, and checks that it entered and closed exactly that scope.
	fn nested(&mut self, key: Key, in_attribute: bool, template: impl FnOnce(&mut Self) -> ComposeResult) -> ComposeResult {
		let depth = self.frames.len();
		let floor = std::mem::replace(&mut self.floor, depth + 1);
		self.reserved = Some(Reserved {
			prefix: key.clone(),
			in_attribute,
		});
		let result = template(self);
		self.floor = floor;
		result?;

		if self.reserved.take().is_some() {
			return Err(fail(ComposeError::MissingScope { key }));
		}
		if self.frames.len() > depth {
			let frame = &self.frames[self.frames.len() - 1];
			return Err(fail(ComposeError::UnterminatedScope {
				literals: frame.literals,
				holes: frame.holes,
			}));
		}
		Ok(())
	}

	/// Pops the current scope if it is complete. Closing the outermost scope detaches the composer.
	fn close_finished(&mut self) {
		let done = matches!(self.frames.last(), Some(frame) if frame.literals == 0 && frame.holes == 0);
		if !done {
			return;
		}
		let frame = match self.frames.pop() {
			Some(frame) => frame,
			None => return,
		};
		if frame.prefix.is_none() {
			debug_assert!(self.frames.is_empty());
			self.progress = Progress::Detached;
			if let Sink::Capturing(snapshot) = &mut self.sink {
				snapshot.set_root_length(frame.announced_literals + frame.announced_holes);
			}
			trace!("Render complete. Detaching.");
		}
	}
}
