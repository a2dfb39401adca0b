//! Markup shared by first-paint streaming and subtree payloads.
//!
//! Addressable content is bracketed by comment markers so the remote applier can locate it by key:
//!
//! ```text
//! <!--kh:KEY-->…<!--/kh-->
//! ```
//!
//! Attributes are written as ` NAME="VALUE" kh-NAME="KEY"`, event bindings as ` kh-onNAME="KEY"`.

use crate::{
	key::Key,
	snapshot::{Keyhole, Range, Tree},
	value::ScalarValue,
};
use core::fmt::{self, Write};

pub const ATTRIBUTE_PREFIX: &str = "kh-";
pub const CLOSE_MARKER: &str = "<!--/kh-->";

pub fn open_marker(key: &Key, out: &mut dyn Write) -> fmt::Result {
	write!(out, "<!--kh:{}-->", key)
}

pub fn close_marker(out: &mut dyn Write) -> fmt::Result {
	out.write_str(CLOSE_MARKER)
}

/// Escapes text content.
pub fn escape_text(text: &str, out: &mut dyn Write) -> fmt::Result {
	escape(text, out, false)
}

/// Escapes a double-quoted attribute value.
pub fn escape_attribute(text: &str, out: &mut dyn Write) -> fmt::Result {
	escape(text, out, true)
}

fn escape(text: &str, out: &mut dyn Write, quotes: bool) -> fmt::Result {
	let mut rest = text;
	while let Some(position) = rest.find(|c: char| matches!(c, '&' | '<' | '>') || (quotes && c == '"')) {
		out.write_str(&rest[..position])?;
		out.write_str(match rest.as_bytes()[position] {
			b'&' => "&amp;",
			b'<' => "&lt;",
			b'>' => "&gt;",
			_ => "&quot;",
		})?;
		rest = &rest[position + 1..];
	}
	out.write_str(rest)
}

/// Writes a scalar, either as marked text content or as part of an attribute value.
pub fn write_scalar(key: &Key, value: &ScalarValue, format: Option<&str>, in_attribute: bool, out: &mut dyn Write) -> fmt::Result {
	let text = value.to_formatted_string(format);
	if in_attribute {
		escape_attribute(&text, out)
	} else {
		write_text(key, &text, out)
	}
}

/// Writes already-formatted text content with its markers.
pub fn write_text(key: &Key, text: &str, out: &mut dyn Write) -> fmt::Result {
	open_marker(key, out)?;
	escape_text(text, out)?;
	close_marker(out)
}

pub fn open_attribute(name: &str, out: &mut dyn Write) -> fmt::Result {
	write!(out, " {}=\"", name)
}

pub fn close_attribute(name: &str, key: &Key, out: &mut dyn Write) -> fmt::Result {
	write!(out, "\" {}{}=\"{}\"", ATTRIBUTE_PREFIX, name, key)
}

/// Writes an attribute whose value markup is already rendered.
pub fn write_attribute(name: &str, key: &Key, value: &str, out: &mut dyn Write) -> fmt::Result {
	open_attribute(name, out)?;
	out.write_str(value)?;
	close_attribute(name, key, out)
}

pub fn write_event_binding(name: &str, key: &Key, out: &mut dyn Write) -> fmt::Result {
	write!(out, " {}on{}=\"{}\"", ATTRIBUTE_PREFIX, name, key)
}

/// Renders the value markup of an attribute whose parts occupy `range`.
#[must_use]
pub fn attribute_value(tree: Tree<'_>, range: Range) -> String {
	let mut value = String::new();
	for (_, keyhole) in tree.children(range) {
		// Writing into a `String` is infallible.
		let _ = match keyhole {
			Keyhole::Literal(literal) => value.write_str(literal),
			Keyhole::Scalar { key, value: scalar, format } => write_scalar(key, scalar, *format, true, &mut value),
			// Rejected by the composer.
			_ => Ok(()),
		};
	}
	value
}

/// Renders the direct children of `range` and, recursively, everything below them.
pub fn write_siblings(tree: Tree<'_>, range: Range, out: &mut dyn Write) -> fmt::Result {
	for (_, keyhole) in tree.children(range) {
		match keyhole {
			Keyhole::Literal(literal) => out.write_str(literal)?,
			Keyhole::Scalar { key, value, format } => write_scalar(key, value, *format, false, out)?,
			Keyhole::Attribute { key, name, range } => write_attribute(name, key, &attribute_value(tree, *range), out)?,
			Keyhole::EventBinding { key, name } => write_event_binding(name, key, out)?,
			Keyhole::Element { key, range } | Keyhole::List { key, range, .. } => {
				open_marker(key, out)?;
				write_siblings(tree, *range, out)?;
				close_marker(out)?;
			}
		}
	}
	Ok(())
}
