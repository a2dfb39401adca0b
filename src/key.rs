//! Stable keyhole identities.
//!
//! Keys are derived from structural position only, so the same template replayed against new state produces the same key for every static position.
//! Items of a repeated list additionally carry their declared item key, which is what lets an item keep its identity while its index changes.

use core::{borrow::Borrow, fmt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of one keyhole, stable across renders.
///
/// Cloning is cheap (reference-counted).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Arc<str>);

impl Key {
	/// Key of the `index`th hole of the outermost scope.
	#[must_use]
	pub fn root(index: usize) -> Self {
		Self(index.to_string().into())
	}

	/// Key of the `index`th hole of a scope nested below `self`.
	#[must_use]
	pub fn hole(&self, index: usize) -> Self {
		Self(format!("{}.{}", self.0, index).into())
	}

	/// Key of the list item declared as `item` within the list keyed `self`.
	///
	/// Every byte of `item` outside `[A-Za-z0-9_]` is percent-encoded, so an item key can neither be mistaken for a nested position
	/// nor break out of the comment markers and attribute values it is written into.
	#[must_use]
	pub fn item(&self, item: &str) -> Self {
		const HEX: &[u8; 16] = b"0123456789ABCDEF";
		let mut key = String::with_capacity(self.0.len() + item.len() + 2);
		key.push_str(&self.0);
		key.push('[');
		for &byte in item.as_bytes() {
			if byte.is_ascii_alphanumeric() || byte == b'_' {
				key.push(char::from(byte));
			} else {
				key.push('%');
				key.push(char::from(HEX[usize::from(byte >> 4)]));
				key.push(char::from(HEX[usize::from(byte & 0xF)]));
			}
		}
		key.push(']');
		Self(key.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for Key {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for Key {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Key {
	fn from(key: &str) -> Self {
		Self(key.into())
	}
}

impl From<String> for Key {
	fn from(key: String) -> Self {
		Self(key.into())
	}
}
