//! Typed scalar payloads and their format mini-language.
//!
//! | Type | Formats |
//! |---|---|
//! | integers | `x`, `X`, `b`, `0N` (zero-pad to width N) |
//! | floats | `.N` (N fixed decimals), `e` |
//! | [`bool`] | `TRUE|FALSE` (the text to show for either case) |
//! | text | `upper`, `lower` |
//! | [`Duration`] | `s`, `ms` |
//! | [`SystemTime`] | `unix`, `unix_ms` |
//!
//! Unrecognised formats render the default representation.

use core::fmt::{self, Binary, Display, LowerExp, LowerHex, UpperHex, Write};
use num_traits::{Float, PrimInt};
use std::{
	borrow::Cow,
	time::{Duration, SystemTime, UNIX_EPOCH},
};

/// The value of a [`Keyhole::Scalar`](`crate::Keyhole::Scalar`).
///
/// Equality is bitwise for floats, so a value always equals itself (including NaN) and diffing a snapshot against itself is empty.
#[derive(Debug, Clone)]
pub enum ScalarValue {
	Text(Cow<'static, str>),
	Bool(bool),
	I32(i32),
	I64(i64),
	U32(u32),
	U64(u64),
	Usize(usize),
	F32(f32),
	F64(f64),
	Duration(Duration),
	Timestamp(SystemTime),
}

impl PartialEq for ScalarValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Text(a), Self::Text(b)) => a == b,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::I32(a), Self::I32(b)) => a == b,
			(Self::I64(a), Self::I64(b)) => a == b,
			(Self::U32(a), Self::U32(b)) => a == b,
			(Self::U64(a), Self::U64(b)) => a == b,
			(Self::Usize(a), Self::Usize(b)) => a == b,
			(Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
			(Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
			(Self::Duration(a), Self::Duration(b)) => a == b,
			(Self::Timestamp(a), Self::Timestamp(b)) => a == b,
			_ => false,
		}
	}
}
impl Eq for ScalarValue {}

impl ScalarValue {
	/// Writes the unescaped text representation of this value.
	///
	/// # Errors
	///
	/// Iff `out` fails.
	pub fn write_formatted(&self, format: Option<&str>, out: &mut dyn Write) -> fmt::Result {
		let format = format.unwrap_or("");
		match self {
			Self::Text(text) => match format {
				"upper" => out.write_str(&text.to_uppercase()),
				"lower" => out.write_str(&text.to_lowercase()),
				_ => out.write_str(text),
			},
			Self::Bool(value) => match format.split_once('|') {
				Some((yes, no)) => out.write_str(if *value { yes } else { no }),
				None => write!(out, "{}", value),
			},
			&Self::I32(value) => write_integer(value, format, out),
			&Self::I64(value) => write_integer(value, format, out),
			&Self::U32(value) => write_integer(value, format, out),
			&Self::U64(value) => write_integer(value, format, out),
			&Self::Usize(value) => write_integer(value, format, out),
			&Self::F32(value) => write_float(value, format, out),
			&Self::F64(value) => write_float(value, format, out),
			Self::Duration(duration) => match format {
				"s" => write!(out, "{}", duration.as_secs_f64()),
				"ms" => write!(out, "{}", duration.as_millis()),
				_ => write!(out, "{:?}", duration),
			},
			Self::Timestamp(time) => {
				let (sign, since) = match time.duration_since(UNIX_EPOCH) {
					Ok(since) => ("", since),
					Err(before) => ("-", before.duration()),
				};
				match format {
					"unix_ms" => write!(out, "{}{}", sign, since.as_millis()),
					_ => write!(out, "{}{}", sign, since.as_secs()),
				}
			}
		}
	}

	/// Convenience wrapper around [`write_formatted`](`ScalarValue::write_formatted`).
	#[must_use]
	pub fn to_formatted_string(&self, format: Option<&str>) -> String {
		let mut text = String::new();
		// Writing into a `String` is infallible.
		let _ = self.write_formatted(format, &mut text);
		text
	}

	#[must_use]
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Text(_) => "text",
			Self::Bool(_) => "bool",
			Self::I32(_) => "i32",
			Self::I64(_) => "i64",
			Self::U32(_) => "u32",
			Self::U64(_) => "u64",
			Self::Usize(_) => "usize",
			Self::F32(_) => "f32",
			Self::F64(_) => "f64",
			Self::Duration(_) => "duration",
			Self::Timestamp(_) => "timestamp",
		}
	}
}

fn write_integer<I>(value: I, format: &str, out: &mut dyn Write) -> fmt::Result
where
	I: PrimInt + Display + LowerHex + UpperHex + Binary,
{
	match format {
		"x" => write!(out, "{:x}", value),
		"X" => write!(out, "{:X}", value),
		"b" => write!(out, "{:b}", value),
		_ => match format.strip_prefix('0').and_then(|width| width.parse::<usize>().ok()) {
			Some(width) => write!(out, "{:0width$}", value, width = width),
			None => write!(out, "{}", value),
		},
	}
}

fn write_float<F>(value: F, format: &str, out: &mut dyn Write) -> fmt::Result
where
	F: Float + Display + LowerExp,
{
	if !value.is_finite() {
		return write!(out, "{}", value);
	}
	match format {
		"e" => write!(out, "{:e}", value),
		_ => match format.strip_prefix('.').and_then(|precision| precision.parse::<usize>().ok()) {
			Some(precision) => write!(out, "{:.precision$}", value, precision = precision),
			None => write!(out, "{}", value),
		},
	}
}

macro_rules! from_scalar {
	($($variant:ident($ty:ty)),*$(,)?) => {$(
		impl From<$ty> for ScalarValue {
			fn from(value: $ty) -> Self {
				Self::$variant(value)
			}
		}
	)*};
}
from_scalar!(Bool(bool), I32(i32), I64(i64), U32(u32), U64(u64), Usize(usize), F32(f32), F64(f64), Duration(Duration), Timestamp(SystemTime));

impl From<&'static str> for ScalarValue {
	fn from(text: &'static str) -> Self {
		Self::Text(Cow::Borrowed(text))
	}
}

impl From<String> for ScalarValue {
	fn from(text: String) -> Self {
		Self::Text(Cow::Owned(text))
	}
}

impl From<Cow<'static, str>> for ScalarValue {
	fn from(text: Cow<'static, str>) -> Self {
		Self::Text(text)
	}
}
