//! Response envelope decoding shared by every page family.

// self
use crate::{_prelude::*, error::DecodeError};

/// Count fields that let an object without any item key pass as an empty page.
const COUNT_FIELDS: [&str; 2] = ["total", "totalResults"];

/// Ordered item-array locations accepted for one endpoint.
///
/// Keys are tried in order and the first one holding an array wins. A dotted key such as
/// `_embedded.applications` addresses a nested object. Anything else fails closed with
/// [`DecodeError::UnknownShape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemsShape {
	keys: &'static [&'static str],
	bare: bool,
}
impl ItemsShape {
	/// Accepts objects carrying an array under one of `keys`.
	pub const fn keys(keys: &'static [&'static str]) -> Self {
		Self { keys, bare: false }
	}

	/// Also accepts a bare top-level array.
	pub const fn or_bare(self) -> Self {
		Self { bare: true, ..self }
	}

	/// Human readable list of accepted shapes.
	pub fn describe(&self) -> String {
		let mut shapes = self.keys.iter().map(|key| format!("`{key}`")).collect::<Vec<_>>();

		if self.bare {
			shapes.push("bare array".into());
		}

		shapes.join(", ")
	}

	/// Splits `body` into its items and the remaining envelope.
	pub fn extract(&self, url: &str, body: Value) -> Result<Page, DecodeError> {
		let mut body = match body {
			Value::Array(items) if self.bare => return Ok(Page::bare(items)),
			Value::Object(_) => body,
			_ => return Err(self.unknown(url)),
		};

		for key in self.keys {
			let pointer = format!("/{}", key.replace('.', "/"));

			if let Some(slot) = body.pointer_mut(&pointer).filter(|slot| slot.is_array()) {
				let items = match slot.take() {
					Value::Array(items) => items,
					_ => Vec::new(),
				};
				let mut envelope = match body {
					Value::Object(map) => map,
					_ => Map::new(),
				};

				envelope.remove(*key);

				return Ok(Page { items, envelope, bare: false });
			}
		}

		let Value::Object(envelope) = body else { return Err(self.unknown(url)) };

		let announced_empty =
			COUNT_FIELDS.iter().any(|field| envelope.get(*field).and_then(Value::as_u64) == Some(0));

		if announced_empty {
			return Ok(Page { items: Vec::new(), envelope, bare: false });
		}

		Err(self.unknown(url))
	}

	fn unknown(&self, url: &str) -> DecodeError {
		DecodeError::UnknownShape { url: url.to_owned(), expected: self.describe() }
	}
}

/// One decoded page: its items plus the envelope fields used to advance the cursor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
	/// Items in response order.
	pub items: Vec<Value>,
	/// Body without the item array.
	pub envelope: Map<String, Value>,
	/// `true` when the body was a bare array with no envelope.
	pub bare: bool,
}
impl Page {
	fn bare(items: Vec<Value>) -> Self {
		Self { items, envelope: Map::new(), bare: true }
	}

	/// Non-negative integer envelope field, accepting numeric strings.
	pub fn number(&self, key: &str) -> Option<u64> {
		match self.envelope.get(key)? {
			Value::Number(n) => n.as_u64(),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	/// Total reported by the server under `total` or `totalResults`.
	pub fn reported_total(&self) -> Option<u64> {
		COUNT_FIELDS.iter().find_map(|field| self.number(field))
	}
}
