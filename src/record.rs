//! Snapshot record model and identifier extraction.

// crates.io
use serde::{
	Serializer,
	ser::{Error as _, SerializeMap},
};
use time::format_description::well_known::Rfc3339;
// self
use crate::_prelude::*;

/// How an item's stable identifier is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdRule {
	/// First non-null field among the listed keys.
	Keys(&'static [&'static str]),
	/// Direct `id` when present, otherwise the last path segment of `_links.self.href`.
	SelfHref,
}
impl IdRule {
	/// Extracts the identifier from `item`.
	pub fn resolve(&self, item: &Value) -> Option<Value> {
		match self {
			Self::Keys(keys) => first_present(item, keys),
			Self::SelfHref => first_present(item, &["id"]).or_else(|| {
				item.pointer("/_links/self/href")
					.and_then(Value::as_str)
					.and_then(last_segment)
					.map(Value::from)
			}),
		}
	}
}

/// Secondary field copied from the item next to the identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtraField {
	/// Output field name.
	pub name: &'static str,
	/// Item keys tried in order.
	pub keys: &'static [&'static str],
}
impl ExtraField {
	/// Reads the field from `item`, `null` when absent.
	pub fn resolve(&self, item: &Value) -> Value {
		first_present(item, self.keys).unwrap_or(Value::Null)
	}
}

/// One line of a snapshot file.
///
/// Serializes to a flat object: `fetch_timestamp`, the identifier under `id_field`, any extra
/// fields, then `data`.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
	/// Fetch instant, written as RFC 3339 UTC.
	pub fetch_timestamp: OffsetDateTime,
	/// Name of the identifier field.
	pub id_field: &'static str,
	/// Identifier value, `null` when the item carried none.
	pub id: Value,
	/// Additional top-level fields in output order.
	pub extra: Vec<(&'static str, Value)>,
	/// Raw payload.
	pub data: Value,
}
impl Record {
	/// Builds a record stamped now.
	pub fn new(id_field: &'static str, id: Value, data: Value) -> Self {
		Self { fetch_timestamp: OffsetDateTime::now_utc(), id_field, id, extra: Vec::new(), data }
	}

	/// Builds a record from a list item using `rule` and `extras`.
	pub fn from_item(
		id_field: &'static str,
		rule: IdRule,
		extras: &[ExtraField],
		data: Value,
	) -> Self {
		let id = rule.resolve(&data).unwrap_or(Value::Null);
		let extra = extras.iter().map(|field| (field.name, field.resolve(&data))).collect();

		Self { extra, ..Self::new(id_field, id, data) }
	}

	/// Appends an extra field.
	pub fn with_extra(mut self, name: &'static str, value: impl Into<Value>) -> Self {
		self.extra.push((name, value.into()));

		self
	}

	/// Identifier rendered as text, `None` for `null` or structured values.
	pub fn id_text(&self) -> Option<String> {
		id_text(&self.id)
	}
}
impl Serialize for Record {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let timestamp = self
			.fetch_timestamp
			.to_offset(time::UtcOffset::UTC)
			.format(&Rfc3339)
			.map_err(S::Error::custom)?;
		let mut map = serializer.serialize_map(Some(self.extra.len() + 3))?;

		map.serialize_entry("fetch_timestamp", &timestamp)?;
		map.serialize_entry(self.id_field, &self.id)?;

		for (name, value) in &self.extra {
			map.serialize_entry(name, value)?;
		}

		map.serialize_entry("data", &self.data)?;
		map.end()
	}
}

/// Renders string and integer identifiers as path-safe text.
pub fn id_text(id: &Value) -> Option<String> {
	match id {
		Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

fn first_present(item: &Value, keys: &[&str]) -> Option<Value> {
	keys.iter().find_map(|key| item.get(*key).filter(|value| !value.is_null()).cloned())
}

fn last_segment(href: &str) -> Option<String> {
	let path = match Url::parse(href) {
		Ok(url) => url.path().to_owned(),
		Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_owned(),
	};

	path.split('/').rfind(|segment| !segment.is_empty()).map(str::to_owned)
}
