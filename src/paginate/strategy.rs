//! Cursor state machines for the page families the tenant exposes.
//!
//! A strategy only decides which parameters the next request carries and whether another
//! request is needed after a page arrived; fetching and item decoding belong to the
//! [`Paginator`](crate::paginate::Paginator).

// self
use crate::{_prelude::*, client::ApiRequest, paginate::Page};

/// Cursor logic of one page family.
pub trait PageStrategy
where
	Self: Send,
{
	/// Adds the current cursor to `request`.
	fn prepare(&self, request: ApiRequest) -> ApiRequest;

	/// Consumes `page` and returns `true` when another page must be fetched.
	fn advance(&mut self, page: &Page) -> bool;

	/// Cursor rendered for logs.
	fn cursor(&self) -> String;
}

/// `offset`/`limit` traversal that reads `total` from every page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetLimit {
	offset: u64,
	limit: u64,
}
impl OffsetLimit {
	/// Starts at offset zero.
	pub fn new(limit: u32) -> Self {
		Self { offset: 0, limit: u64::from(limit.max(1)) }
	}

	/// Offset of the next request.
	pub fn offset(&self) -> u64 {
		self.offset
	}
}
impl PageStrategy for OffsetLimit {
	fn prepare(&self, request: ApiRequest) -> ApiRequest {
		request.param("limit", self.limit).param("offset", self.offset)
	}

	fn advance(&mut self, page: &Page) -> bool {
		if page.bare || page.items.is_empty() {
			return false;
		}

		let total = page.number("total").unwrap_or(0);

		if total == 0 || self.offset + self.limit >= total {
			return false;
		}

		self.offset += self.limit;

		true
	}

	fn cursor(&self) -> String {
		format!("offset={}, limit={}", self.offset, self.limit)
	}
}

/// SCIM `startIndex`/`count` traversal (one-based) driven by `totalResults`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScimIndex {
	start_index: u64,
	count: u64,
}
impl ScimIndex {
	/// Starts at index one.
	pub fn new(count: u32) -> Self {
		Self { start_index: 1, count: u64::from(count.max(1)) }
	}

	/// `startIndex` of the next request.
	pub fn start_index(&self) -> u64 {
		self.start_index
	}
}
impl PageStrategy for ScimIndex {
	fn prepare(&self, request: ApiRequest) -> ApiRequest {
		request.param("count", self.count).param("startIndex", self.start_index)
	}

	fn advance(&mut self, page: &Page) -> bool {
		if page.items.is_empty() {
			return false;
		}

		let total_results = page.number("totalResults").unwrap_or(0);

		if total_results == 0 || self.start_index + self.count - 1 >= total_results {
			return false;
		}

		self.start_index += self.count;

		true
	}

	fn cursor(&self) -> String {
		format!("startIndex={}, count={}", self.start_index, self.count)
	}
}

/// `limit`/`page` traversal: the first request carries no cursor and later ones reuse the
/// `limit` and `page` echoed by the server until `total` items were seen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageNumber {
	next_page: Option<u64>,
	limit: u64,
	fetched: u64,
}
impl PageNumber {
	/// `default_limit` applies when the server does not echo `limit`.
	pub fn new(default_limit: u32) -> Self {
		Self { next_page: None, limit: u64::from(default_limit.max(1)), fetched: 0 }
	}
}
impl PageStrategy for PageNumber {
	fn prepare(&self, request: ApiRequest) -> ApiRequest {
		match self.next_page {
			Some(page) => request.param("limit", self.limit).param("page", page),
			None => request,
		}
	}

	fn advance(&mut self, page: &Page) -> bool {
		self.fetched += page.items.len() as u64;

		if page.items.is_empty() {
			return false;
		}
		if let Some(limit) = page.number("limit").filter(|limit| *limit > 0) {
			self.limit = limit;
		}

		let current = page.number("page").or(self.next_page).unwrap_or(1);

		if self.fetched >= page.number("total").unwrap_or(0) {
			return false;
		}

		self.next_page = Some(current + 1);

		true
	}

	fn cursor(&self) -> String {
		match self.next_page {
			Some(page) => format!("page={page}, limit={}", self.limit),
			None => "first page".into(),
		}
	}
}

/// One request, no cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SingleShot;
impl PageStrategy for SingleShot {
	fn prepare(&self, request: ApiRequest) -> ApiRequest {
		request
	}

	fn advance(&mut self, _page: &Page) -> bool {
		false
	}

	fn cursor(&self) -> String {
		"single request".into()
	}
}
