//! Lazy traversal of paginated collections.
//!
//! A [`Paginator`] keeps exactly one page in flight: [`Paginator::next`] drains the buffered
//! items of the current page before asking its [`PageStrategy`] for the next cursor. Pages are
//! fetched strictly in cursor order and items keep response order.
//!
//! Failure policy:
//! - fatal errors (authentication, entitlement, configuration) always propagate;
//! - any other failure on the first page propagates, since there is no partial result;
//! - a later page failure is logged, ends the sequence, and is kept as the
//!   [`Paginator::interruption`] so callers can report an incomplete traversal.

mod shape;
mod strategy;

pub use shape::*;
pub use strategy::*;

// self
use crate::{
	_prelude::*,
	client::{ApiClient, ApiRequest},
	obs::{self, OpKind},
};

/// Page family of a collection endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageFamily {
	/// `offset`/`limit` with `total`.
	OffsetLimit,
	/// SCIM `startIndex`/`count` with `totalResults`.
	Scim,
	/// `limit`/`page` with `total`; the first request carries no cursor.
	PageNumber {
		/// Limit assumed until the server echoes one.
		default_limit: u32,
	},
	/// One request returning the whole collection.
	SingleShot,
}
impl PageFamily {
	/// Fresh cursor for this family using `page_size` where the family takes one.
	pub fn strategy(self, page_size: u32) -> Box<dyn PageStrategy> {
		match self {
			Self::OffsetLimit => Box::new(OffsetLimit::new(page_size)),
			Self::Scim => Box::new(ScimIndex::new(page_size)),
			Self::PageNumber { default_limit } => Box::new(PageNumber::new(default_limit)),
			Self::SingleShot => Box::new(SingleShot),
		}
	}
}

/// Progress counters of one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageStats {
	/// Pages fetched successfully.
	pub pages: u64,
	/// Items handed to the caller.
	pub items: u64,
	/// Last `total`/`totalResults` reported by the server.
	pub reported_total: Option<u64>,
}

/// Finite, non-restartable item sequence over one collection.
pub struct Paginator<'c> {
	client: &'c ApiClient,
	request: ApiRequest,
	strategy: Box<dyn PageStrategy>,
	shape: ItemsShape,
	buffer: VecDeque<Value>,
	done: bool,
	stats: PageStats,
	interruption: Option<Error>,
}
impl<'c> Paginator<'c> {
	/// Prepares a traversal of `request` without fetching anything yet.
	pub fn new(
		client: &'c ApiClient,
		request: ApiRequest,
		strategy: Box<dyn PageStrategy>,
		shape: ItemsShape,
	) -> Self {
		Self {
			client,
			request,
			strategy,
			shape,
			buffer: VecDeque::new(),
			done: false,
			stats: PageStats::default(),
			interruption: None,
		}
	}

	/// Yields the next item, fetching the next page when the buffer is empty.
	pub async fn next(&mut self) -> Result<Option<Value>> {
		loop {
			if let Some(item) = self.buffer.pop_front() {
				self.stats.items += 1;

				return Ok(Some(item));
			}
			if self.done {
				return Ok(None);
			}

			self.fetch_page().await?;
		}
	}

	/// Drains the remaining items.
	pub async fn collect_all(mut self) -> Result<Vec<Value>> {
		let mut items = Vec::new();

		while let Some(item) = self.next().await? {
			items.push(item);
		}

		Ok(items)
	}

	/// Progress so far.
	pub fn stats(&self) -> PageStats {
		self.stats
	}

	/// Page failure that ended the traversal early, if any.
	pub fn interruption(&self) -> Option<&Error> {
		self.interruption.as_ref()
	}

	/// Takes the page failure that ended the traversal early, if any.
	pub fn take_interruption(&mut self) -> Option<Error> {
		self.interruption.take()
	}

	async fn fetch_page(&mut self) -> Result<()> {
		let request = self.strategy.prepare(self.request.clone());
		let url = request.full_url();
		let cursor = self.strategy.cursor();
		let client = self.client;
		let shape = self.shape;

		tracing::info!(url = %self.request.url, %cursor, "Fetching page.");

		let outcome = obs::observe(OpKind::PageFetch, "paginator", async move {
			let body = client.send(&request).await?;

			Ok(shape.extract(url.as_str(), body)?)
		})
		.await;

		match outcome {
			Ok(page) => {
				self.stats.pages += 1;

				if let Some(total) = page.reported_total() {
					self.stats.reported_total = Some(total);
				}

				self.done = !self.strategy.advance(&page);
				self.buffer.extend(page.items);

				Ok(())
			},
			Err(err) if err.is_fatal() || self.stats.pages == 0 => {
				self.done = true;

				Err(err)
			},
			Err(err) => {
				tracing::error!(
					url = %self.request.url,
					%cursor,
					error = %err,
					"Page fetch failed; ending traversal early."
				);

				self.done = true;
				self.interruption = Some(err);

				Ok(())
			},
		}
	}
}
impl Debug for Paginator<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Paginator")
			.field("url", &self.request.url.as_str())
			.field("cursor", &self.strategy.cursor())
			.field("buffered", &self.buffer.len())
			.field("done", &self.done)
			.field("stats", &self.stats)
			.finish()
	}
}
