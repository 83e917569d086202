//! Bounded parallel detail fetches over a known set of identifiers.
//!
//! [`DetailFetcher::fetch_all`] warms the token once, serially, then starts a fixed number of
//! worker tasks that pull identifiers from a shared queue. Every identifier yields exactly one
//! [`DetailReport`] in completion order. HTTP 404 is a soft [`DetailOutcome::NotFound`]; other
//! per-identifier failures are reported, not raised. Fatal errors (authentication,
//! entitlement, configuration) abort the remaining workers and discard pending results.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{sync::mpsc, task::JoinSet};
// self
use crate::{
	_prelude::*,
	client::{ApiClient, ApiRequest, ContentKind, EntitlementGate},
	error::ConfigError,
	obs::{self, OpKind},
};

/// Boxed future returned by [`DetailFetch::fetch`].
pub type DetailFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + 'a + Send>>;

/// Per-identifier detail operation.
pub trait DetailFetch
where
	Self: 'static + Send + Sync,
{
	/// Fetches the detail document for `id`.
	fn fetch<'a>(&'a self, client: &'a ApiClient, id: &'a str) -> DetailFuture<'a>;
}

/// Result of one detail fetch.
#[derive(Debug)]
pub enum DetailOutcome {
	/// Detail document.
	Found(Value),
	/// HTTP 404; the parent disappeared upstream.
	NotFound,
	/// HTTP 401/403 outside an entitlement gate.
	Forbidden(Error),
	/// Any other failure after retries.
	Failed(Error),
}
impl DetailOutcome {
	fn classify(result: Result<Value>) -> Result<Self> {
		match result {
			Ok(value) => Ok(Self::Found(value)),
			Err(err) if err.is_fatal() => Err(err),
			Err(err) if err.is_not_found() => Ok(Self::NotFound),
			Err(err) if err.is_forbidden() => Ok(Self::Forbidden(err)),
			Err(err) => Ok(Self::Failed(err)),
		}
	}

	/// Short label for logs.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Found(_) => "found",
			Self::NotFound => "not_found",
			Self::Forbidden(_) => "forbidden",
			Self::Failed(_) => "failed",
		}
	}
}

/// Outcome keyed by the identifier it belongs to.
#[derive(Debug)]
pub struct DetailReport {
	/// Parent identifier.
	pub id: String,
	/// Fetch outcome.
	pub outcome: DetailOutcome,
}

/// Fixed-size worker pool for detail fetches.
#[derive(Clone, Debug)]
pub struct DetailFetcher {
	client: Arc<ApiClient>,
	workers: usize,
	rate_limit_delay: StdDuration,
}
impl DetailFetcher {
	/// Pool of `workers` tasks (at least one) sharing `client`.
	pub fn new(client: Arc<ApiClient>, workers: usize) -> Self {
		Self { client, workers: workers.max(1), rate_limit_delay: StdDuration::ZERO }
	}

	/// Pause each worker takes after every request.
	pub fn with_rate_limit_delay(mut self, delay: StdDuration) -> Self {
		self.rate_limit_delay = delay;

		self
	}

	/// Fetches every identifier with `op` and returns the reports in completion order.
	pub async fn fetch_all<I, F>(&self, ids: I, op: Arc<F>) -> Result<Vec<DetailReport>>
	where
		I: IntoIterator<Item = String>,
		F: ?Sized + DetailFetch,
	{
		let queue = ids.into_iter().collect::<VecDeque<_>>();
		let total = queue.len();

		if total == 0 {
			return Ok(Vec::new());
		}

		self.client.warm_up().await?;

		let queue = Arc::new(Mutex::new(queue));
		let (tx, mut rx) = mpsc::unbounded_channel::<Result<DetailReport>>();
		let mut workers = JoinSet::new();

		for _ in 0..self.workers.min(total) {
			let client = self.client.clone();
			let op = op.clone();
			let queue = queue.clone();
			let tx = tx.clone();
			let delay = self.rate_limit_delay;

			workers.spawn(async move {
				loop {
					let next = queue.lock().pop_front();
					let Some(id) = next else { break };
					let result =
						obs::observe(OpKind::DetailFetch, "worker", op.fetch(&client, &id)).await;
					let message = DetailOutcome::classify(result)
						.map(|outcome| DetailReport { id, outcome });
					let fatal = message.is_err();

					if tx.send(message).is_err() || fatal {
						break;
					}
					if !delay.is_zero() {
						tokio::time::sleep(delay).await;
					}
				}
			});
		}

		drop(tx);

		let mut reports = Vec::with_capacity(total);

		while let Some(message) = rx.recv().await {
			match message {
				Ok(report) => {
					match &report.outcome {
						DetailOutcome::Found(_) => {
							tracing::debug!(id = %report.id, "Detail fetched.");
						},
						DetailOutcome::NotFound => {
							tracing::warn!(id = %report.id, "Detail not found; skipping.");
						},
						DetailOutcome::Forbidden(err) | DetailOutcome::Failed(err) => {
							tracing::warn!(id = %report.id, error = %err, "Detail fetch failed.");
						},
					}

					reports.push(report);
				},
				Err(err) => {
					tracing::error!(
						error = %err,
						"Fatal error during detail fan-out; aborting workers."
					);

					workers.abort_all();

					return Err(err);
				},
			}
		}

		while let Some(joined) = workers.join_next().await {
			match joined {
				Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
				_ => (),
			}
		}

		tracing::info!(fetched = reports.len(), total, "Detail fan-out finished.");

		Ok(reports)
	}
}

/// `{collection}/{id}` with the collection's media type and entitlement gate.
#[derive(Clone, Debug)]
pub struct PathDetail {
	collection: Url,
	content: ContentKind,
	gate: Option<EntitlementGate>,
}
impl PathDetail {
	/// Plain JSON detail below `collection`.
	pub fn new(collection: Url) -> Self {
		Self { collection, content: ContentKind::Json, gate: None }
	}

	/// Overrides the negotiated media type.
	pub fn content(mut self, content: ContentKind) -> Self {
		self.content = content;

		self
	}

	/// Classifies 401/403 answers with `gate`.
	pub fn gated(mut self, gate: Option<EntitlementGate>) -> Self {
		self.gate = gate;

		self
	}
}
impl DetailFetch for PathDetail {
	fn fetch<'a>(&'a self, client: &'a ApiClient, id: &'a str) -> DetailFuture<'a> {
		Box::pin(async move {
			let url = child_url(&self.collection, &[id])?;
			let request = ApiRequest::get(url).content(self.content).gated(self.gate);

			client.send(&request).await
		})
	}
}

/// Application detail with its entitlements and SSO configuration folded in.
///
/// Sub-resource failures are logged and back-filled (`entitlements: []`,
/// `sso_configuration: {}`) so every record has the same shape.
#[derive(Clone, Debug)]
pub struct ApplicationDetail {
	collection: Url,
}
impl ApplicationDetail {
	/// Detail below `collection`, normally `/v1.0/applications`.
	pub fn new(collection: Url) -> Self {
		Self { collection }
	}

	async fn sub_resource(
		client: &ApiClient,
		url: Url,
		id: &str,
		label: &'static str,
	) -> Result<Option<Value>> {
		match client.send(&ApiRequest::get(url)).await {
			Ok(body) => Ok(Some(body)),
			Err(err) if err.is_fatal() => Err(err),
			Err(err) => {
				tracing::warn!(
					id,
					resource = label,
					error = %err,
					"Sub-resource fetch failed; using default."
				);

				Ok(None)
			},
		}
	}
}
impl DetailFetch for ApplicationDetail {
	fn fetch<'a>(&'a self, client: &'a ApiClient, id: &'a str) -> DetailFuture<'a> {
		Box::pin(async move {
			let detail_url = child_url(&self.collection, &[id])?;
			let mut data = client.send(&ApiRequest::get(detail_url)).await?;
			let entitlements_url = child_url(&self.collection, &[id, "entitlements"])?;
			let sso_url = child_url(&self.collection, &[id, "sso"])?;
			let entitlements = Self::sub_resource(client, entitlements_url, id, "entitlements")
				.await?
				.and_then(|body| match body {
					Value::Array(_) => Some(body),
					Value::Object(mut map) => map.remove("entitlements"),
					_ => None,
				})
				.unwrap_or_else(|| Value::Array(Vec::new()));
			let sso = Self::sub_resource(client, sso_url, id, "sso")
				.await?
				.unwrap_or_else(|| Value::Object(Map::new()));

			if let Value::Object(map) = &mut data {
				map.insert("entitlements".into(), entitlements);
				map.insert("sso_configuration".into(), sso);
			}

			Ok(data)
		})
	}
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn child_url(base: &Url, segments: &[&str]) -> Result<Url> {
	let mut child = base.clone();

	child
		.path_segments_mut()
		.map_err(|_| ConfigError::InvalidTenantUrl {
			url: base.to_string(),
			source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
		})?
		.pop_if_empty()
		.extend(segments);

	Ok(child)
}
