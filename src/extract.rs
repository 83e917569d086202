//! Extraction jobs: traverse one object kind and rewrite its snapshot.

// std
use std::{collections::HashSet, path::PathBuf};
// self
use crate::{
	_prelude::*,
	catalog::{DetailShape, Enrichment, Job, KindSpec, ObjectKind},
	client::{ApiClient, ApiRequest},
	config::Settings,
	fanout::{ApplicationDetail, DetailFetch, DetailFetcher, DetailOutcome, PathDetail},
	obs::{self, OpKind},
	paginate::{ItemsShape, PageFamily, Paginator},
	record::{Record, id_text},
	snapshot::{SnapshotWriter, read_parent_snapshot},
};

/// Counts produced by one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionReport {
	/// Extracted kind.
	pub kind: ObjectKind,
	/// Snapshot path.
	pub path: PathBuf,
	/// Records written.
	pub written: usize,
	/// Records the server announced or the parent snapshot listed.
	pub expected: usize,
	/// Detail fetches answered with HTTP 404.
	pub not_found: usize,
	/// Items dropped because of a failure.
	pub failed: usize,
	/// Page failure that ended the traversal early.
	pub interrupted: Option<String>,
}
impl ExtractionReport {
	fn new(kind: ObjectKind, path: PathBuf) -> Self {
		Self { kind, path, written: 0, expected: 0, not_found: 0, failed: 0, interrupted: None }
	}

	/// Returns `true` when nothing was dropped because of a failure.
	pub fn is_complete(&self) -> bool {
		self.failed == 0 && self.interrupted.is_none()
	}
}
impl Display for ExtractionReport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}: fetched {}/{}", self.kind, self.written, self.expected)?;

		if self.not_found > 0 {
			write!(f, ", {} not found", self.not_found)?;
		}
		if self.failed > 0 {
			write!(f, ", {} failed", self.failed)?;
		}
		if let Some(reason) = &self.interrupted {
			write!(f, ", interrupted: {reason}")?;
		}

		Ok(())
	}
}

/// Outcome of a multi-job run.
#[derive(Debug, Default)]
pub struct RunSummary {
	/// Reports of jobs that produced a snapshot.
	pub reports: Vec<ExtractionReport>,
	/// Jobs that failed without producing a snapshot.
	pub failures: Vec<(ObjectKind, Error)>,
}
impl RunSummary {
	/// Returns `true` when every job ran to completion.
	pub fn is_success(&self) -> bool {
		self.failures.is_empty() && self.reports.iter().all(ExtractionReport::is_complete)
	}
}

/// Runs extraction jobs for one environment.
#[derive(Debug)]
pub struct Extractor {
	client: Arc<ApiClient>,
	settings: Settings,
}
impl Extractor {
	/// Binds `client` to the snapshot layout of `settings`.
	pub fn new(settings: &Settings, client: Arc<ApiClient>) -> Self {
		Self { client, settings: settings.clone() }
	}

	/// Snapshot path of `kind`.
	pub fn output_path(&self, kind: ObjectKind) -> PathBuf {
		self.settings.output_dir.join(kind.spec().output_file)
	}

	/// Runs `kinds` in order.
	///
	/// Configuration and authentication errors abort the run; any other job failure is recorded
	/// in the summary and the remaining jobs still run.
	pub async fn run_all(&self, kinds: &[ObjectKind]) -> Result<RunSummary> {
		let mut summary = RunSummary::default();

		for &kind in kinds {
			match self.run(kind).await {
				Ok(report) => summary.reports.push(report),
				Err(err @ (Error::Config(_) | Error::Authentication { .. })) => return Err(err),
				Err(err) => {
					tracing::error!(kind = %kind, error = %err, "Extraction job failed.");

					summary.failures.push((kind, err));
				},
			}
		}

		Ok(summary)
	}

	/// Traverses `kind` and rewrites its snapshot.
	pub async fn run(&self, kind: ObjectKind) -> Result<ExtractionReport> {
		let spec = kind.spec();

		obs::observe(OpKind::Extraction, spec.name, async {
			tracing::info!(kind = %kind, "Starting extraction.");

			let report = match spec.job {
				Job::List { family, shape, enrichment } =>
					self.run_list(kind, spec, family, shape, enrichment).await?,
				Job::Detail { parent, detail } => self.run_detail(kind, spec, parent, detail).await?,
				Job::Single => self.run_single(kind, spec).await?,
			};

			tracing::info!(path = %report.path.display(), "{report}");

			Ok(report)
		})
		.await
	}

	async fn run_list(
		&self,
		kind: ObjectKind,
		spec: &'static KindSpec,
		family: PageFamily,
		shape: ItemsShape,
		enrichment: Enrichment,
	) -> Result<ExtractionReport> {
		let url = self.client.endpoint(spec.path)?;
		let request = ApiRequest::get(url.clone()).content(spec.content).gated(spec.gate);
		let mut paginator =
			Paginator::new(&self.client, request, family.strategy(self.settings.page_size), shape);
		let mut report = ExtractionReport::new(kind, self.output_path(kind));
		let mut writer = SnapshotWriter::create(&report.path)?;

		if enrichment == Enrichment::None {
			while let Some(item) = paginator.next().await? {
				let record = Record::from_item(spec.id_field, spec.id_rule, spec.extras, item);

				if record.id.is_null() {
					tracing::warn!(kind = %kind, "Item carries no identifier.");
				}

				writer.write(&record)?;
			}
		} else {
			let mut records = Vec::new();

			while let Some(item) = paginator.next().await? {
				records.push(Record::from_item(spec.id_field, spec.id_rule, spec.extras, item));
			}

			let detail = PathDetail::new(url).content(spec.content).gated(spec.gate);
			let ids = records.iter().filter_map(Record::id_text).collect::<Vec<_>>();
			let found = self.fan_out(ids, Arc::new(detail)).await?;

			for mut record in records {
				match record.id_text().and_then(|id| found.get(&id)) {
					Some(DetailOutcome::Found(data)) => record.data = data.clone(),
					Some(DetailOutcome::NotFound) if enrichment == Enrichment::DetailOrSkip => {
						report.not_found += 1;

						continue;
					},
					_ if enrichment == Enrichment::DetailOrSkip => {
						report.failed += 1;

						continue;
					},
					_ => {
						tracing::warn!(
							kind = %kind,
							id = %record.id,
							"Keeping list item without detail."
						);
					},
				}

				writer.write(&record)?;
			}
		}

		let stats = paginator.stats();

		report.written = writer.commit()?;
		report.expected =
			usize::try_from(stats.reported_total.unwrap_or(stats.items)).unwrap_or(usize::MAX);
		report.interrupted = paginator.take_interruption().map(|err| err.to_string());

		Ok(report)
	}

	async fn run_detail(
		&self,
		kind: ObjectKind,
		spec: &'static KindSpec,
		parent: ObjectKind,
		detail: DetailShape,
	) -> Result<ExtractionReport> {
		let parent_spec = parent.spec();
		let parents = read_parent_snapshot(&self.output_path(parent), parent.as_str())?;
		let mut report = ExtractionReport::new(kind, self.output_path(kind));
		let mut entries = Vec::with_capacity(parents.len());

		for parent_record in &parents {
			let Some(id) = parent_record.get(parent_spec.id_field).and_then(id_text) else {
				tracing::warn!(kind = %kind, "Skipping parent record without identifier.");

				continue;
			};
			let extra = spec
				.extras
				.iter()
				.map(|field| (field.name, field.resolve(parent_record)))
				.collect::<Vec<_>>();

			entries.push((id, extra));
		}

		report.expected = entries.len();

		let collection = self.client.endpoint(spec.path)?;
		let op: Arc<dyn DetailFetch> = match detail {
			DetailShape::Path =>
				Arc::new(PathDetail::new(collection).content(spec.content).gated(spec.gate)),
			DetailShape::Application => Arc::new(ApplicationDetail::new(collection)),
		};
		let outcomes =
			self.fan_out(entries.iter().map(|(id, _)| id.clone()).collect(), op).await?;
		let mut writer = SnapshotWriter::create(&report.path)?;

		for (id, extra) in entries {
			match outcomes.get(&id) {
				Some(DetailOutcome::Found(data)) => {
					let record = Record {
						extra,
						..Record::new(spec.id_field, Value::String(id), data.clone())
					};

					writer.write(&record)?;
				},
				Some(DetailOutcome::NotFound) => report.not_found += 1,
				_ => report.failed += 1,
			}
		}

		report.written = writer.commit()?;

		Ok(report)
	}

	async fn run_single(&self, kind: ObjectKind, spec: &'static KindSpec) -> Result<ExtractionReport> {
		let url = self.client.endpoint(spec.path)?;
		let request = ApiRequest::get(url).content(spec.content).gated(spec.gate);
		let data = self.client.send(&request).await?;
		let record = Record::new(spec.id_field, Value::from(spec.path), data)
			.with_extra("tenant_url", self.settings.credentials.tenant.as_str().trim_end_matches('/'));
		let mut report = ExtractionReport::new(kind, self.output_path(kind));
		let mut writer = SnapshotWriter::create(&report.path)?;

		writer.write(&record)?;

		report.expected = 1;
		report.written = writer.commit()?;

		Ok(report)
	}

	/// Fetches each distinct identifier once and keys the outcomes by identifier.
	///
	/// Records sharing an identifier all read the same outcome.
	async fn fan_out(
		&self,
		ids: Vec<String>,
		op: Arc<dyn DetailFetch>,
	) -> Result<HashMap<String, DetailOutcome>> {
		let mut seen = HashSet::new();
		let distinct = ids.into_iter().filter(|id| seen.insert(id.clone())).collect::<Vec<_>>();
		let fetcher = DetailFetcher::new(self.client.clone(), self.settings.workers)
			.with_rate_limit_delay(self.settings.rate_limit_delay);
		let reports = fetcher.fetch_all(distinct, op).await?;

		Ok(reports.into_iter().map(|report| (report.id, report.outcome)).collect())
	}
}
