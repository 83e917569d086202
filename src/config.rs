//! Per-environment settings resolved once at startup and passed to every component.
//!
//! Credentials come from `IBM_VERIFY_<ENV>_TENANT_URL`, `IBM_VERIFY_<ENV>_CLIENT_ID`, and
//! `IBM_VERIFY_<ENV>_CLIENT_SECRET`; the remaining tunables are shared across environments
//! and fall back to the defaults documented on each [`Settings`] field.

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// crates.io
use backon::ExponentialBuilder;
use oauth2::http::Method;
// self
use crate::{_prelude::*, auth::Secret, error::ConfigError};

/// Tenants the tool knows how to snapshot.
pub const KNOWN_ENVIRONMENTS: [&str; 6] = ["bidevt", "widevt", "biqat", "wiqat", "biprt", "wiprt"];

const VAR_PREFIX: &str = "IBM_VERIFY";
const MAX_BACKOFF: StdDuration = StdDuration::from_secs(120);

/// Validated environment name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Environment(String);
impl Environment {
	/// Accepts any casing of a [`KNOWN_ENVIRONMENTS`] entry.
	pub fn new(name: impl AsRef<str>) -> Result<Self, ConfigError> {
		let normalized = name.as_ref().trim().to_ascii_lowercase();

		if KNOWN_ENVIRONMENTS.contains(&normalized.as_str()) {
			Ok(Self(normalized))
		} else {
			Err(ConfigError::UnknownEnvironment {
				name: name.as_ref().to_owned(),
				known: KNOWN_ENVIRONMENTS.join(", "),
			})
		}
	}

	/// Lowercase environment name.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Name of the per-environment variable holding `field`, e.g. `IBM_VERIFY_BIDEVT_CLIENT_ID`.
	pub fn var(&self, field: &str) -> String {
		format!("{VAR_PREFIX}_{}_{field}", self.0.to_ascii_uppercase())
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl TryFrom<String> for Environment {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<Environment> for String {
	fn from(value: Environment) -> Self {
		value.0
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Tenant URL plus the API client's credentials. Immutable for the process lifetime.
#[derive(Clone, Debug)]
pub struct Credentials {
	/// Tenant base URL, e.g. `https://acme.verify.ibm.com`.
	pub tenant: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: Secret,
}
impl Credentials {
	/// Path of the client-credentials token endpoint below the tenant.
	pub const TOKEN_PATH: &str = "/v1.0/endpoint/default/token";

	/// Bundles the tenant URL with its client credentials.
	pub fn new(
		tenant: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<Secret>,
	) -> Self {
		Self { tenant, client_id: client_id.into(), client_secret: client_secret.into() }
	}

	/// Resolves an absolute API path (`/v1.0/...`) against the tenant URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let base = self.tenant.as_str().trim_end_matches('/');
		let raw = format!("{base}/{}", path.trim_start_matches('/'));

		Url::parse(&raw).map_err(|source| ConfigError::InvalidTenantUrl { url: raw, source })
	}

	/// Token endpoint URL for this tenant.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		self.endpoint(Self::TOKEN_PATH)
	}
}

/// Retry, backoff, and timeout policy applied by the resilient transport.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Retries allowed after the first attempt.
	pub max_retries: usize,
	/// Backoff factor in seconds; retry `n` waits `factor * 2^(n-1)`.
	pub backoff_factor: f64,
	/// Per-attempt timeout.
	pub timeout: StdDuration,
	/// Statuses treated as transient.
	pub retry_statuses: Vec<u16>,
	/// Methods that may be retried.
	pub retry_methods: Vec<Method>,
}
impl RetryPolicy {
	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: usize) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the backoff factor; negative or non-finite values collapse to zero.
	pub fn with_backoff_factor(mut self, factor: f64) -> Self {
		self.backoff_factor = if factor.is_finite() && factor > 0. { factor } else { 0. };

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Returns `true` when `status` belongs to the transient set.
	pub fn is_retryable_status(&self, status: u16) -> bool {
		self.retry_statuses.contains(&status)
	}

	/// Returns `true` when requests using `method` may be retried.
	pub fn allows(&self, method: &Method) -> bool {
		self.retry_methods.contains(method)
	}

	/// Delay slept before retry `attempt` (one-based).
	pub fn delay_for(&self, attempt: u32) -> StdDuration {
		if attempt == 0 {
			return StdDuration::ZERO;
		}

		let secs = self.backoff_factor * 2_f64.powi(attempt.saturating_sub(1).min(30) as i32);

		StdDuration::try_from_secs_f64(secs).unwrap_or(MAX_BACKOFF).min(MAX_BACKOFF)
	}

	/// Backoff schedule consumed by the transport's retry loop.
	pub fn backoff(&self) -> ExponentialBuilder {
		ExponentialBuilder::default()
			.with_min_delay(self.delay_for(1))
			.with_max_delay(MAX_BACKOFF)
			.with_factor(2.)
			.with_max_times(self.max_retries)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			backoff_factor: 2.,
			timeout: StdDuration::from_secs(30),
			retry_statuses: vec![429, 500, 502, 503, 504],
			retry_methods: vec![Method::GET, Method::POST],
		}
	}
}

/// Fully resolved configuration for one environment.
#[derive(Clone, Debug)]
pub struct Settings {
	/// Selected environment.
	pub environment: Environment,
	/// Tenant and API client credentials.
	pub credentials: Credentials,
	/// Transport retry policy (`MAX_RETRIES`, `RETRY_BACKOFF`, `REQUEST_TIMEOUT`).
	pub retry: RetryPolicy,
	/// Page size for paginated endpoints (`DEFAULT_PAGE_SIZE`, default 100).
	pub page_size: u32,
	/// Detail fan-out worker count (`MAX_WORKERS`, default 10).
	pub workers: usize,
	/// Pause between sequential detail requests (`RATE_LIMIT_DELAY`, default 0).
	pub rate_limit_delay: StdDuration,
	/// Snapshot directory, `<OUTPUT_DIR>/<env>` (default `data/<env>`).
	pub output_dir: PathBuf,
}
impl Settings {
	/// Resolves settings from the process environment.
	pub fn from_env(environment: &str) -> Result<Self, ConfigError> {
		Self::from_lookup(environment, |key| std::env::var(key).ok())
	}

	/// Resolves settings through `lookup`, which maps a variable name to its value.
	pub fn from_lookup<F>(environment: &str, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let environment = Environment::new(environment)?;
		let required = |field: &str| {
			let var = environment.var(field);

			match lookup(&var) {
				Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
				_ => Err(ConfigError::MissingVar { var }),
			}
		};
		let tenant_raw = required("TENANT_URL")?;
		let client_id = required("CLIENT_ID")?;
		let client_secret = required("CLIENT_SECRET")?;
		let tenant = Url::parse(&tenant_raw)
			.map_err(|source| ConfigError::InvalidTenantUrl { url: tenant_raw.clone(), source })?;
		let timeout = parse_var(&lookup, "REQUEST_TIMEOUT", 30_u64)?;
		let max_retries = parse_var(&lookup, "MAX_RETRIES", 3_usize)?;
		let backoff = parse_var(&lookup, "RETRY_BACKOFF", 2_f64)?;

		if !backoff.is_finite() || backoff < 0. {
			return Err(ConfigError::InvalidValue {
				var: "RETRY_BACKOFF".into(),
				value: backoff.to_string(),
			});
		}

		let page_size = parse_var(&lookup, "DEFAULT_PAGE_SIZE", 100_u32)?;
		let workers = parse_var(&lookup, "MAX_WORKERS", 10_usize)?;
		let rate_limit_delay = parse_var(&lookup, "RATE_LIMIT_DELAY", 0_f64)?;
		let rate_limit_delay = StdDuration::try_from_secs_f64(rate_limit_delay).map_err(|_| {
			ConfigError::InvalidValue {
				var: "RATE_LIMIT_DELAY".into(),
				value: rate_limit_delay.to_string(),
			}
		})?;

		if page_size == 0 {
			return Err(ConfigError::InvalidValue {
				var: "DEFAULT_PAGE_SIZE".into(),
				value: "0".into(),
			});
		}
		if workers == 0 {
			return Err(ConfigError::InvalidValue { var: "MAX_WORKERS".into(), value: "0".into() });
		}

		let output_root =
			lookup("OUTPUT_DIR").filter(|v| !v.trim().is_empty()).unwrap_or_else(|| "data".into());
		let output_dir = PathBuf::from(output_root).join(environment.as_str());

		Ok(Self {
			credentials: Credentials::new(tenant, client_id, client_secret),
			environment,
			retry: RetryPolicy::default()
				.with_max_retries(max_retries)
				.with_backoff_factor(backoff)
				.with_timeout(StdDuration::from_secs(timeout)),
			page_size,
			workers,
			rate_limit_delay,
			output_dir,
		})
	}
}

fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	match lookup(var) {
		Some(raw) if !raw.trim().is_empty() => raw
			.trim()
			.parse()
			.map_err(|_| ConfigError::InvalidValue { var: var.into(), value: raw }),
		_ => Ok(default),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |key| map.get(key).cloned()
	}

	const BASE: [(&str, &str); 3] = [
		("IBM_VERIFY_WIPRT_TENANT_URL", "https://acme.verify.ibm.com/"),
		("IBM_VERIFY_WIPRT_CLIENT_ID", "client"),
		("IBM_VERIFY_WIPRT_CLIENT_SECRET", "secret"),
	];

	#[test]
	fn resolves_defaults_for_known_environment() {
		let settings =
			Settings::from_lookup("WIPRT", lookup_from(&BASE)).expect("Settings should resolve.");

		assert_eq!(settings.environment.as_str(), "wiprt");
		assert_eq!(settings.retry, RetryPolicy::default());
		assert_eq!(settings.page_size, 100);
		assert_eq!(settings.workers, 10);
		assert_eq!(settings.output_dir, PathBuf::from("data").join("wiprt"));
		assert_eq!(
			settings.credentials.token_endpoint().expect("Token endpoint should resolve.").as_str(),
			"https://acme.verify.ibm.com/v1.0/endpoint/default/token"
		);
	}

	#[test]
	fn unknown_environment_is_rejected() {
		let err = Settings::from_lookup("staging", lookup_from(&BASE))
			.expect_err("Unknown environments must fail.");

		assert!(matches!(err, ConfigError::UnknownEnvironment { .. }));
	}

	#[test]
	fn missing_secret_names_the_variable() {
		let err = Settings::from_lookup("wiprt", lookup_from(&BASE[..2]))
			.expect_err("Missing secret must fail.");

		match err {
			ConfigError::MissingVar { var } => assert_eq!(var, "IBM_VERIFY_WIPRT_CLIENT_SECRET"),
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn tunables_override_defaults() {
		let mut pairs = BASE.to_vec();

		pairs.extend([
			("MAX_RETRIES", "5"),
			("RETRY_BACKOFF", "0.5"),
			("DEFAULT_PAGE_SIZE", "50"),
			("OUTPUT_DIR", "/tmp/out"),
		]);

		let settings =
			Settings::from_lookup("wiprt", lookup_from(&pairs)).expect("Settings should resolve.");

		assert_eq!(settings.retry.max_retries, 5);
		assert_eq!(settings.retry.delay_for(1), StdDuration::from_millis(500));
		assert_eq!(settings.retry.delay_for(3), StdDuration::from_secs(2));
		assert_eq!(settings.page_size, 50);
		assert_eq!(settings.output_dir, PathBuf::from("/tmp/out/wiprt"));

		pairs.push(("MAX_WORKERS", "many"));

		let err = Settings::from_lookup("wiprt", lookup_from(&pairs))
			.expect_err("Unparsable tunables must fail.");

		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	#[test]
	fn backoff_is_capped() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.delay_for(0), StdDuration::ZERO);
		assert_eq!(policy.delay_for(1), StdDuration::from_secs(2));
		assert_eq!(policy.delay_for(2), StdDuration::from_secs(4));
		assert_eq!(policy.delay_for(12), MAX_BACKOFF);
		assert!(policy.allows(&Method::POST));
		assert!(!policy.allows(&Method::DELETE));
		assert!(policy.is_retryable_status(503));
		assert!(!policy.is_retryable_status(404));
	}
}
