//! Crate-level error types shared by the token manager, dispatcher, paginators, and jobs.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; raised before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network or IO failure below HTTP.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Snapshot file could not be read or written.
	#[error(transparent)]
	Snapshot(#[from] SnapshotError),

	/// Token grant was rejected or returned an unusable body.
	#[error("Authentication failed: {reason}.")]
	Authentication {
		/// Grant failure summary.
		reason: String,
	},
	/// Endpoint requires an entitlement the API client does not hold.
	#[error(
		"API client lacks the {entitlement} entitlement required by {endpoint} (HTTP {status}). {remediation}"
	)]
	Entitlement {
		/// Logical endpoint name.
		endpoint: &'static str,
		/// Entitlement label.
		entitlement: &'static str,
		/// HTTP status returned by the tenant.
		status: u16,
		/// Operator-facing remediation hint.
		remediation: &'static str,
	},
	/// Non-success HTTP status surfaced after retries.
	#[error("Request to {url} failed with HTTP {status}.")]
	Request {
		/// Request URL.
		url: String,
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body_preview: Option<String>,
	},
	/// Request did not complete within the configured timeout, retries included.
	#[error("Request to {url} timed out.")]
	Timeout {
		/// Request URL.
		url: String,
	},
}
impl Error {
	/// Returns `true` for failures that must abort the whole traversal or fan-out.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Config(_) | Self::Authentication { .. } | Self::Entitlement { .. })
	}

	/// HTTP status attached to the error, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Request { status, .. } | Self::Entitlement { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` when the tenant answered HTTP 404.
	pub fn is_not_found(&self) -> bool {
		self.status() == Some(404)
	}

	/// Returns `true` when the tenant answered HTTP 401 or 403.
	pub fn is_forbidden(&self) -> bool {
		matches!(self.status(), Some(401 | 403))
	}

	pub(crate) fn authentication(reason: impl Into<String>) -> Self {
		Self::Authentication { reason: reason.into() }
	}

	/// Lifts a transport failure for `url`, keeping timeouts distinguishable.
	pub(crate) fn from_transport(url: &str, err: TransportError) -> Self {
		match err {
			TransportError::Timeout => Self::Timeout { url: url.to_owned() },
			other => Self::Transport(other),
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Environment name is not one of the known tenants.
	#[error("Unknown environment `{name}`; expected one of: {known}.")]
	UnknownEnvironment {
		/// Rejected name.
		name: String,
		/// Comma separated list of accepted names.
		known: String,
	},
	/// Object kind is not in the catalog.
	#[error("Unknown object kind `{name}`; expected one of: {known}.")]
	UnknownKind {
		/// Rejected name.
		name: String,
		/// Comma separated list of accepted names.
		known: String,
	},
	/// Required variable is unset or empty.
	#[error("Environment variable {var} is required.")]
	MissingVar {
		/// Variable name.
		var: String,
	},
	/// Variable is present but cannot be parsed.
	#[error("Environment variable {var} has an invalid value `{value}`.")]
	InvalidValue {
		/// Variable name.
		var: String,
		/// Raw value.
		value: String,
	},
	/// Tenant URL cannot be parsed or joined.
	#[error("Tenant URL `{url}` is invalid.")]
	InvalidTenantUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Request exceeded its deadline.
	#[error("Request timed out.")]
	Timeout,
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the tenant.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the tenant.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` when the retry layer should try again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Timeout | Self::Network { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Response decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Body is not valid JSON.
	#[error("Response from {url} is not valid JSON.")]
	Json {
		/// Request URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Body is JSON but matches none of the expected shapes.
	#[error("Response from {url} matches none of the expected shapes ({expected}).")]
	UnknownShape {
		/// Request URL.
		url: String,
		/// Human readable list of accepted shapes.
		expected: String,
	},
}

/// Snapshot file failures.
#[derive(Debug, ThisError)]
pub enum SnapshotError {
	/// Filesystem operation failed.
	#[error("Failed to {action} {path}.")]
	Io {
		/// Operation label.
		action: &'static str,
		/// Affected path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Record could not be serialized or a stored line could not be parsed.
	#[error("Snapshot {path} contains malformed JSON at line {line}.")]
	Json {
		/// Affected path.
		path: String,
		/// One-based line number, zero for serialization failures.
		line: usize,
		/// Underlying serde failure.
		#[source]
		source: serde_json::Error,
	},
	/// Detail job ran before its parent snapshot existed.
	#[error("Snapshot {path} not found; run the `{producer}` job first.")]
	MissingParent {
		/// Expected parent path.
		path: String,
		/// Job that produces the parent snapshot.
		producer: &'static str,
	},
}
