//! Retrying wrapper that owns the crate's single backoff implementation.

// std
use std::time::Duration as StdDuration;
// crates.io
use backon::Retryable;
use oauth2::http::{HeaderMap, Method, Uri, Version};
// self
use crate::{
	_prelude::*,
	config::RetryPolicy,
	error::TransportError,
	http::{HttpRequest, HttpResponse, HttpTransport, ResponseMetadata},
};

/// Connection-reusing transport that retries transient failures.
///
/// Timeouts, network errors, and responses whose status belongs to
/// [`RetryPolicy::retry_statuses`] are retried for methods listed in
/// [`RetryPolicy::retry_methods`], sleeping [`RetryPolicy::delay_for`] between attempts. Once the
/// budget is spent the last response is returned unchanged so callers classify its status,
/// while a last transport failure is returned as the error.
#[derive(Clone)]
pub struct ResilientTransport {
	inner: Arc<dyn HttpTransport>,
	policy: RetryPolicy,
}
impl ResilientTransport {
	/// Wraps `inner` with `policy`.
	pub fn new(inner: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
		Self { inner, policy }
	}

	/// Active retry policy.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Executes `request`, retrying transient failures within the policy budget.
	pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
		let template = &RequestTemplate::from(request);
		let policy = &self.policy;
		let inner = self.inner.as_ref();
		let retryable_method = policy.allows(&template.method);
		let attempt = move || async move {
			let response =
				inner.send(template.build(), policy.timeout).await.map_err(Attempt::Failed)?;

			if retryable_method && policy.is_retryable_status(response.status().as_u16()) {
				return Err(Attempt::Transient(response));
			}

			Ok(response)
		};
		let outcome = attempt
			.retry(policy.backoff())
			.sleep(tokio::time::sleep)
			.when(|attempt: &Attempt| retryable_method && attempt.is_retryable())
			.notify(|attempt: &Attempt, delay: StdDuration| attempt.log_retry(template, delay))
			.await;

		match outcome {
			Ok(response) | Err(Attempt::Transient(response)) => Ok(response),
			Err(Attempt::Failed(err)) => Err(err),
		}
	}
}
impl Debug for ResilientTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResilientTransport").field("policy", &self.policy).finish()
	}
}

enum Attempt {
	Transient(HttpResponse),
	Failed(TransportError),
}
impl Attempt {
	fn is_retryable(&self) -> bool {
		match self {
			Self::Transient(_) => true,
			Self::Failed(err) => err.is_retryable(),
		}
	}

	fn log_retry(&self, template: &RequestTemplate, delay: StdDuration) {
		match self {
			Self::Transient(response) => {
				let meta = ResponseMetadata::from_response(response);

				tracing::warn!(
					method = %template.method,
					uri = %template.uri,
					status = meta.status,
					retry_after = ?meta.retry_after,
					?delay,
					"Transient HTTP status; retrying."
				);
			},
			Self::Failed(err) => {
				tracing::warn!(
					method = %template.method,
					uri = %template.uri,
					error = %err,
					?delay,
					"Transport failure; retrying."
				);
			},
		}
	}
}

/// Owned copy of a request so each attempt can send a fresh one.
struct RequestTemplate {
	method: Method,
	uri: Uri,
	version: Version,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl RequestTemplate {
	fn build(&self) -> HttpRequest {
		let mut request = HttpRequest::new(self.body.clone());

		*request.method_mut() = self.method.clone();
		*request.uri_mut() = self.uri.clone();
		*request.version_mut() = self.version;
		*request.headers_mut() = self.headers.clone();

		request
	}
}
impl From<HttpRequest> for RequestTemplate {
	fn from(request: HttpRequest) -> Self {
		let (parts, body) = request.into_parts();

		Self {
			method: parts.method,
			uri: parts.uri,
			version: parts.version,
			headers: parts.headers,
			body,
		}
	}
}
