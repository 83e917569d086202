//! Authenticated request dispatcher shared by every paginator and detail fetch.

// std
use std::borrow::Cow;
// crates.io
use oauth2::http::{
	Method,
	header::{ACCEPT, AUTHORIZATION, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::TokenManager,
	config::{Credentials, Settings},
	error::{ConfigError, DecodeError},
	http::{HttpRequest, HttpTransport, ResilientTransport},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Media type negotiated through the `Accept` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentKind {
	/// `application/json`.
	#[default]
	Json,
	/// `application/scim+json`, required by SCIM endpoints.
	Scim,
}
impl ContentKind {
	/// Header value sent as `Accept`.
	pub const fn media_type(self) -> &'static str {
		match self {
			Self::Json => "application/json",
			Self::Scim => "application/scim+json",
		}
	}
}

/// Marks an endpoint whose 401/403 answers mean a missing entitlement rather than a bad token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntitlementGate {
	/// Logical endpoint name used in reports.
	pub endpoint: &'static str,
	/// Entitlement the API client needs.
	pub entitlement: &'static str,
	/// Operator-facing remediation hint.
	pub remediation: &'static str,
}

/// One authenticated GET.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// Target URL without pagination parameters.
	pub url: Url,
	/// Query parameters appended in order.
	pub params: Vec<(Cow<'static, str>, String)>,
	/// Negotiated media type.
	pub content: ContentKind,
	/// Entitlement classification for 401/403 answers.
	pub gate: Option<EntitlementGate>,
}
impl ApiRequest {
	/// Starts a plain JSON GET for `url`.
	pub fn get(url: Url) -> Self {
		Self { url, params: Vec::new(), content: ContentKind::Json, gate: None }
	}

	/// Appends a query parameter.
	pub fn param(mut self, key: impl Into<Cow<'static, str>>, value: impl ToString) -> Self {
		self.params.push((key.into(), value.to_string()));

		self
	}

	/// Negotiates `application/scim+json`.
	pub fn scim(self) -> Self {
		self.content(ContentKind::Scim)
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

	/// Final URL including query parameters.
	pub fn full_url(&self) -> Url {
		let mut url = self.url.clone();

		if !self.params.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in &self.params {
				pairs.append_pair(key, value);
			}
		}

		url
	}
}

/// Composes the [`TokenManager`] and the [`ResilientTransport`] into authenticated GET calls.
#[derive(Debug)]
pub struct ApiClient {
	tokens: TokenManager,
	transport: Arc<ResilientTransport>,
}
impl ApiClient {
	/// Builds a client for `settings` on top of a single-attempt `transport`.
	pub fn new(settings: &Settings, transport: Arc<dyn HttpTransport>) -> Self {
		let transport = Arc::new(ResilientTransport::new(transport, settings.retry.clone()));

		Self::from_parts(settings.credentials.clone(), transport)
	}

	/// Builds a client that shares an existing resilient transport.
	pub fn from_parts(credentials: Credentials, transport: Arc<ResilientTransport>) -> Self {
		Self { tokens: TokenManager::new(credentials, transport.clone()), transport }
	}

	/// Builds a client backed by the default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(settings: &Settings) -> Result<Self> {
		let transport = crate::http::ReqwestTransport::new()?;

		Ok(Self::new(settings, Arc::new(transport)))
	}

	/// Token manager owned by this client.
	pub fn tokens(&self) -> &TokenManager {
		&self.tokens
	}

	/// Credentials this client authenticates with.
	pub fn credentials(&self) -> &Credentials {
		self.tokens.credentials()
	}

	/// Resolves an API path against the tenant URL.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		Ok(self.credentials().endpoint(path)?)
	}

	/// Ensures a fresh token is cached; call once before concurrent work.
	pub async fn warm_up(&self) -> Result<()> {
		self.tokens.get_token().await.map(|_| ())
	}

	/// JSON GET with optional query parameters.
	pub async fn get(&self, url: &Url, params: &[(&'static str, String)]) -> Result<Value> {
		self.get_with(url, params, ContentKind::Json).await
	}

	/// SCIM GET with optional query parameters.
	pub async fn get_scim(&self, url: &Url, params: &[(&'static str, String)]) -> Result<Value> {
		self.get_with(url, params, ContentKind::Scim).await
	}

	/// GET negotiating `content`, without entitlement classification.
	pub async fn get_with(
		&self,
		url: &Url,
		params: &[(&'static str, String)],
		content: ContentKind,
	) -> Result<Value> {
		let mut request = ApiRequest::get(url.clone()).content(content);

		for (key, value) in params {
			request = request.param(*key, value);
		}

		self.send(&request).await
	}

	/// Sends `request` and decodes the JSON body.
	pub async fn send(&self, request: &ApiRequest) -> Result<Value> {
		let token = self.tokens.get_token().await?;
		let url = request.full_url();
		let http_request = build_request(&url, request.content, token.expose())?;

		tracing::debug!(%url, accept = request.content.media_type(), "Dispatching GET.");

		let response = self
			.transport
			.execute(http_request)
			.await
			.map_err(|err| Error::from_transport(url.as_str(), err))?;
		let status = response.status().as_u16();

		if !response.status().is_success() {
			if let (Some(gate), 401 | 403) = (request.gate, status) {
				return Err(Error::Entitlement {
					endpoint: gate.endpoint,
					entitlement: gate.entitlement,
					status,
					remediation: gate.remediation,
				});
			}

			return Err(Error::Request {
				url: url.to_string(),
				status,
				body_preview: body_preview(response.body()),
			});
		}

		decode_json(url.as_str(), response.body())
	}
}

fn build_request(url: &Url, content: ContentKind, token: &str) -> Result<HttpRequest> {
	let authorization = HeaderValue::try_from(format!("Bearer {token}"))
		.map_err(|e| ConfigError::HttpRequest(e.into()))?;
	let request = oauth2::http::Request::builder()
		.method(Method::GET)
		.uri(url.as_str())
		.header(AUTHORIZATION, authorization)
		.header(ACCEPT, content.media_type())
		.body(Vec::new())
		.map_err(ConfigError::from)?;

	Ok(request)
}

/// Decodes a JSON body, keeping the failing path for diagnostics.
pub(crate) fn decode_json(url: &str, body: &[u8]) -> Result<Value> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| DecodeError::Json { url: url.to_owned(), source }.into())
}

fn body_preview(body: &[u8]) -> Option<String> {
	if body.is_empty() {
		return None;
	}

	let text = String::from_utf8_lossy(body);
	let preview = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	Some(preview)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn full_url_appends_params_in_order() {
		let url = Url::parse("https://tenant.example.com/v2.0/Groups")
			.expect("Fixture URL should parse.");
		let request = ApiRequest::get(url).param("count", 100).param("startIndex", 1).scim();

		assert_eq!(
			request.full_url().as_str(),
			"https://tenant.example.com/v2.0/Groups?count=100&startIndex=1"
		);
		assert_eq!(request.content.media_type(), "application/scim+json");
	}

	#[test]
	fn decode_reports_invalid_json() {
		let err = decode_json("https://t/x", b"<html>").expect_err("HTML is not JSON.");

		assert!(matches!(err, Error::Decode(DecodeError::Json { .. })));
		assert_eq!(decode_json("https://t/x", b"[1]").expect("Arrays decode."), serde_json::json!([1]));
	}

	#[test]
	fn body_preview_truncates() {
		let long = "x".repeat(BODY_PREVIEW_LIMIT * 2);

		assert_eq!(body_preview(long.as_bytes()).map(|p| p.len()), Some(BODY_PREVIEW_LIMIT));
		assert_eq!(body_preview(b""), None);
	}
}
